//! Broadcast a field onto every element of a sibling.
//!
//! ```text
//! session: { event: {} event: {} user_id: 9 }
//! session: { event: {} user_id: 8 }
//! broadcast(root, "session.user_id", "event", "user_id")
//! session.event.user_id: 9 9 8   (parent index 0 1 2)
//! ```
//!
//! The copy is an equi-join of the sibling's parent index with the origin's
//! parent index: every sibling element gets the origin elements that share its
//! parent. Broadcasting an internal node copies its whole subtree; each copied
//! node records which origin element it came from (`index_to_value`) so the
//! level below can be joined against it.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::kernels::{equi_join_any_indices, equi_join_indices};
use prensor_core::node::{ChildNode, LeafNode, NodeValue};
use prensor_core::path::{anonymous_step, Path, Step};
use prensor_core::schema::DataType;
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression};

use crate::add::add_path;

fn sibling_parent_index(sibling: &NodeValue) -> Result<&[usize]> {
    sibling
        .as_child()
        .map(|c| c.parent_index.as_slice())
        .ok_or_else(|| Error::InvalidArgument(format!("broadcast: sibling must be a child, got {}", sibling)))
}

fn origin_parent_index(origin: &NodeValue) -> Result<&[usize]> {
    origin
        .parent_index()
        .ok_or_else(|| Error::InvalidArgument("broadcast: cannot broadcast a root".to_string()))
}

/// Copies of a leaf, one run per sibling element.
pub struct BroadcastExpression {
    origin: ExprRef,
    sibling: ExprRef,
}

impl Expression for BroadcastExpression {
    fn kind(&self) -> &'static str {
        "broadcast"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        self.origin.data_type()
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin), ExprRef::clone(&self.sibling)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (origin, sibling) = ctx.source_pair(self.kind())?;
        let leaf = origin
            .as_leaf()
            .ok_or_else(|| Error::InvalidArgument(format!("broadcast: origin is not a leaf: {}", origin)))?;
        let (dup_index, src_index) =
            equi_join_indices(sibling_parent_index(sibling)?, &leaf.parent_index);
        Ok(Arc::new(NodeValue::Leaf(LeafNode::new(
            dup_index,
            leaf.values.gather(&src_index)?,
            self.is_repeated(),
        )?)))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, _this: &ExprRef, _step: &Step) -> Option<ExprRef> {
        None
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        BTreeSet::new()
    }
}

/// Copies of an internal node; the top of a broadcast subtree.
pub struct BroadcastChildExpression {
    origin: ExprRef,
    sibling: ExprRef,
}

impl Expression for BroadcastChildExpression {
    fn kind(&self) -> &'static str {
        "broadcast_child"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        None
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin), ExprRef::clone(&self.sibling)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (origin, sibling) = ctx.source_pair(self.kind())?;
        if origin.as_child().is_none() {
            return Err(Error::InvalidArgument(format!(
                "broadcast: origin is not a child: {}",
                origin
            )));
        }
        let (dup_index, src_index) =
            equi_join_indices(sibling_parent_index(sibling)?, origin_parent_index(origin)?);
        let mut node = ChildNode::new(dup_index, self.is_repeated());
        node.index_to_value = Some(src_index);
        Ok(Arc::new(NodeValue::Child(node)))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef> {
        let origin = self.origin.get_child(step)?;
        Some(Expr::new(BroadcastDescendantExpression {
            origin,
            parent: ExprRef::clone(this),
        }))
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.origin.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

/// A node below a broadcast subtree root, re-indexed against the copies of
/// its parent.
pub struct BroadcastDescendantExpression {
    origin: ExprRef,
    parent: ExprRef,
}

impl Expression for BroadcastDescendantExpression {
    fn kind(&self) -> &'static str {
        "broadcast_descendant"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        self.origin.data_type()
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin), ExprRef::clone(&self.parent)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (origin, parent) = ctx.source_pair(self.kind())?;
        let index_to_value = parent
            .as_child()
            .and_then(|c| c.index_to_value.as_deref())
            .ok_or_else(|| {
                Error::InvalidArgument(format!(
                    "broadcast: parent carries no index_to_value: {}",
                    parent
                ))
            })?;
        let (new_parent_index, src_index) =
            equi_join_any_indices(index_to_value, origin_parent_index(origin)?);
        let value = match origin.as_ref() {
            NodeValue::Leaf(leaf) => NodeValue::Leaf(LeafNode::new(
                new_parent_index,
                leaf.values.gather(&src_index)?,
                leaf.is_repeated,
            )?),
            NodeValue::Child(child) => {
                let mut node = ChildNode::new(new_parent_index, child.is_repeated);
                node.index_to_value = Some(src_index);
                NodeValue::Child(node)
            }
            NodeValue::Root(_) => {
                return Err(Error::InvalidArgument(
                    "broadcast: a root cannot be a descendant".to_string(),
                ))
            }
        };
        Ok(Arc::new(value))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef> {
        let origin = self.origin.get_child(step)?;
        Some(Expr::new(BroadcastDescendantExpression {
            origin,
            parent: ExprRef::clone(this),
        }))
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.origin.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

fn broadcast_impl(
    root: &ExprRef,
    origin: &Path,
    sibling: &Step,
    new_field_name: Step,
) -> Result<(ExprRef, Path)> {
    let sibling_path = origin.parent()?.child(sibling)?;
    let origin_expr = root.get_descendant_or_error(origin)?;
    let sibling_expr = root.get_descendant_or_error(&sibling_path)?;
    if sibling_expr.is_leaf() {
        return Err(Error::InvalidArgument(format!(
            "cannot broadcast onto {}: it is a leaf",
            sibling_path
        )));
    }
    let new_expr = if origin_expr.is_leaf() {
        Expr::new(BroadcastExpression {
            origin: origin_expr,
            sibling: sibling_expr,
        })
    } else {
        Expr::new(BroadcastChildExpression {
            origin: origin_expr,
            sibling: sibling_expr,
        })
    };
    let new_path = sibling_path.child(new_field_name)?;
    Ok((add_path(root, new_path.clone(), new_expr)?, new_path))
}

/// Copy `origin` onto each element of its sibling `sibling`, as
/// `sibling.new_field_name`.
pub fn broadcast(
    root: &ExprRef,
    origin: &Path,
    sibling: impl Into<Step>,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef> {
    broadcast_impl(root, origin, &sibling.into(), new_field_name.into()).map(|(root, _)| root)
}

/// `broadcast` under a fresh anonymous name; returns the new root and path.
pub fn broadcast_anonymous(
    root: &ExprRef,
    origin: &Path,
    sibling: impl Into<Step>,
) -> Result<(ExprRef, Path)> {
    broadcast_impl(root, origin, &sibling.into(), anonymous_step())
}
