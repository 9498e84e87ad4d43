//! Promote a field to be a child of its grandparent.
//!
//! ```text
//! session: { event: { val: 1 } event: { val: 2 val: 3 } }
//! promote(root, "session.event.val", "event_val")
//! session: { event: {...} event: {...} event_val: 1 event_val: 2 event_val: 3 }
//! ```
//!
//! Each element is re-parented through a gather over the parent's parent
//! index. The result is repeated if either the origin or its parent was.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::kernels::gather;
use prensor_core::node::{ChildNode, LeafNode, NodeValue};
use prensor_core::path::{anonymous_step, Path, Step};
use prensor_core::schema::DataType;
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression};

use crate::add::add_path;

fn promoted_parent_index(origin: &NodeValue, parent: &NodeValue) -> Result<Vec<usize>> {
    let parent = parent
        .as_child()
        .ok_or_else(|| Error::InvalidArgument(format!("promote: parent must be a child, got {}", parent)))?;
    let origin_pi = origin
        .parent_index()
        .ok_or_else(|| Error::InvalidArgument("promote: origin cannot be a root".to_string()))?;
    gather(&parent.parent_index, origin_pi)
}

/// Promoted leaf.
pub struct PromoteExpression {
    origin: ExprRef,
    origin_parent: ExprRef,
}

impl Expression for PromoteExpression {
    fn kind(&self) -> &'static str {
        "promote"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated() || self.origin_parent.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        self.origin.data_type()
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin), ExprRef::clone(&self.origin_parent)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (origin, parent) = ctx.source_pair(self.kind())?;
        let leaf = origin
            .as_leaf()
            .ok_or_else(|| Error::InvalidArgument(format!("promote: expected a leaf, got {}", origin)))?;
        let parent_index = promoted_parent_index(origin, parent)?;
        Ok(Arc::new(NodeValue::Leaf(LeafNode::new(
            parent_index,
            leaf.values.clone(),
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

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

/// Promoted internal node. Its subtree is the origin's subtree, unchanged:
/// the promoted node has the same elements as the origin.
pub struct PromoteChildExpression {
    origin: ExprRef,
    origin_parent: ExprRef,
}

impl Expression for PromoteChildExpression {
    fn kind(&self) -> &'static str {
        "promote_child"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated() || self.origin_parent.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        None
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin), ExprRef::clone(&self.origin_parent)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (origin, parent) = ctx.source_pair(self.kind())?;
        if origin.as_child().is_none() {
            return Err(Error::InvalidArgument(format!(
                "promote: expected a child, got {}",
                origin
            )));
        }
        let parent_index = promoted_parent_index(origin, parent)?;
        Ok(Arc::new(NodeValue::Child(ChildNode::new(
            parent_index,
            self.is_repeated(),
        ))))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, _this: &ExprRef, step: &Step) -> Option<ExprRef> {
        self.origin.get_child(step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.origin.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

fn promote_impl(root: &ExprRef, p: &Path, new_field_name: Step) -> Result<(ExprRef, Path)> {
    if p.len() < 2 {
        return Err(Error::InvalidArgument(format!(
            "cannot do a promotion beyond the root: {}",
            p
        )));
    }
    let parent_path = p.parent()?;
    let grandparent_path = parent_path.parent()?;
    let origin = root.get_descendant_or_error(p)?;
    let origin_parent = root.get_descendant_or_error(&parent_path)?;
    if origin_parent.is_leaf() {
        return Err(Error::InvalidArgument(format!(
            "cannot promote {}: parent is a leaf",
            p
        )));
    }
    let new_path = grandparent_path.child(new_field_name)?;
    let promoted = if origin.is_leaf() {
        Expr::new(PromoteExpression {
            origin,
            origin_parent,
        })
    } else {
        Expr::new(PromoteChildExpression {
            origin,
            origin_parent,
        })
    };
    let new_root = add_path(root, new_path.clone(), promoted)?;

    #[cfg(feature = "tracing")]
    tracing::trace!(from = %p, to = %new_path, "promote");

    Ok((new_root, new_path))
}

/// Promote `p` to a sibling of its parent named `new_field_name`.
pub fn promote(root: &ExprRef, p: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef> {
    promote_impl(root, p, new_field_name.into()).map(|(root, _)| root)
}

/// Promote `p` under a fresh anonymous name; returns the new root and path.
pub fn promote_anonymous(root: &ExprRef, p: &Path) -> Result<(ExprRef, Path)> {
    promote_impl(root, p, anonymous_step())
}
