//! Filter a field by a boolean mask.
//!
//! `filter_by_sibling` keeps the elements whose aligned sibling is true;
//! `filter_by_child` keeps the elements whose optional boolean child is
//! present and true. Filtered nodes remember which elements survived
//! (`indices_to_keep`) and every node below is re-derived by joining its
//! parent index against that list.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::kernels::{equi_join_indices, gather, true_indices};
use prensor_core::node::{ChildNode, LeafNode, NodeValue, RootNode};
use prensor_core::path::{Path, Step};
use prensor_core::schema::DataType;
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression};

use crate::add::add_path;

/// Keep the elements of `node` at `keep` (ascending self indices).
fn filter_by_self_indices(node: &NodeValue, keep: Vec<usize>) -> Result<NodeValue> {
    Ok(match node {
        NodeValue::Root(_) => {
            let mut root = RootNode::new(keep.len());
            root.indices_to_keep = Some(keep);
            NodeValue::Root(root)
        }
        NodeValue::Child(child) => {
            let mut out = ChildNode::new(gather(&child.parent_index, &keep)?, child.is_repeated);
            out.indices_to_keep = Some(keep);
            NodeValue::Child(out)
        }
        NodeValue::Leaf(leaf) => NodeValue::Leaf(LeafNode::new(
            gather(&leaf.parent_index, &keep)?,
            leaf.values.gather(&keep)?,
            leaf.is_repeated,
        )?),
    })
}

/// Keep the elements of `node` whose parent survived; parents are renumbered.
fn filter_by_parent_indices(node: &NodeValue, parent_keep: &[usize]) -> Result<NodeValue> {
    Ok(match node {
        NodeValue::Child(child) => {
            let (new_parent_index, keep) = equi_join_indices(parent_keep, &child.parent_index);
            let mut out = ChildNode::new(new_parent_index, child.is_repeated);
            out.indices_to_keep = Some(keep);
            NodeValue::Child(out)
        }
        NodeValue::Leaf(leaf) => {
            let (new_parent_index, keep) = equi_join_indices(parent_keep, &leaf.parent_index);
            NodeValue::Leaf(LeafNode::new(
                new_parent_index,
                leaf.values.gather(&keep)?,
                leaf.is_repeated,
            )?)
        }
        NodeValue::Root(_) => {
            return Err(Error::InvalidArgument(
                "filter: original must be a child or leaf".to_string(),
            ))
        }
    })
}

fn require_leaf<'a>(value: &'a NodeValue, what: &str) -> Result<&'a LeafNode> {
    value
        .as_leaf()
        .ok_or_else(|| Error::InvalidArgument(format!("filter: {} is not a leaf: {}", what, value)))
}

fn mask(leaf: &LeafNode) -> Result<&[bool]> {
    leaf.values
        .as_bool()
        .ok_or_else(|| Error::InvalidArgument(format!("filter: mask must be bool, got {}", leaf.values.data_type())))
}

fn filtered_child(origin: &ExprRef, this: &ExprRef, step: &Step) -> Option<ExprRef> {
    let origin = origin.get_child(step)?;
    Some(Expr::new(FilterDescendantExpression {
        origin,
        parent: ExprRef::clone(this),
    }))
}

/// A node below a filtered node.
pub struct FilterDescendantExpression {
    origin: ExprRef,
    parent: ExprRef,
}

impl Expression for FilterDescendantExpression {
    fn kind(&self) -> &'static str {
        "filter_descendant"
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
        let parent_keep = parent
            .indices_to_keep()
            .ok_or_else(|| Error::InvalidArgument(format!("filter: parent is not filtered: {}", parent)))?;
        Ok(Arc::new(filter_by_parent_indices(origin, parent_keep)?))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef> {
        filtered_child(&self.origin, this, step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.origin.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

/// `origin` masked by a boolean sibling with the same shape.
pub struct FilterBySiblingExpression {
    origin: ExprRef,
    sibling: ExprRef,
}

impl Expression for FilterBySiblingExpression {
    fn kind(&self) -> &'static str {
        "filter_by_sibling"
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
        let origin_pi = origin
            .parent_index()
            .ok_or_else(|| Error::InvalidArgument("filter: origin should not be a root".to_string()))?;
        let sibling = require_leaf(sibling, "sibling")?;
        if ctx.options.sparse_checks && sibling.parent_index != origin_pi {
            return Err(Error::ShapeMismatch(
                "filter: sibling and origin have different shapes".to_string(),
            ));
        }
        let keep = true_indices(mask(sibling)?);
        Ok(Arc::new(filter_by_self_indices(origin, keep)?))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef> {
        filtered_child(&self.origin, this, step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.origin.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

/// `origin` keeping the elements whose boolean child is present and true.
pub struct FilterByChildExpression {
    origin: ExprRef,
    child: ExprRef,
}

impl Expression for FilterByChildExpression {
    fn kind(&self) -> &'static str {
        "filter_by_child"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        self.origin.data_type()
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin), ExprRef::clone(&self.child)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (origin, child) = ctx.source_pair(self.kind())?;
        if matches!(origin.as_ref(), NodeValue::Root(_)) {
            return Err(Error::InvalidArgument(
                "filter: origin should not be a root".to_string(),
            ));
        }
        let child = require_leaf(child, "child")?;
        let keep: Vec<usize> = child
            .parent_index
            .iter()
            .zip(mask(child)?)
            .filter_map(|(&p, &m)| m.then_some(p))
            .collect();
        Ok(Arc::new(filter_by_self_indices(origin, keep)?))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef> {
        filtered_child(&self.origin, this, step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.origin.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

pub(crate) fn filter_by_sibling_impl(
    root: &ExprRef,
    p: &Path,
    sibling_field_name: &Step,
    new_field_name: &Step,
) -> Result<(ExprRef, Path)> {
    let origin = root.get_descendant_or_error(p)?;
    let parent_path = p.parent()?;
    let sibling = root.get_descendant_or_error(&parent_path.child(sibling_field_name)?)?;
    if sibling.data_type() != Some(DataType::Boolean) {
        return Err(Error::InvalidArgument(
            "sibling must be a boolean leaf".to_string(),
        ));
    }
    let new_path = parent_path.child(new_field_name)?;
    let new_root = add_path(
        root,
        new_path.clone(),
        Expr::new(FilterBySiblingExpression { origin, sibling }),
    )?;
    Ok((new_root, new_path))
}

/// Keep the elements of `p` whose aligned boolean sibling is true, as a new
/// sibling `new_field_name`.
///
/// `p` and the sibling must have the same shape: each parent has as many
/// mask elements as `p` elements.
pub fn filter_by_sibling(
    root: &ExprRef,
    p: &Path,
    sibling_field_name: impl Into<Step>,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef> {
    filter_by_sibling_impl(root, p, &sibling_field_name.into(), &new_field_name.into())
        .map(|(root, _)| root)
}

/// Keep the elements of `p` whose optional boolean child `child_field_name`
/// is present and true, as a new sibling `new_field_name`.
pub fn filter_by_child(
    root: &ExprRef,
    p: &Path,
    child_field_name: impl Into<Step>,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef> {
    let origin = root.get_descendant_or_error(p)?;
    let child = origin.get_child_or_error(&child_field_name.into())?;
    if child.data_type() != Some(DataType::Boolean) {
        return Err(Error::InvalidArgument("child must be a boolean leaf".to_string()));
    }
    if child.is_repeated() {
        return Err(Error::InvalidArgument("child must not be repeated".to_string()));
    }
    let new_path = p.parent()?.child(new_field_name)?;
    add_path(
        root,
        new_path,
        Expr::new(FilterByChildExpression { origin, child }),
    )
}
