//! Count the elements of a field per parent.
//!
//! The result is a required int64 sibling: exactly one count per parent
//! element, zero where the field is absent.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::kernels::segment_counts;
use prensor_core::node::{LeafNode, NodeValue};
use prensor_core::path::{anonymous_step, Path, Step};
use prensor_core::schema::DataType;
use prensor_core::types::Values;
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression};

use crate::add::add_path;
use crate::map_values::map_values;

pub struct SizeExpression {
    origin: ExprRef,
    origin_parent: ExprRef,
}

impl Expression for SizeExpression {
    fn kind(&self) -> &'static str {
        "size"
    }

    fn is_repeated(&self) -> bool {
        false
    }

    fn data_type(&self) -> Option<DataType> {
        Some(DataType::Int64)
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin), ExprRef::clone(&self.origin_parent)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (origin, parent) = ctx.source_pair(self.kind())?;
        let parent_index = origin.parent_index().ok_or_else(|| {
            Error::InvalidArgument(format!("size: origin must be a leaf or child, got {}", origin))
        })?;
        if parent.is_leaf() {
            return Err(Error::InvalidArgument(format!(
                "size: parent must be a root or child, got {}",
                parent
            )));
        }
        let extent = parent.size();
        Ok(Arc::new(NodeValue::Leaf(LeafNode::new(
            (0..extent).collect(),
            Values::I64(segment_counts(parent_index, extent)?),
            false,
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

fn size_impl(root: &ExprRef, source_path: &Path, new_field_name: Step) -> Result<(ExprRef, Path)> {
    if source_path.is_root() {
        return Err(Error::InvalidArgument(
            "cannot get the size of the root".to_string(),
        ));
    }
    let origin = root.get_descendant_or_error(source_path)?;
    let parent_path = source_path.parent()?;
    let origin_parent = root.get_descendant_or_error(&parent_path)?;
    let new_path = parent_path.child(new_field_name)?;
    let expr = Expr::new(SizeExpression {
        origin,
        origin_parent,
    });
    Ok((add_path(root, new_path.clone(), expr)?, new_path))
}

/// Size of `source_path` per parent, as sibling `new_field_name`.
pub fn size(root: &ExprRef, source_path: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef> {
    size_impl(root, source_path, new_field_name.into()).map(|(root, _)| root)
}

/// `size` under a fresh anonymous name; returns the new root and path.
pub fn size_anonymous(root: &ExprRef, source_path: &Path) -> Result<(ExprRef, Path)> {
    size_impl(root, source_path, anonymous_step())
}

/// Whether each parent has at least one `source_path`, as a required bool
/// sibling `new_field_name`.
pub fn has(root: &ExprRef, source_path: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef> {
    let (new_root, size_path) = size_anonymous(root, source_path)?;
    map_values(
        &new_root,
        &size_path,
        |sizes: &Values| {
            let sizes = sizes
                .as_i64()
                .ok_or_else(|| Error::Invariant("has: size is not int64".to_string()))?;
            Ok(Values::Bool(sizes.iter().map(|&n| n > 0).collect()))
        },
        DataType::Boolean,
        new_field_name,
    )
}
