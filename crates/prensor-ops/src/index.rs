//! Position of each element within its parent.
//!
//! For parent index `[0,1,1,2,3,4,4]` the positional index is
//! `[0,0,1,0,0,0,1]` and the index from the end is `[-1,-2,-1,-1,-1,-2,-1]`.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::kernels::gather;
use prensor_core::node::{LeafNode, NodeValue};
use prensor_core::path::{anonymous_step, Path, Step};
use prensor_core::schema::DataType;
use prensor_core::types::Values;
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression};

use crate::add::{add_path, add_to};
use crate::size::size_anonymous;

pub struct PositionalIndexExpression {
    origin: ExprRef,
}

impl Expression for PositionalIndexExpression {
    fn kind(&self) -> &'static str {
        "positional_index"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        Some(DataType::Int64)
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let origin = ctx.single_source(self.kind())?;
        let parent_index = origin.parent_index().ok_or_else(|| {
            Error::InvalidArgument("cannot calculate the positional index of the root".to_string())
        })?;
        let positions = origin.positional_index().into_iter().map(|i| i as i64).collect();
        Ok(Arc::new(NodeValue::Leaf(LeafNode::new(
            parent_index.to_vec(),
            Values::I64(positions),
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

/// Positional index minus the per-parent size. Index-aligned with the
/// positional index; `size` has one entry per parent.
pub struct IndexFromEndExpression {
    positional_index: ExprRef,
    size: ExprRef,
}

impl Expression for IndexFromEndExpression {
    fn kind(&self) -> &'static str {
        "index_from_end"
    }

    fn is_repeated(&self) -> bool {
        self.positional_index.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        Some(DataType::Int64)
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.positional_index), ExprRef::clone(&self.size)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (positional, size) = ctx.source_pair(self.kind())?;
        let (positional, size) = match (positional.as_leaf(), size.as_leaf()) {
            (Some(p), Some(s)) => (p, s),
            _ => {
                return Err(Error::InvalidArgument(
                    "index_from_end: positional index and size must be leaves".to_string(),
                ))
            }
        };
        let (positions, sizes) = match (positional.values.as_i64(), size.values.as_i64()) {
            (Some(p), Some(s)) => (p, s),
            _ => {
                return Err(Error::InvalidArgument(
                    "index_from_end: inputs must be int64".to_string(),
                ))
            }
        };
        let size_per_index = gather(sizes, &positional.parent_index)?;
        let values = positions
            .iter()
            .zip(size_per_index)
            .map(|(p, s)| p - s)
            .collect();
        Ok(Arc::new(NodeValue::Leaf(LeafNode::new(
            positional.parent_index.clone(),
            Values::I64(values),
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

/// Position of each element of `source_path` within its parent, as sibling
/// `new_field_name`. Returns the new root and path.
pub fn get_positional_index(
    root: &ExprRef,
    source_path: &Path,
    new_field_name: impl Into<Step>,
) -> Result<(ExprRef, Path)> {
    let new_path = source_path.parent()?.child(new_field_name)?;
    let origin = root.get_descendant_or_error(source_path)?;
    let expr = Expr::new(PositionalIndexExpression { origin });
    Ok((add_path(root, new_path.clone(), expr)?, new_path))
}

/// Negative position counted from the end of each parent's list
/// (`["a","b","c"]` gives `[-3,-2,-1]`), as sibling `new_field_name`.
pub fn get_index_from_end(
    root: &ExprRef,
    source_path: &Path,
    new_field_name: impl Into<Step>,
) -> Result<(ExprRef, Path)> {
    let new_path = source_path.parent()?.child(new_field_name)?;
    let (work, positional_path) = get_positional_index(root, source_path, anonymous_step())?;
    let (work, size_path) = size_anonymous(&work, source_path)?;
    let expr = Expr::new(IndexFromEndExpression {
        positional_index: work.get_descendant_or_error(&positional_path)?,
        size: work.get_descendant_or_error(&size_path)?,
    });
    let work = add_path(&work, new_path.clone(), expr)?;
    let result = add_to(root, BTreeMap::from([(new_path.clone(), work)]))?;
    Ok((result, new_path))
}
