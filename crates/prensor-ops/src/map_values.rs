//! Element-wise maps over leaf values.
//!
//! The output is a new sibling with the same parent index as the inputs.
//! An operation must return exactly one value per input element.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::node::{LeafNode, NodeValue};
use prensor_core::path::{anonymous_step, Path, Step};
use prensor_core::schema::DataType;
use prensor_core::types::Values;
use prensor_expr::{CalcContext, Expr, ExprRef, Expression};

use crate::add::add_path;

/// Operation over the values of several aligned leaves.
pub type ValuesOp = Arc<dyn Fn(&[&Values]) -> Result<Values> + Send + Sync>;

pub struct MapValuesExpression {
    origins: Vec<ExprRef>,
    op: ValuesOp,
    data_type: DataType,
    is_repeated: bool,
}

impl Expression for MapValuesExpression {
    fn kind(&self) -> &'static str {
        "map_values"
    }

    fn is_repeated(&self) -> bool {
        self.is_repeated
    }

    fn data_type(&self) -> Option<DataType> {
        Some(self.data_type)
    }

    fn sources(&self) -> Vec<ExprRef> {
        self.origins.clone()
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let leaves = ctx
            .sources
            .iter()
            .map(|s| {
                s.as_leaf()
                    .ok_or_else(|| Error::InvalidArgument(format!("map_values: source is {}, not a leaf", s)))
            })
            .collect::<Result<Vec<&LeafNode>>>()?;
        let first = leaves
            .first()
            .ok_or_else(|| Error::Invariant("map_values: no sources".to_string()))?;
        if ctx.options.sparse_checks {
            if let Some(other) = leaves.iter().find(|l| l.parent_index != first.parent_index) {
                return Err(Error::ShapeMismatch(format!(
                    "map_values: sources have different shapes ({} vs {} elements)",
                    first.parent_index.len(),
                    other.parent_index.len()
                )));
            }
        }
        let inputs: Vec<&Values> = leaves.iter().map(|l| &l.values).collect();
        let values = (self.op)(&inputs)?;
        Ok(Arc::new(NodeValue::Leaf(LeafNode::new(
            first.parent_index.clone(),
            values,
            self.is_repeated,
        )?)))
    }

    fn child(&self, _this: &ExprRef, _step: &Step) -> Option<ExprRef> {
        None
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        BTreeSet::new()
    }
}

/// Map the sibling leaves `parent_path.f` for each `f` in `source_fields` into
/// a new sibling `parent_path.new_field_name` of type `data_type`.
///
/// All sources must have the same shape.
pub fn map_many_values<F>(
    root: &ExprRef,
    parent_path: &Path,
    source_fields: &[Step],
    op: F,
    data_type: DataType,
    new_field_name: impl Into<Step>,
) -> Result<(ExprRef, Path)>
where
    F: Fn(&[&Values]) -> Result<Values> + Send + Sync + 'static,
{
    let origins = source_fields
        .iter()
        .map(|f| root.get_descendant_or_error(&parent_path.child(f)?))
        .collect::<Result<Vec<_>>>()?;
    let is_repeated = match origins.first() {
        Some(first) => first.is_repeated(),
        None => {
            return Err(Error::InvalidArgument(
                "map_values: need at least one source field".to_string(),
            ))
        }
    };
    if origins.iter().any(|o| o.is_repeated() != is_repeated) {
        return Err(Error::InvalidArgument(
            "map_values: sources disagree on repeatedness".to_string(),
        ));
    }
    if let Some(bad) = origins.iter().find(|o| !o.is_leaf()) {
        return Err(Error::InvalidArgument(format!(
            "map_values: {} is not a leaf",
            bad
        )));
    }
    let new_path = parent_path.child(new_field_name)?;
    let expr = Expr::new(MapValuesExpression {
        origins,
        op: Arc::new(op),
        data_type,
        is_repeated,
    });
    Ok((add_path(root, new_path.clone(), expr)?, new_path))
}

fn map_values_impl<F>(
    root: &ExprRef,
    source_path: &Path,
    op: F,
    data_type: DataType,
    new_field_name: Step,
) -> Result<(ExprRef, Path)>
where
    F: Fn(&Values) -> Result<Values> + Send + Sync + 'static,
{
    let field = source_path
        .last_step()
        .ok_or_else(|| Error::InvalidArgument("cannot map the root".to_string()))?
        .clone();
    map_many_values(
        root,
        &source_path.parent()?,
        &[field],
        move |values: &[&Values]| match values {
            [only] => op(*only),
            _ => Err(Error::Invariant("map_values: expected one input".to_string())),
        },
        data_type,
        new_field_name,
    )
}

/// Map the leaf at `source_path` into a new sibling `new_field_name`.
pub fn map_values<F>(
    root: &ExprRef,
    source_path: &Path,
    op: F,
    data_type: DataType,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef>
where
    F: Fn(&Values) -> Result<Values> + Send + Sync + 'static,
{
    map_values_impl(root, source_path, op, data_type, new_field_name.into()).map(|(root, _)| root)
}

/// `map_values` under a fresh anonymous name; returns the new root and path.
pub fn map_values_anonymous<F>(
    root: &ExprRef,
    source_path: &Path,
    op: F,
    data_type: DataType,
) -> Result<(ExprRef, Path)>
where
    F: Fn(&Values) -> Result<Values> + Send + Sync + 'static,
{
    map_values_impl(root, source_path, op, data_type, anonymous_step())
}
