//! Select a subtree.
//!
//! Fields not on a selected path disappear from the known tree; the values
//! themselves are untouched, so projection never adds a calculation.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::node::NodeValue;
use prensor_core::path::{Path, Step};
use prensor_core::schema::DataType;
use prensor_expr::{CalcContext, Expr, ExprRef, Expression};

fn group_by_first_step(paths: &[Path]) -> BTreeMap<Step, Vec<Path>> {
    let mut grouped: BTreeMap<Step, Vec<Path>> = BTreeMap::new();
    for p in paths {
        if let Some(first) = p.first_step() {
            grouped.entry(first.clone()).or_default().push(p.suffix(1));
        }
    }
    grouped
}

pub struct ProjectExpression {
    origin: ExprRef,
    paths: BTreeMap<Step, Vec<Path>>,
}

impl Expression for ProjectExpression {
    fn kind(&self) -> &'static str {
        "project"
    }

    fn is_repeated(&self) -> bool {
        self.origin.is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        self.origin.data_type()
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.origin)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        ctx.single_source(self.kind()).cloned()
    }

    fn is_identity(&self) -> bool {
        true
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.is_identity()
    }

    fn child(&self, _this: &ExprRef, step: &Step) -> Option<ExprRef> {
        let paths = self.paths.get(step)?;
        let origin = self.origin.get_child(step)?;
        Some(Expr::new(ProjectExpression {
            origin,
            paths: group_by_first_step(paths),
        }))
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.paths.keys().cloned().collect()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

/// Keep only `paths` (and their ancestors) in the known tree of `expr`.
pub fn project(expr: &ExprRef, paths: &[Path]) -> Result<ExprRef> {
    let missing: Vec<String> = paths
        .iter()
        .filter(|p| expr.get_descendant(p).is_none())
        .map(|p| p.to_string())
        .collect();
    if !missing.is_empty() {
        return Err(Error::MissingPath(format!(
            "{} path(s) missing in project: {}",
            missing.len(),
            missing.join(", ")
        )));
    }
    Ok(Expr::new(ProjectExpression {
        origin: ExprRef::clone(expr),
        paths: group_by_first_step(paths),
    }))
}
