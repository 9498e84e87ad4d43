//! Grafting expressions onto an existing tree.
//!
//! `add_paths` overlays new subtrees on a root without touching the original
//! nodes; `add_to` copies subtrees from trees derived from the same root.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::node::NodeValue;
use prensor_core::path::{Path, Step};
use prensor_core::schema::DataType;
use prensor_expr::{same_computation, CalcContext, Expr, ExprRef, Expression};

type SubtreeMap = BTreeMap<Step, BTreeMap<Path, ExprRef>>;

/// Split a path map into the expression at the empty path (if any) and the
/// remaining entries grouped by first step.
pub fn create_subtrees(path_map: &BTreeMap<Path, ExprRef>) -> (Option<ExprRef>, SubtreeMap) {
    let mut root = None;
    let mut subtrees: SubtreeMap = BTreeMap::new();
    for (p, expr) in path_map {
        match p.first_step() {
            None => root = Some(ExprRef::clone(expr)),
            Some(first) => {
                subtrees
                    .entry(first.clone())
                    .or_default()
                    .insert(p.suffix(1), ExprRef::clone(expr));
            }
        }
    }
    (root, subtrees)
}

/// An overlay of `origin` with extra fields. Computes exactly its origin.
pub struct AddPathsExpression {
    origin: ExprRef,
    path_map: SubtreeMap,
}

impl AddPathsExpression {
    pub fn origin(&self) -> &ExprRef {
        &self.origin
    }

    pub fn added_fields(&self) -> impl Iterator<Item = &Step> {
        self.path_map.keys()
    }
}

impl Expression for AddPathsExpression {
    fn kind(&self) -> &'static str {
        "add_paths"
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
        let from_origin = self.origin.get_child(step);
        let Some(path_map) = self.path_map.get(step) else {
            return from_origin;
        };
        let (set_root, subtrees) = create_subtrees(path_map);
        match (from_origin, set_root) {
            // add_paths rejects both of these up front.
            (None, None) | (Some(_), Some(_)) => None,
            (None, Some(set_root)) if subtrees.is_empty() => Some(set_root),
            (None, Some(set_root)) => Some(wrap(set_root, subtrees)),
            (Some(from_origin), None) => Some(wrap(from_origin, subtrees)),
        }
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        let mut names = self.origin.known_field_names();
        names.extend(self.path_map.keys().cloned());
        names
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

fn wrap(origin: ExprRef, path_map: SubtreeMap) -> ExprRef {
    Expr::new(AddPathsExpression { origin, path_map })
}

/// A new root: `root` plus every expression of `path_map` at its path.
///
/// Each path's parent must already exist and the path itself must not.
/// This places expressions without checking that they fit their parent;
/// transforms use it to publish results, callers should prefer [`add_to`].
pub fn add_paths(root: &ExprRef, path_map: BTreeMap<Path, ExprRef>) -> Result<ExprRef> {
    for p in path_map.keys() {
        if p.is_root() || root.get_descendant(&p.parent()?).is_none() {
            return Err(Error::MissingPath(format!("no parent of {}", p)));
        }
        if root.get_descendant(p).is_some() {
            return Err(Error::DuplicatePath(p.to_string()));
        }
    }
    let (_, subtrees) = create_subtrees(&path_map);
    Ok(wrap(ExprRef::clone(root), subtrees))
}

/// `add_paths` for a single path.
pub fn add_path(root: &ExprRef, p: Path, expr: ExprRef) -> Result<ExprRef> {
    add_paths(root, BTreeMap::from([(p, expr)]))
}

/// True if `dest` is `candidate` seen through zero or more `add_paths` layers.
///
/// Such a `dest` has the same value as `candidate`, so a child of `dest`
/// can be re-hung under `candidate`.
pub fn is_true_source(candidate: &ExprRef, dest: &ExprRef) -> bool {
    if same_computation(candidate, dest) {
        return true;
    }
    match dest.downcast_ref::<AddPathsExpression>() {
        Some(added) => is_true_source(candidate, &added.origin),
        None => false,
    }
}

/// Copy the subtree at each path of `origins` (keyed by path, valued by a tree
/// derived from `root`) onto `root`.
pub fn add_to(root: &ExprRef, origins: BTreeMap<Path, ExprRef>) -> Result<ExprRef> {
    let mut path_map = BTreeMap::new();
    for (p, origin_root) in &origins {
        let parent = p.parent()?;
        let in_root = root.get_descendant_or_error(&parent)?;
        let in_origin = origin_root.get_descendant_or_error(&parent)?;
        if !is_true_source(&in_root, &in_origin) {
            return Err(Error::InvalidArgument(format!(
                "not a true source for tree with {}",
                p
            )));
        }
        if root.get_descendant(p).is_some() {
            return Err(Error::DuplicatePath(p.to_string()));
        }
        path_map.insert(p.clone(), origin_root.get_descendant_or_error(p)?);
    }
    add_paths(root, path_map)
}
