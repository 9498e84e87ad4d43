//! Map a whole subtree to a single new leaf.
//!
//! The operation sees the subtree below `root_path` (projected to the paths
//! it asks for) as a prensor whose root has one element per element at
//! `root_path`, and returns a leaf whose parent index points at those
//! elements. The ragged and sparse adapters hand the operation per-leaf
//! ragged or sparse views instead.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::config::CalcOptions;
use prensor_core::error::{Error, Result};
use prensor_core::kernels::is_strictly_increasing;
use prensor_core::node::{LeafNode, NodeValue};
use prensor_core::path::{anonymous_step, Path, Step};
use prensor_core::prensor::{build_prensor, Prensor, RaggedArray, SparseArray};
use prensor_core::schema::DataType;
use prensor_expr::{CalcContext, Expr, ExprRef, Expression};

use crate::add::add_path;
use crate::project::project;

/// Operation from a subtree to a leaf.
pub type PrensorOp = Arc<dyn Fn(&Prensor, &CalcOptions) -> Result<LeafNode> + Send + Sync>;

pub struct MapPrensorExpression {
    /// Known descendants of the projected origin, in path order.
    inputs: Vec<(Path, ExprRef)>,
    op: PrensorOp,
    is_repeated: bool,
    data_type: DataType,
}

impl Expression for MapPrensorExpression {
    fn kind(&self) -> &'static str {
        "map_prensor"
    }

    fn is_repeated(&self) -> bool {
        self.is_repeated
    }

    fn data_type(&self) -> Option<DataType> {
        Some(self.data_type)
    }

    fn sources(&self) -> Vec<ExprRef> {
        self.inputs.iter().map(|(_, e)| ExprRef::clone(e)).collect()
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        if ctx.sources.len() != self.inputs.len() {
            return Err(Error::Invariant(format!(
                "map_prensor: expected {} sources, got {}",
                self.inputs.len(),
                ctx.sources.len()
            )));
        }
        let tree = build_prensor(
            self.inputs
                .iter()
                .map(|(p, _)| p.clone())
                .zip(ctx.sources.iter().cloned()),
        )?;
        let leaf = (self.op)(&tree, ctx.options)?;
        if leaf.values.data_type() != self.data_type {
            return Err(Error::InvalidArgument(format!(
                "map_prensor: type unmatched: actual ({}) != expected ({})",
                leaf.values.data_type(),
                self.data_type
            )));
        }
        Ok(Arc::new(NodeValue::Leaf(leaf)))
    }

    fn child(&self, _this: &ExprRef, _step: &Step) -> Option<ExprRef> {
        None
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        BTreeSet::new()
    }
}

fn map_prensor_impl(
    root: &ExprRef,
    root_path: &Path,
    paths_needed: &[Path],
    op: PrensorOp,
    is_repeated: bool,
    data_type: DataType,
    new_field_name: Step,
) -> Result<(ExprRef, Path)> {
    let origin = project(&root.get_descendant_or_error(root_path)?, paths_needed)?;
    let inputs = origin.get_known_descendants()?.into_iter().collect();
    let expr = Expr::new(MapPrensorExpression {
        inputs,
        op,
        is_repeated,
        data_type,
    });
    let new_path = root_path.child(new_field_name)?;
    Ok((add_path(root, new_path.clone(), expr)?, new_path))
}

/// Add `root_path.new_field_name`, computed by `op` from the subtree at
/// `root_path` projected to `paths_needed` (relative to `root_path`).
pub fn map_prensor<F>(
    root: &ExprRef,
    root_path: &Path,
    paths_needed: &[Path],
    op: F,
    is_repeated: bool,
    data_type: DataType,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef>
where
    F: Fn(&Prensor, &CalcOptions) -> Result<LeafNode> + Send + Sync + 'static,
{
    map_prensor_impl(
        root,
        root_path,
        paths_needed,
        Arc::new(op),
        is_repeated,
        data_type,
        new_field_name.into(),
    )
    .map(|(root, _)| root)
}

fn pick<'a, T>(map: &'a std::collections::BTreeMap<Path, T>, paths: &[Path]) -> Result<Vec<&'a T>> {
    paths
        .iter()
        .map(|p| {
            map.get(p)
                .ok_or_else(|| Error::MissingPath(format!("{} is not a leaf of the mapped subtree", p)))
        })
        .collect()
}

fn ragged_as_leaf(
    result: RaggedArray,
    is_repeated: bool,
    reference: &RaggedArray,
    options: &CalcOptions,
) -> Result<LeafNode> {
    if result.nrows() != reference.nrows() {
        return Err(Error::ShapeMismatch(format!(
            "returned ragged array has {} rows, expected {}",
            result.nrows(),
            reference.nrows()
        )));
    }
    let [partition] = <[_; 1]>::try_from(result.partitions).map_err(|parts: Vec<_>| {
        Error::ShapeMismatch(format!(
            "returned ragged array must have ragged rank 1, got {}",
            parts.len()
        ))
    })?;
    if !is_repeated && options.ragged_checks && !is_strictly_increasing(&partition.value_rowids) {
        return Err(Error::ShapeMismatch(
            "optional result has more than one value per row".to_string(),
        ));
    }
    LeafNode::new(partition.value_rowids, result.values, is_repeated)
}

/// Like [`map_prensor`], but `op` receives the ragged view of each leaf in
/// `paths` and returns a ragged array of rank 1 over the same rows.
pub fn map_ragged_leaves<F>(
    root: &ExprRef,
    root_path: &Path,
    paths: &[Path],
    op: F,
    is_repeated: bool,
    data_type: DataType,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef>
where
    F: Fn(&[&RaggedArray]) -> Result<RaggedArray> + Send + Sync + 'static,
{
    let wanted = paths.to_vec();
    let new_op = move |tree: &Prensor, options: &CalcOptions| -> Result<LeafNode> {
        let ragged = tree.ragged_leaves(options)?;
        let inputs = pick(&ragged, &wanted)?;
        let reference = inputs
            .first()
            .copied()
            .ok_or_else(|| Error::InvalidArgument("map_ragged_leaves: no input paths".to_string()))?;
        let result = op(&inputs)?;
        ragged_as_leaf(result, is_repeated, reference, options)
    };
    map_prensor(root, root_path, paths, new_op, is_repeated, data_type, new_field_name)
}

fn sparse_as_leaf(
    result: SparseArray,
    is_repeated: bool,
    batch_size: usize,
    options: &CalcOptions,
) -> Result<LeafNode> {
    let rank = if is_repeated { 2 } else { 1 };
    if options.sparse_checks {
        if result.dense_shape.first() != Some(&batch_size) {
            return Err(Error::ShapeMismatch(format!(
                "returned sparse array has batch size {:?}, expected {}",
                result.dense_shape.first(),
                batch_size
            )));
        }
        if let Some(bad) = result.indices.iter().find(|ix| ix.len() != rank) {
            return Err(Error::ShapeMismatch(format!(
                "returned sparse index has rank {}, expected {}",
                bad.len(),
                rank
            )));
        }
    }
    let parent_index = result
        .indices
        .iter()
        .map(|ix| {
            ix.first()
                .copied()
                .ok_or_else(|| Error::ShapeMismatch("empty sparse index".to_string()))
        })
        .collect::<Result<Vec<_>>>()?;
    LeafNode::new(parent_index, result.values, is_repeated)
}

/// Like [`map_prensor`], but `op` receives the sparse view of each leaf in
/// `paths` and returns a sparse array whose first dimension is the batch.
pub fn map_sparse_leaves<F>(
    root: &ExprRef,
    root_path: &Path,
    paths: &[Path],
    op: F,
    is_repeated: bool,
    data_type: DataType,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef>
where
    F: Fn(&[&SparseArray]) -> Result<SparseArray> + Send + Sync + 'static,
{
    let wanted = paths.to_vec();
    let new_op = move |tree: &Prensor, options: &CalcOptions| -> Result<LeafNode> {
        let sparse = tree.sparse_leaves()?;
        let inputs = pick(&sparse, &wanted)?;
        let batch_size = inputs
            .first()
            .and_then(|s| s.dense_shape.first().copied())
            .ok_or_else(|| Error::InvalidArgument("map_sparse_leaves: no input paths".to_string()))?;
        let result = op(&inputs)?;
        sparse_as_leaf(result, is_repeated, batch_size, options)
    };
    map_prensor(root, root_path, paths, new_op, is_repeated, data_type, new_field_name)
}

/// `map_prensor` under a fresh anonymous name; returns the new root and path.
pub fn map_prensor_anonymous<F>(
    root: &ExprRef,
    root_path: &Path,
    paths_needed: &[Path],
    op: F,
    is_repeated: bool,
    data_type: DataType,
) -> Result<(ExprRef, Path)>
where
    F: Fn(&Prensor, &CalcOptions) -> Result<LeafNode> + Send + Sync + 'static,
{
    map_prensor_impl(
        root,
        root_path,
        paths_needed,
        Arc::new(op),
        is_repeated,
        data_type,
        anonymous_step(),
    )
}
