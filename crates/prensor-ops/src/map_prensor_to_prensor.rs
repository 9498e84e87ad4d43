//! Map a whole subtree to a new subtree described by a schema.
//!
//! The operation sees the subtree at `root_path` (projected to the paths it
//! asks for) and returns a prensor whose root stands for the same elements.
//! Every child in the output schema is added under `root_path`; deeper
//! fields are reachable through the schema as well.
//!
//! All output fields share one run of the operation per set of input values.

use std::collections::{BTreeMap, BTreeSet};
use std::sync::{Arc, Mutex};

use prensor_core::config::CalcOptions;
use prensor_core::error::{Error, Result};
use prensor_core::node::NodeValue;
use prensor_core::path::{Path, Step};
use prensor_core::prensor::{build_prensor, Prensor};
use prensor_core::schema::{DataType, Schema};
use prensor_expr::{CalcContext, Expr, ExprRef, Expression};

use crate::add::add_paths;
use crate::project::project;

/// Operation from a subtree to a subtree.
pub type PrensorToPrensorOp =
    Arc<dyn Fn(&Prensor, &CalcOptions) -> Result<Prensor> + Send + Sync>;

type CachedRun = (Vec<Arc<NodeValue>>, Arc<Prensor>);

struct MappedRun {
    /// Known descendants of the projected origin, in path order.
    inputs: Vec<(Path, ExprRef)>,
    op: PrensorToPrensorOp,
    schema: Schema,
    last: Mutex<Option<CachedRun>>,
}

impl MappedRun {
    fn result(&self, sources: &[Arc<NodeValue>], options: &CalcOptions) -> Result<Arc<Prensor>> {
        let mut last = self
            .last
            .lock()
            .map_err(|_| Error::Invariant("map_prensor_to_prensor: result cache poisoned".to_string()))?;
        if let Some((seen, tree)) = last.as_ref() {
            if seen.len() == sources.len() && seen.iter().zip(sources).all(|(a, b)| Arc::ptr_eq(a, b)) {
                return Ok(Arc::clone(tree));
            }
        }

        if sources.len() != self.inputs.len() {
            return Err(Error::Invariant(format!(
                "map_prensor_to_prensor: expected {} sources, got {}",
                self.inputs.len(),
                sources.len()
            )));
        }
        let input = build_prensor(
            self.inputs
                .iter()
                .map(|(p, _)| p.clone())
                .zip(sources.iter().cloned()),
        )?;
        let output = (self.op)(&input, options)?;
        if options.ragged_checks && output.node().size() != input.node().size() {
            return Err(Error::ShapeMismatch(format!(
                "map_prensor_to_prensor: result root has {} elements, input has {}",
                output.node().size(),
                input.node().size()
            )));
        }
        check_against_schema(&output, &self.schema, &Path::root())?;

        let tree = Arc::new(output);
        *last = Some((sources.to_vec(), Arc::clone(&tree)));
        Ok(tree)
    }
}

fn check_against_schema(tree: &Prensor, schema: &Schema, at: &Path) -> Result<()> {
    for (step, child_schema) in &schema.children {
        let child_at = at.join_step(step);
        let child = tree.get_child(step).ok_or_else(|| {
            Error::MissingPath(format!("map_prensor_to_prensor: result has no {}", child_at))
        })?;
        let node = child.node();
        if node.is_repeated() != child_schema.is_repeated || node.data_type() != child_schema.data_type {
            return Err(Error::InvalidArgument(format!(
                "map_prensor_to_prensor: result at {} is {}, schema expects {} {}",
                child_at,
                node,
                if child_schema.is_repeated { "repeated" } else { "optional" },
                child_schema
                    .data_type
                    .map_or_else(|| "message".to_string(), |t| t.to_string())
            )));
        }
        check_against_schema(child, child_schema, &child_at)?;
    }
    Ok(())
}

/// One field of the mapped subtree, at `path` below its root.
pub struct MappedFieldExpression {
    run: Arc<MappedRun>,
    path: Path,
    schema: Schema,
}

impl Expression for MappedFieldExpression {
    fn kind(&self) -> &'static str {
        "map_prensor_to_prensor"
    }

    fn is_repeated(&self) -> bool {
        self.schema.is_repeated
    }

    fn data_type(&self) -> Option<DataType> {
        self.schema.data_type
    }

    fn sources(&self) -> Vec<ExprRef> {
        self.run.inputs.iter().map(|(_, e)| ExprRef::clone(e)).collect()
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let tree = self.run.result(ctx.sources, ctx.options)?;
        Ok(Arc::clone(tree.get_descendant_or_error(&self.path)?.node()))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| Arc::ptr_eq(&self.run, &o.run) && self.path == o.path)
    }

    fn child(&self, _this: &ExprRef, step: &Step) -> Option<ExprRef> {
        mapped_field(&self.run, &self.path, &self.schema, step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.schema.known_field_names()
    }
}

fn mapped_field(run: &Arc<MappedRun>, at: &Path, schema: &Schema, step: &Step) -> Option<ExprRef> {
    let schema = schema.get_child(step)?.clone();
    Some(Expr::new(MappedFieldExpression {
        run: Arc::clone(run),
        path: at.join_step(step),
        schema,
    }))
}

/// Run `op` on the subtree at `root_path` projected to `paths_needed`
/// (relative to `root_path`), and add every top-level field of its result
/// under `root_path`.
///
/// `output_schema` describes the result: its children become the new fields,
/// and the calculated result must match it in repeatedness and type.
pub fn map_prensor_to_prensor<F>(
    root: &ExprRef,
    root_path: &Path,
    paths_needed: &[Path],
    op: F,
    output_schema: Schema,
) -> Result<ExprRef>
where
    F: Fn(&Prensor, &CalcOptions) -> Result<Prensor> + Send + Sync + 'static,
{
    if output_schema.children.is_empty() {
        return Err(Error::InvalidArgument(
            "map_prensor_to_prensor: output schema has no fields".to_string(),
        ));
    }
    let origin = project(&root.get_descendant_or_error(root_path)?, paths_needed)?;
    let run = Arc::new(MappedRun {
        inputs: origin.get_known_descendants()?.into_iter().collect(),
        op: Arc::new(op),
        schema: output_schema,
        last: Mutex::new(None),
    });

    let mut path_map = BTreeMap::new();
    for step in run.schema.known_field_names() {
        let expr = mapped_field(&run, &Path::root(), &run.schema, &step)
            .ok_or_else(|| Error::Invariant(format!("no schema for {}", step)))?;
        path_map.insert(root_path.child(step)?, expr);
    }
    add_paths(root, path_map)
}
