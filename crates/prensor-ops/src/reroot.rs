//! Make a descendant the new root while remembering where records came from.
//!
//! Each element of the new root records the index of the original top-level
//! record it belongs to (`input_proto_index`); `create_proto_index_field`
//! exposes that as a field.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::kernels::gather;
use prensor_core::node::{LeafNode, NodeValue, RootNode};
use prensor_core::path::{Path, Step};
use prensor_core::schema::DataType;
use prensor_core::types::Values;
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression};

use crate::add::add_path;

fn input_proto_index(root: &RootNode) -> Vec<usize> {
    root.input_proto_index
        .clone()
        .unwrap_or_else(|| (0..root.size).collect())
}

fn require_root<'a>(value: &'a NodeValue, what: &str) -> Result<&'a RootNode> {
    value
        .as_root()
        .ok_or_else(|| Error::InvalidArgument(format!("{}: expected a root, got {}", what, value)))
}

/// One level of rerooting: the child `field_name` of `original_root` becomes
/// the root.
pub struct RerootExpression {
    original_root: ExprRef,
    new_root: ExprRef,
}

impl Expression for RerootExpression {
    fn kind(&self) -> &'static str {
        "reroot"
    }

    fn is_repeated(&self) -> bool {
        true
    }

    fn data_type(&self) -> Option<DataType> {
        None
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.original_root), ExprRef::clone(&self.new_root)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let (old_root, new_root) = ctx.source_pair(self.kind())?;
        let old_root = require_root(old_root, "reroot")?;
        let new_root = new_root
            .as_child()
            .ok_or_else(|| Error::InvalidArgument(format!("reroot: new root must be a child, got {}", new_root)))?;
        let mut root = RootNode::new(new_root.parent_index.len());
        root.input_proto_index = Some(gather(&input_proto_index(old_root), &new_root.parent_index)?);
        Ok(Arc::new(NodeValue::Root(root)))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other.as_any().is::<Self>()
    }

    fn child(&self, _this: &ExprRef, step: &Step) -> Option<ExprRef> {
        self.new_root.get_child(step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.new_root.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.new_root.validate_step_format()
    }
}

/// The original record index of each root element, as a required int64 leaf.
pub struct InputProtoIndexExpression {
    root: ExprRef,
}

impl Expression for InputProtoIndexExpression {
    fn kind(&self) -> &'static str {
        "input_proto_index"
    }

    fn is_repeated(&self) -> bool {
        false
    }

    fn data_type(&self) -> Option<DataType> {
        Some(DataType::Int64)
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.root)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        let root = require_root(ctx.single_source(self.kind())?, "input proto index")?;
        let values = input_proto_index(root).into_iter().map(|i| i as i64).collect();
        Ok(Arc::new(NodeValue::Leaf(LeafNode::new(
            (0..root.size).collect(),
            Values::I64(values),
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

/// A root whose elements are the elements at `source_path`.
///
/// Like `root.get_descendant_or_error(source_path)`, but the result is a true
/// root that still knows the original record of each element.
pub fn reroot(root: &ExprRef, source_path: &Path) -> Result<ExprRef> {
    let mut current = ExprRef::clone(root);
    for step in source_path.steps() {
        let new_root = current.get_child_or_error(step)?;
        if new_root.is_leaf() {
            return Err(Error::InvalidArgument(format!(
                "new root must be a message type: {}",
                step
            )));
        }
        current = Expr::new(RerootExpression {
            original_root: current,
            new_root,
        });
    }
    Ok(current)
}

/// Add the original record index of each root element as `new_field_name`.
pub fn create_proto_index_field(root: &ExprRef, new_field_name: impl Into<Step>) -> Result<ExprRef> {
    let new_path = Path::root().child(new_field_name)?;
    let expr = Expr::new(InputProtoIndexExpression {
        root: ExprRef::clone(root),
    });
    add_path(root, new_path, expr)
}
