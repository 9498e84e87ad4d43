//! Placeholders: expression trees whose values are bound at calculation time.
//!
//! A placeholder root is declared from a `Schema`. At calculation time the
//! caller binds a prensor to the root's id in the feed; every placeholder
//! node then returns the bound subtree at its own path.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::id::ExprId;
use prensor_core::node::NodeValue;
use prensor_core::path::{Path, Step};
use prensor_core::schema::{DataType, Schema};
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression, PlaceholderBinding};

fn bound_node(ctx: &CalcContext<'_>, what: &str) -> Result<Arc<NodeValue>> {
    ctx.side_info
        .map(|t| Arc::clone(t.node()))
        .ok_or_else(|| Error::InvalidArgument(format!("{} requires a bound value", what)))
}

fn placeholder_child(parent: &ExprRef, root: ExprId, at: &Path, schema: &Schema, step: &Step) -> Option<ExprRef> {
    let child_schema = schema.get_child(step)?.clone();
    Some(Expr::new(PlaceholderChildExpression {
        parent: ExprRef::clone(parent),
        root,
        path: at.join_step(step),
        schema: child_schema,
    }))
}

pub struct PlaceholderRootExpression {
    schema: Schema,
}

impl PlaceholderRootExpression {
    pub fn schema(&self) -> &Schema {
        &self.schema
    }
}

impl Expression for PlaceholderRootExpression {
    fn kind(&self) -> &'static str {
        "placeholder_root"
    }

    fn is_repeated(&self) -> bool {
        true
    }

    fn data_type(&self) -> Option<DataType> {
        None
    }

    fn sources(&self) -> Vec<ExprRef> {
        Vec::new()
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        bound_node(ctx, "placeholder root")
    }

    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef> {
        placeholder_child(this, this.id(), &Path::root(), &self.schema, step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.schema.known_field_names()
    }

    fn placeholder_binding(&self) -> Option<PlaceholderBinding> {
        Some(PlaceholderBinding::Root)
    }
}

pub struct PlaceholderChildExpression {
    parent: ExprRef,
    root: ExprId,
    path: Path,
    schema: Schema,
}

impl PlaceholderChildExpression {
    /// Path from the placeholder root.
    pub fn path(&self) -> &Path {
        &self.path
    }
}

impl Expression for PlaceholderChildExpression {
    fn kind(&self) -> &'static str {
        "placeholder_child"
    }

    fn is_repeated(&self) -> bool {
        self.schema.is_repeated
    }

    fn data_type(&self) -> Option<DataType> {
        self.schema.data_type
    }

    fn sources(&self) -> Vec<ExprRef> {
        vec![ExprRef::clone(&self.parent)]
    }

    fn calculate(&self, ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        bound_node(ctx, "placeholder")
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other
            .as_any()
            .downcast_ref::<Self>()
            .is_some_and(|o| o.root == self.root && o.path == self.path)
    }

    fn child(&self, this: &ExprRef, step: &Step) -> Option<ExprRef> {
        placeholder_child(this, self.root, &self.path, &self.schema, step)
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.schema.known_field_names()
    }

    fn placeholder_binding(&self) -> Option<PlaceholderBinding> {
        Some(PlaceholderBinding::Descendant {
            root: self.root,
            path: self.path.clone(),
        })
    }
}

/// A placeholder root shaped like `schema`. Bind a prensor to its `id()` in
/// the feed when calculating.
pub fn create_placeholder(schema: Schema) -> ExprRef {
    Expr::new(PlaceholderRootExpression { schema })
}
