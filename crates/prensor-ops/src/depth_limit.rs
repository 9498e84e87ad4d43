//! Cut the known tree a fixed number of levels below an expression.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::Result;
use prensor_core::node::NodeValue;
use prensor_core::path::Step;
use prensor_core::schema::DataType;
use prensor_expr::{CalcContext, Expr, ExprRef, Expression};

pub struct DepthLimitExpression {
    origin: ExprRef,
    depth_limit: usize,
}

impl Expression for DepthLimitExpression {
    fn kind(&self) -> &'static str {
        "depth_limit"
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
        if self.depth_limit == 0 {
            return None;
        }
        let origin = self.origin.get_child(step)?;
        Some(limit_depth(&origin, self.depth_limit - 1))
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        if self.depth_limit == 0 {
            return BTreeSet::new();
        }
        self.origin.known_field_names()
    }

    fn validate_step_format(&self) -> bool {
        self.origin.validate_step_format()
    }
}

/// `expr` with only the nodes at most `depth_limit` steps below it.
pub fn limit_depth(expr: &ExprRef, depth_limit: usize) -> ExprRef {
    Expr::new(DepthLimitExpression {
        origin: ExprRef::clone(expr),
        depth_limit,
    })
}
