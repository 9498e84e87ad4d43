//! Expressions over already-computed values.

use std::collections::BTreeSet;
use std::sync::Arc;

use prensor_core::error::Result;
use prensor_core::node::NodeValue;
use prensor_core::path::Step;
use prensor_core::prensor::Prensor;
use prensor_core::schema::DataType;
use prensor_expr::{AsAny, CalcContext, Expr, ExprRef, Expression};

/// Returns a stored node value; its children wrap the stored child subtrees.
pub struct DirectExpression {
    prensor: Prensor,
}

impl DirectExpression {
    pub fn prensor(&self) -> &Prensor {
        &self.prensor
    }
}

impl Expression for DirectExpression {
    fn kind(&self) -> &'static str {
        "direct"
    }

    fn is_repeated(&self) -> bool {
        self.prensor.node().is_repeated()
    }

    fn data_type(&self) -> Option<DataType> {
        self.prensor.node().data_type()
    }

    fn sources(&self) -> Vec<ExprRef> {
        Vec::new()
    }

    fn calculate(&self, _ctx: &CalcContext<'_>) -> Result<Arc<NodeValue>> {
        Ok(Arc::clone(self.prensor.node()))
    }

    fn calculation_equal(&self, other: &dyn Expression) -> bool {
        other
            .as_any()
            .downcast_ref::<DirectExpression>()
            .is_some_and(|o| Arc::ptr_eq(self.prensor.node(), o.prensor.node()))
    }

    fn child(&self, _this: &ExprRef, step: &Step) -> Option<ExprRef> {
        self.prensor
            .get_child(step)
            .map(|c| create_expression_from_prensor(c.clone()))
    }

    fn known_field_names(&self) -> BTreeSet<Step> {
        self.prensor.field_names()
    }
}

/// An expression tree that evaluates to `prensor`.
pub fn create_expression_from_prensor(prensor: Prensor) -> ExprRef {
    Expr::new(DirectExpression { prensor })
}
