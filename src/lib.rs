#![forbid(unsafe_code)]
//! prensor: lazy structural transforms over shredded nested records.
//!
//! A nested record batch is stored column-wise as a `Prensor`: one node per
//! field path, each holding a parent index into the field above it. Transforms
//! (promote, broadcast, filter, slice, ...) build a DAG of lazy expressions;
//! `calculate_prensors` evaluates the DAG once, sharing every duplicated
//! computation, and reassembles the requested trees.
//!
//! ```ignore
//! use prensor::prelude::*;
//!
//! let root = create_expression_from_prensor(batch);
//! let root = root.promote(&create_path("session.event.val")?, "event_val")?;
//! let out = calculate_prensors(&[root], &CalcOptions::default(), None)?;
//! ```

pub use prensor_core as core;
pub use prensor_exec as exec;
pub use prensor_expr as expr;
pub use prensor_ops as ops;
pub use prensor_sched as sched;

pub use prensor_core::{
    build_prensor, create_path, CalcOptions, DataType, Error, NodeValue, Path, Prensor, Result,
    Schema, Step, Values,
};
pub use prensor_exec::{calculate_prensors, calculate_values, Engine, ExecError, FeedDict};
pub use prensor_expr::{Expr, ExprRef, Expression};

/// Everything needed to build and evaluate transforms.
pub mod prelude {
    pub use prensor_core::prelude::*;
    pub use prensor_exec::{
        calculate_prensors, calculate_prensors_with_graph, calculate_values,
        calculate_values_with_graph, Engine, ExecError, ExpressionGraph, FeedDict,
    };
    pub use prensor_expr::{CalcContext, Expr, ExprRef, Expression};
    pub use prensor_ops::*;
}
