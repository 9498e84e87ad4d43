#![forbid(unsafe_code)]
//! prensor-exec: evaluate expression graphs and reassemble prensors.
//!
//! The engine builds the original graph, canonicalizes it, orders the
//! canonical nodes with Kahn's algorithm and calculates each exactly once.
//! Every result is checked against the declared contract of its expression.
//! Results are shared (`Arc`), so a common subexpression yields the same
//! value object everywhere it appears.

pub mod metrics;
pub mod runtime;

pub use runtime::{
    calculate_prensors, calculate_prensors_with_graph, calculate_values,
    calculate_values_with_graph, Engine, ExecError, ExpressionGraph, FeedDict,
};
