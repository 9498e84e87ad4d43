#![forbid(unsafe_code)]
//! prensor-sched: evaluation ordering for expression graphs.
//!
//! Responsibilities:
//! - Kahn-style topological ordering over `ExprId` dependency edges.
//! - Track the ready frontier while ordering (for diagnostics).
//! - Verify that an order puts every source before its readers.
//!
//! **No evaluation here.** The exec crate drives the order this crate produces.

pub mod order;
pub mod verify;

pub use order::{
    topological_order, topological_order_with_stats, OrderStats, SchedError, TopoOrder,
};
pub use verify::check_topological;
