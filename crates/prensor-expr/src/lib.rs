#![forbid(unsafe_code)]
//! prensor-expr: lazy expressions over prensors and the graph built from them.
//!
//! Design:
//! - `Expression` is the capability trait every transform implements
//!   (sources, calculate, identity, equality, children).
//! - `Expr` wraps one implementation with a process-unique `ExprId` and a
//!   child-lookup cache; `ExprRef = Arc<Expr>` is what callers pass around.
//! - `graph` discovers the nodes a set of requested expressions needs,
//!   collapsing identity chains.
//! - `canonical` merges nodes that compute the same function of the same
//!   (already canonical) sources.
//!
//! NOTE: nothing here knows about specific transforms; those live in
//! `prensor-ops` and plug in through the trait.

pub mod canonical;
pub mod expression;
pub mod graph;

pub use canonical::{CanonicalGraph, CanonicalNode};
pub use expression::{
    same_object, AsAny, CalcContext, Expr, ExprRef, Expression, PlaceholderBinding,
};
pub use graph::{earliest_equivalent, same_computation, GraphNode, OriginalGraph};
