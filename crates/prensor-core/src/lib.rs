#![forbid(unsafe_code)]
//! prensor-core: the shredded tree-of-columns data model.
//!
//! Responsibilities:
//! - `Path`/`Step`: immutable, totally ordered field paths (with anonymous steps).
//! - `NodeValue`: Root/Child/Leaf node variants over parent-index arrays.
//! - `Prensor`: an ordered tree of node values keyed by step.
//! - `kernels`: the array primitives (gather, run-length, equi-join, segment counts).
//!
//! **No expression graph here.** The expr/exec crates build on top of this.

pub mod config;
pub mod error;
pub mod id;
pub mod kernels;
pub mod node;
pub mod path;
pub mod prelude;
pub mod prensor;
pub mod schema;
pub mod types;

pub use config::{CalcOptions, ValidationLevel};
pub use error::{Error, Result};
pub use node::{ChildNode, LeafNode, NodeValue, RootNode};
pub use path::{anonymous_step, create_path, Path, Step};
pub use prensor::{build_prensor, Prensor, RaggedArray, RowPartition, SparseArray};
pub use schema::{DataType, Schema};
pub use types::{Scalar, Values};

pub const VERSION: &str = env!("CARGO_PKG_VERSION");
