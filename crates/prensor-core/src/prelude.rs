//! Convenient re-exports for downstream crates.

pub use crate::config::{CalcOptions, ValidationLevel};
pub use crate::error::{Error, Result};
pub use crate::id::{AnonymousId, ExprId};
pub use crate::node::{ChildNode, LeafNode, NodeValue, RootNode};
pub use crate::path::{anonymous_step, create_path, Path, Step};
pub use crate::prensor::{build_prensor, Prensor};
pub use crate::schema::{DataType, Schema};
pub use crate::types::{Scalar, Values};
