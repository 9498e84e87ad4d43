#![forbid(unsafe_code)]
//! prensor-ops: structural transforms over expression trees.
//!
//! Every transform is a free function taking a root `ExprRef` and returning a
//! new root (plus the new path for the `_anonymous` variants). Roots are
//! never modified: new fields are overlaid with `add_paths`, so the original
//! tree and every intermediate tree stay usable and share their nodes.
//!
//! Array work happens only at calculation time, inside the `Expression`
//! implementations, using the kernels in `prensor_core::kernels`.

pub mod add;
pub mod broadcast;
pub mod depth_limit;
pub mod direct;
pub mod ext;
pub mod filter;
pub mod index;
pub mod map_prensor;
pub mod map_prensor_to_prensor;
pub mod map_values;
pub mod placeholder;
pub mod project;
pub mod promote;
pub mod promote_and_broadcast;
pub mod reroot;
pub mod size;
pub mod slice;

pub use add::{add_path, add_paths, add_to, create_subtrees, is_true_source, AddPathsExpression};
pub use broadcast::{broadcast, broadcast_anonymous};
pub use depth_limit::limit_depth;
pub use direct::create_expression_from_prensor;
pub use ext::ExprExt;
pub use filter::{filter_by_child, filter_by_sibling};
pub use index::{get_index_from_end, get_positional_index};
pub use map_prensor::{
    map_prensor, map_prensor_anonymous, map_ragged_leaves, map_sparse_leaves, PrensorOp,
};
pub use map_prensor_to_prensor::{map_prensor_to_prensor, PrensorToPrensorOp};
pub use map_values::{map_many_values, map_values, map_values_anonymous, ValuesOp};
pub use placeholder::create_placeholder;
pub use project::project;
pub use promote::{promote, promote_anonymous};
pub use promote_and_broadcast::{promote_and_broadcast, promote_and_broadcast_anonymous};
pub use reroot::{create_proto_index_field, reroot};
pub use size::{has, size, size_anonymous};
pub use slice::{slice_expression, truncate, Threshold};
