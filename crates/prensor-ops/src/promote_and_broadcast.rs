//! Move fields under an arbitrary destination parent.
//!
//! An origin is promoted until its parent is the least common ancestor of
//! the origin and the destination, then broadcast down the destination path
//! one level at a time.

use std::collections::BTreeMap;

use prensor_core::error::{Error, Result};
use prensor_core::path::{Path, Step};
use prensor_expr::ExprRef;

use crate::add::{add_path, add_to};
use crate::broadcast::broadcast_anonymous;
use crate::promote::promote_anonymous;

/// Promote and broadcast `origin` until its parent is `new_parent`; the result
/// gets an anonymous name.
pub fn promote_and_broadcast_anonymous(
    root: &ExprRef,
    origin: &Path,
    new_parent: &Path,
) -> Result<(ExprRef, Path)> {
    let lca = origin.least_common_ancestor(new_parent);
    let mut expr = ExprRef::clone(root);
    let mut path = origin.clone();
    while path.parent()? != lca {
        (expr, path) = promote_anonymous(&expr, &path)?;
    }
    while path.parent()? != *new_parent {
        let step = new_parent
            .steps()
            .get(path.len() - 1)
            .ok_or_else(|| {
                Error::InvalidArgument(format!("cannot broadcast {} under {}", origin, new_parent))
            })?
            .clone();
        (expr, path) = broadcast_anonymous(&expr, &path, step)?;
    }
    Ok((expr, path))
}

fn promote_and_broadcast_name(
    root: &ExprRef,
    origin: &Path,
    dest_path_parent: &Path,
    field_name: &Step,
) -> Result<ExprRef> {
    let (new_root, anonymous_path) = promote_and_broadcast_anonymous(root, origin, dest_path_parent)?;
    let result = new_root.get_descendant_or_error(&anonymous_path)?;
    add_path(&new_root, dest_path_parent.child(field_name)?, result)
}

/// For each `(field, origin)` pair, move `origin` to `dest_path_parent.field`.
pub fn promote_and_broadcast(
    root: &ExprRef,
    path_dictionary: &BTreeMap<Step, Path>,
    dest_path_parent: &Path,
) -> Result<ExprRef> {
    let mut result_paths = BTreeMap::new();
    for (field_name, origin) in path_dictionary {
        let new_root = promote_and_broadcast_name(root, origin, dest_path_parent, field_name)?;
        result_paths.insert(dest_path_parent.child(field_name)?, new_root);
    }
    add_to(root, result_paths)
}
