//! Method-style access to the transforms.

use std::collections::BTreeMap;

use prensor_core::error::Result;
use prensor_core::path::{Path, Step};
use prensor_expr::ExprRef;

use crate::{broadcast, depth_limit, filter, project, promote, promote_and_broadcast, reroot, size, slice};

/// Transforms as methods on a root expression. Each returns a new root.
pub trait ExprExt {
    fn promote(&self, p: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef>;

    fn broadcast(
        &self,
        origin: &Path,
        sibling: impl Into<Step>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef>;

    fn promote_and_broadcast(
        &self,
        path_dictionary: &BTreeMap<Step, Path>,
        dest_path_parent: &Path,
    ) -> Result<ExprRef>;

    fn filter_by_sibling(
        &self,
        p: &Path,
        sibling_field_name: impl Into<Step>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef>;

    fn filter_by_child(
        &self,
        p: &Path,
        child_field_name: impl Into<Step>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef>;

    fn size(&self, p: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef>;

    fn has(&self, p: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef>;

    fn slice(
        &self,
        p: &Path,
        new_field_name: impl Into<Step>,
        begin: Option<slice::Threshold>,
        end: Option<slice::Threshold>,
    ) -> Result<ExprRef>;

    fn truncate(
        &self,
        p: &Path,
        limit: impl Into<slice::Threshold>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef>;

    fn reroot(&self, p: &Path) -> Result<ExprRef>;

    fn create_proto_index(&self, new_field_name: impl Into<Step>) -> Result<ExprRef>;

    fn project(&self, paths: &[Path]) -> Result<ExprRef>;

    fn limit_depth(&self, depth: usize) -> ExprRef;
}

impl ExprExt for ExprRef {
    fn promote(&self, p: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef> {
        promote::promote(self, p, new_field_name)
    }

    fn broadcast(
        &self,
        origin: &Path,
        sibling: impl Into<Step>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef> {
        broadcast::broadcast(self, origin, sibling, new_field_name)
    }

    fn promote_and_broadcast(
        &self,
        path_dictionary: &BTreeMap<Step, Path>,
        dest_path_parent: &Path,
    ) -> Result<ExprRef> {
        promote_and_broadcast::promote_and_broadcast(self, path_dictionary, dest_path_parent)
    }

    fn filter_by_sibling(
        &self,
        p: &Path,
        sibling_field_name: impl Into<Step>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef> {
        filter::filter_by_sibling(self, p, sibling_field_name, new_field_name)
    }

    fn filter_by_child(
        &self,
        p: &Path,
        child_field_name: impl Into<Step>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef> {
        filter::filter_by_child(self, p, child_field_name, new_field_name)
    }

    fn size(&self, p: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef> {
        size::size(self, p, new_field_name)
    }

    fn has(&self, p: &Path, new_field_name: impl Into<Step>) -> Result<ExprRef> {
        size::has(self, p, new_field_name)
    }

    fn slice(
        &self,
        p: &Path,
        new_field_name: impl Into<Step>,
        begin: Option<slice::Threshold>,
        end: Option<slice::Threshold>,
    ) -> Result<ExprRef> {
        slice::slice_expression(self, p, new_field_name, begin, end)
    }

    fn truncate(
        &self,
        p: &Path,
        limit: impl Into<slice::Threshold>,
        new_field_name: impl Into<Step>,
    ) -> Result<ExprRef> {
        slice::truncate(self, p, limit, new_field_name)
    }

    fn reroot(&self, p: &Path) -> Result<ExprRef> {
        reroot::reroot(self, p)
    }

    fn create_proto_index(&self, new_field_name: impl Into<Step>) -> Result<ExprRef> {
        reroot::create_proto_index_field(self, new_field_name)
    }

    fn project(&self, paths: &[Path]) -> Result<ExprRef> {
        project::project(self, paths)
    }

    fn limit_depth(&self, depth: usize) -> ExprRef {
        depth_limit::limit_depth(self, depth)
    }
}
