//! Python-style slicing of each parent's list of elements.
//!
//! For each parent, keep the elements whose position is in
//! `[begin_index, end_index)`:
//! - no `begin`: begin_index is 0
//! - negative `begin`: begin_index is the list size plus `begin`
//! - no `end`: everything to the end of the list
//! - negative `end`: end_index is the list size plus `end`
//!
//! ```text
//! root: { foo: 5 foo: 6 }  root: { foo: 7 }
//! slice_expression(root, "foo", "foo_slice", Some(1), None)
//! foo_slice: 6  (parent index 0)
//! ```
//!
//! Built from smaller transforms: positional indices and a boolean mask as
//! anonymous siblings, `filter_by_sibling` on the mask, then `add_to` to
//! publish only the sliced field on the original root.

use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use prensor_core::error::{Error, Result};
use prensor_core::path::{anonymous_step, Path, Step};
use prensor_core::schema::DataType;
use prensor_core::types::Values;
use prensor_expr::ExprRef;

use crate::add::add_to;
use crate::filter::filter_by_sibling_impl;
use crate::index::{get_index_from_end, get_positional_index};
use crate::map_values::{map_many_values, map_values_anonymous};

/// A slice bound, fixed when the slice is declared or read at calculation time.
#[derive(Clone)]
pub enum Threshold {
    Fixed(i64),
    Dynamic(Arc<dyn Fn() -> i64 + Send + Sync>),
}

impl Threshold {
    pub fn dynamic<F>(f: F) -> Self
    where
        F: Fn() -> i64 + Send + Sync + 'static,
    {
        Threshold::Dynamic(Arc::new(f))
    }

    pub fn value(&self) -> i64 {
        match self {
            Threshold::Fixed(v) => *v,
            Threshold::Dynamic(f) => f(),
        }
    }
}

impl From<i64> for Threshold {
    fn from(v: i64) -> Self {
        Threshold::Fixed(v)
    }
}

impl fmt::Debug for Threshold {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Threshold::Fixed(v) => f.debug_tuple("Fixed").field(v).finish(),
            Threshold::Dynamic(_) => f.write_str("Dynamic(..)"),
        }
    }
}

#[derive(Debug, Clone, Copy)]
enum Relation {
    /// `index >= threshold`, for begin.
    AtLeast,
    /// `index < threshold`, for end.
    Below,
}

impl Relation {
    fn holds(self, index: i64, threshold: i64) -> bool {
        match self {
            Relation::AtLeast => index >= threshold,
            Relation::Below => index < threshold,
        }
    }
}

fn int64_values(values: &Values) -> Result<&[i64]> {
    values
        .as_i64()
        .ok_or_else(|| Error::Invariant(format!("slice: expected int64 indices, got {}", values.data_type())))
}

fn bool_values(values: &Values) -> Result<&[bool]> {
    values
        .as_bool()
        .ok_or_else(|| Error::Invariant(format!("slice: expected a bool mask, got {}", values.data_type())))
}

fn relation_mask(
    relation: Relation,
    threshold: Threshold,
) -> impl Fn(&Values) -> Result<Values> + Send + Sync + 'static {
    move |indices: &Values| {
        let t = threshold.value();
        Ok(Values::Bool(
            int64_values(indices)?
                .iter()
                .map(|&i| relation.holds(i, t))
                .collect(),
        ))
    }
}

/// Mask over `p` that is true where `relation(index, threshold)` holds; the
/// index counts from the end when the threshold is negative.
fn get_mask(
    root: &ExprRef,
    p: &Path,
    threshold: &Threshold,
    relation: Relation,
) -> Result<(ExprRef, Path)> {
    root.get_descendant_or_error(p)?;
    let from_end = |work: &ExprRef| -> Result<(ExprRef, Path)> {
        let (work, index) = get_index_from_end(work, p, anonymous_step())?;
        map_values_anonymous(&work, &index, relation_mask(relation, threshold.clone()), DataType::Boolean)
    };
    let from_start = |work: &ExprRef| -> Result<(ExprRef, Path)> {
        let (work, index) = get_positional_index(work, p, anonymous_step())?;
        map_values_anonymous(&work, &index, relation_mask(relation, threshold.clone()), DataType::Boolean)
    };
    match threshold {
        Threshold::Fixed(t) if *t >= 0 => from_start(root),
        Threshold::Fixed(_) => from_end(root),
        Threshold::Dynamic(_) => {
            let (work, non_negative) = from_start(root)?;
            let (work, negative) = from_end(&work)?;
            let threshold = threshold.clone();
            map_many_values(
                &work,
                &p.parent()?,
                &[last_step(&non_negative)?, last_step(&negative)?],
                move |masks: &[&Values]| match masks {
                    [non_negative, negative] => {
                        if threshold.value() >= 0 {
                            Ok((*non_negative).clone())
                        } else {
                            Ok((*negative).clone())
                        }
                    }
                    _ => Err(Error::Invariant("slice: expected two masks".to_string())),
                },
                DataType::Boolean,
                anonymous_step(),
            )
        }
    }
}

fn last_step(p: &Path) -> Result<Step> {
    p.last_step()
        .cloned()
        .ok_or_else(|| Error::Invariant("slice: mask cannot be the root".to_string()))
}

fn get_slice_mask(
    root: &ExprRef,
    p: &Path,
    begin: Option<&Threshold>,
    end: Option<&Threshold>,
) -> Result<(ExprRef, Path)> {
    match (begin, end) {
        (None, None) => Err(Error::InvalidArgument(
            "must specify begin or end".to_string(),
        )),
        (None, Some(end)) => get_mask(root, p, end, Relation::Below),
        (Some(begin), None) => get_mask(root, p, begin, Relation::AtLeast),
        (Some(begin), Some(end)) => {
            let (work, begin_mask) = get_mask(root, p, begin, Relation::AtLeast)?;
            let (work, end_mask) = get_mask(&work, p, end, Relation::Below)?;
            map_many_values(
                &work,
                &p.parent()?,
                &[last_step(&begin_mask)?, last_step(&end_mask)?],
                |masks: &[&Values]| match masks {
                    [a, b] => Ok(Values::Bool(
                        bool_values(a)?
                            .iter()
                            .zip(bool_values(b)?)
                            .map(|(x, y)| *x && *y)
                            .collect(),
                    )),
                    _ => Err(Error::Invariant("slice: expected two masks".to_string())),
                },
                DataType::Boolean,
                anonymous_step(),
            )
        }
    }
}

/// Slice every list at `p` into a new sibling `new_field_name`; the subtree
/// below `p` comes along.
pub fn slice_expression(
    root: &ExprRef,
    p: &Path,
    new_field_name: impl Into<Step>,
    begin: Option<Threshold>,
    end: Option<Threshold>,
) -> Result<ExprRef> {
    let new_field_name = new_field_name.into();
    let (work, mask_path) = get_slice_mask(root, p, begin.as_ref(), end.as_ref())?;
    let (work, new_path) = filter_by_sibling_impl(&work, p, &last_step(&mask_path)?, &new_field_name)?;

    #[cfg(feature = "tracing")]
    tracing::trace!(source = %p, target = %new_path, ?begin, ?end, "slice");

    add_to(root, BTreeMap::from([(new_path, work)]))
}

/// Keep the first `limit` elements of each list at `p`, as `new_field_name`.
pub fn truncate(
    root: &ExprRef,
    p: &Path,
    limit: impl Into<Threshold>,
    new_field_name: impl Into<Step>,
) -> Result<ExprRef> {
    slice_expression(root, p, new_field_name, None, Some(limit.into()))
}
