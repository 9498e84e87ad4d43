//! Array primitives over parent-index arrays.
//!
//! These are the only numeric kernels the structural transforms need. They are
//! written for clarity over raw throughput; every index access is checked and
//! reported as `Error::Invariant` instead of panicking.

use std::collections::HashMap;

use crate::error::{Error, Result};

/// `out[i] = data[indices[i]]`.
pub fn gather<T: Clone>(data: &[T], indices: &[usize]) -> Result<Vec<T>> {
    indices
        .iter()
        .map(|&i| {
            data.get(i).cloned().ok_or_else(|| {
                Error::Invariant(format!(
                    "gather index {} out of range for length {}",
                    i,
                    data.len()
                ))
            })
        })
        .collect()
}

/// For each element, how many earlier elements share its value in the current run.
///
/// `[0, 0, 2, 2, 2, 3]` gives `[0, 1, 0, 1, 2, 0]`. On a parent index this is
/// the position of each element within its parent.
pub fn run_length_before(parent_index: &[usize]) -> Vec<usize> {
    let mut out = Vec::with_capacity(parent_index.len());
    let mut prev: Option<usize> = None;
    let mut run = 0usize;
    for &p in parent_index {
        if prev == Some(p) {
            run += 1;
        } else {
            run = 0;
            prev = Some(p);
        }
        out.push(run);
    }
    out
}

/// All index pairs `(i, j)` with `a[i] == b[j]`, for non-decreasing `a` and `b`.
///
/// Pairs come out ordered by `i`, then by `j`. Duplicates on both sides produce
/// the full cross product of the two runs.
pub fn equi_join_indices(a: &[usize], b: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut index_a = Vec::new();
    let mut index_b = Vec::new();
    let (mut ia, mut ib) = (0usize, 0usize);
    while ia < a.len() && ib < b.len() {
        if a[ia] < b[ib] {
            ia += 1;
        } else if a[ia] > b[ib] {
            ib += 1;
        } else {
            // Emit the whole run of b for this element of a, then advance a only:
            // the next element of a may match the same run.
            let mut j = ib;
            while j < b.len() && b[j] == a[ia] {
                index_a.push(ia);
                index_b.push(j);
                j += 1;
            }
            ia += 1;
        }
    }
    (index_a, index_b)
}

/// Like [`equi_join_indices`] but with no ordering requirement on either side.
///
/// Pairs come out ordered by `i`, then by `j`.
pub fn equi_join_any_indices(a: &[usize], b: &[usize]) -> (Vec<usize>, Vec<usize>) {
    let mut positions: HashMap<usize, Vec<usize>> = HashMap::new();
    for (j, &v) in b.iter().enumerate() {
        positions.entry(v).or_default().push(j);
    }
    let mut index_a = Vec::new();
    let mut index_b = Vec::new();
    for (i, v) in a.iter().enumerate() {
        if let Some(js) = positions.get(v) {
            for &j in js {
                index_a.push(i);
                index_b.push(j);
            }
        }
    }
    (index_a, index_b)
}

/// Scatter-add one per element into a zeroed array of length `extent`.
pub fn segment_counts(parent_index: &[usize], extent: usize) -> Result<Vec<i64>> {
    let mut counts = vec![0i64; extent];
    for &p in parent_index {
        let slot = counts.get_mut(p).ok_or_else(|| {
            Error::Invariant(format!(
                "parent index {} out of range for extent {}",
                p, extent
            ))
        })?;
        *slot += 1;
    }
    Ok(counts)
}

/// Positions where `mask` is true.
pub fn true_indices(mask: &[bool]) -> Vec<usize> {
    mask.iter()
        .enumerate()
        .filter_map(|(i, &keep)| if keep { Some(i) } else { None })
        .collect()
}

pub fn is_non_decreasing(xs: &[usize]) -> bool {
    xs.windows(2).all(|w| w[0] <= w[1])
}

pub fn is_strictly_increasing(xs: &[usize]) -> bool {
    xs.windows(2).all(|w| w[0] < w[1])
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn run_length_before_counts_within_runs() {
        assert_eq!(
            run_length_before(&[0, 0, 2, 2, 2, 3]),
            vec![0, 1, 0, 1, 2, 0]
        );
        assert!(run_length_before(&[]).is_empty());
    }

    #[test]
    fn equi_join_with_duplicates_on_both_sides() {
        let (ia, ib) = equi_join_indices(&[0, 0, 1], &[0, 1]);
        assert_eq!(ia, vec![0, 1, 2]);
        assert_eq!(ib, vec![0, 0, 1]);

        let (ia, ib) = equi_join_indices(&[0, 1, 1, 3], &[1, 1, 2, 3]);
        assert_eq!(ia, vec![1, 1, 2, 2, 3]);
        assert_eq!(ib, vec![0, 1, 0, 1, 3]);
    }

    #[test]
    fn equi_join_any_matches_sorted_join_on_sorted_input() {
        let a = [0, 0, 2, 5, 5];
        let b = [0, 2, 2, 5];
        assert_eq!(equi_join_any_indices(&a, &b), equi_join_indices(&a, &b));
        let (ia, ib) = equi_join_any_indices(&[3, 1, 3], &[1, 3]);
        assert_eq!(ia, vec![0, 1, 2]);
        assert_eq!(ib, vec![1, 0, 1]);
    }

    #[test]
    fn segment_counts_scatter() {
        assert_eq!(segment_counts(&[0, 0, 1], 3).unwrap(), vec![2, 1, 0]);
        assert!(segment_counts(&[4], 3).is_err());
    }

    #[test]
    fn gather_checks_bounds() {
        assert_eq!(gather(&[9, 8], &[0, 0, 1]).unwrap(), vec![9, 9, 8]);
        assert!(matches!(gather(&[1], &[1]), Err(Error::Invariant(_))));
    }
}
