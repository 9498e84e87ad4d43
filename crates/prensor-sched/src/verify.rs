//! Verification of evaluation orders.
//!
//! The exec crate checks every order it builds before evaluating; the check
//! is linear in the number of edges.

use std::collections::{BTreeMap, HashSet};

use prensor_core::id::ExprId;

use crate::order::SchedError;

/// Every source of every node must appear before the node itself.
pub fn check_topological(
    order: &[ExprId],
    sources: &BTreeMap<ExprId, Vec<ExprId>>,
) -> Result<(), SchedError> {
    let mut seen = HashSet::<ExprId>::new();
    for n in order {
        for d in sources.get(n).map(Vec::as_slice).unwrap_or(&[]) {
            if !seen.contains(d) {
                return Err(SchedError::Order(format!(
                    "source {d} not evaluated before {n}"
                )));
            }
        }
        if !seen.insert(*n) {
            return Err(SchedError::Order(format!("{n} appears twice")));
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    fn id(n: u64) -> ExprId {
        ExprId::new(n)
    }

    #[test]
    fn sources_must_come_first() {
        let sources = BTreeMap::from([(id(1), vec![id(0)]), (id(2), vec![id(0), id(1)])]);
        assert!(check_topological(&[id(0), id(1), id(2)], &sources).is_ok());

        let err = check_topological(&[id(0), id(2), id(1)], &sources).unwrap_err();
        assert!(err.to_string().contains("not evaluated before"));
    }

    #[test]
    fn duplicates_are_rejected() {
        let err = check_topological(&[id(0), id(0)], &BTreeMap::new()).unwrap_err();
        assert!(matches!(err, SchedError::Order(_)));
    }
}
