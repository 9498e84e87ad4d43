//! Strongly-typed identifiers used across the engine.
//!
//! Downstream crates (expr, exec, ops) should *not* use raw integers for IDs.
//! Every id type owns a process-wide atomic counter, so `next()` is safe to
//! call from any thread and never hands out the same value twice.

use serde::{Deserialize, Serialize};
use std::fmt;

macro_rules! new_id {
    ($name:ident) => {
        #[derive(
            Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Ord, PartialOrd,
        )]
        #[serde(transparent)]
        pub struct $name(u64);

        impl $name {
            pub const fn new(v: u64) -> Self {
                Self(v)
            }
            pub const fn get(self) -> u64 {
                self.0
            }

            /// Issue a fresh id from this type's counter.
            pub fn next() -> Self {
                static NEXT: std::sync::atomic::AtomicU64 = std::sync::atomic::AtomicU64::new(0);
                Self(NEXT.fetch_add(1, std::sync::atomic::Ordering::Relaxed))
            }
        }

        impl fmt::Display for $name {
            fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
                write!(f, "{}({})", stringify!($name), self.0)
            }
        }
    };
}

new_id!(ExprId);
new_id!(AnonymousId);

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn next_ids_are_distinct_and_increasing() {
        let a = ExprId::next();
        let b = ExprId::next();
        assert!(b > a);
        assert_eq!(format!("{}", ExprId::new(7)), "ExprId(7)");
    }
}
