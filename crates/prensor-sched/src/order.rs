//! Kahn ordering over a dependency graph.
//!
//! Nodes with no sources are seeded in ascending id order; every time a node is
//! emitted, each dependent's remaining-source count drops by one and the
//! dependent becomes ready at zero. Repeated edges (a node reading the same
//! source twice) are counted twice on both sides, so they cancel out.

use std::collections::{BTreeMap, VecDeque};

use prensor_core::id::ExprId;
use serde::{Deserialize, Serialize};
use thiserror::Error;

#[derive(Debug, Error)]
pub enum SchedError {
    #[error("dependency cycle: {remaining} node(s) never became ready")]
    Cycle { remaining: usize },

    #[error("edge references unknown node {0}")]
    UnknownNode(ExprId),

    #[error("order violation: {0}")]
    Order(String),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OrderStats {
    /// Largest number of nodes that were ready at the same time.
    pub max_ready: usize,
    /// Nodes emitted so far.
    pub steps: usize,
}

pub struct TopoOrder {
    in_degree: BTreeMap<ExprId, usize>,
    dependents: BTreeMap<ExprId, Vec<ExprId>>,
    ready: VecDeque<ExprId>,
    stats: OrderStats,
}

impl TopoOrder {
    /// `edges` are `(source, dependent)` pairs; every endpoint must be in `nodes`.
    pub fn new(nodes: &[ExprId], edges: &[(ExprId, ExprId)]) -> Result<Self, SchedError> {
        let mut in_degree: BTreeMap<ExprId, usize> = nodes.iter().map(|n| (*n, 0)).collect();
        let mut dependents: BTreeMap<ExprId, Vec<ExprId>> = BTreeMap::new();

        for (u, v) in edges {
            if !in_degree.contains_key(u) {
                return Err(SchedError::UnknownNode(*u));
            }
            *in_degree
                .get_mut(v)
                .ok_or(SchedError::UnknownNode(*v))? += 1;
            dependents.entry(*u).or_default().push(*v);
        }

        let ready: VecDeque<ExprId> = in_degree
            .iter()
            .filter_map(|(n, &deg)| if deg == 0 { Some(*n) } else { None })
            .collect();

        let stats = OrderStats {
            max_ready: ready.len(),
            steps: 0,
        };

        Ok(Self {
            in_degree,
            dependents,
            ready,
            stats,
        })
    }

    /// Emit one ready node and release its dependents.
    pub fn step(&mut self) -> Option<ExprId> {
        let n = self.ready.pop_front()?;
        self.stats.steps += 1;

        if let Some(nexts) = self.dependents.get(&n) {
            for v in nexts {
                if let Some(deg) = self.in_degree.get_mut(v) {
                    *deg -= 1;
                    if *deg == 0 {
                        self.ready.push_back(*v);
                    }
                }
            }
        }

        self.stats.max_ready = self.stats.max_ready.max(self.ready.len());
        Some(n)
    }

    pub fn stats(&self) -> OrderStats {
        self.stats.clone()
    }

    pub fn len(&self) -> usize {
        self.in_degree.len()
    }

    pub fn is_empty(&self) -> bool {
        self.in_degree.is_empty()
    }
}

/// Full topological order of `nodes`, or `Cycle` if some never become ready.
pub fn topological_order(
    nodes: &[ExprId],
    edges: &[(ExprId, ExprId)],
) -> Result<Vec<ExprId>, SchedError> {
    topological_order_with_stats(nodes, edges).map(|(order, _)| order)
}

/// [`topological_order`] plus the frontier statistics of the run.
pub fn topological_order_with_stats(
    nodes: &[ExprId],
    edges: &[(ExprId, ExprId)],
) -> Result<(Vec<ExprId>, OrderStats), SchedError> {
    let mut tracker = TopoOrder::new(nodes, edges)?;
    let mut order = Vec::with_capacity(tracker.len());
    while let Some(n) = tracker.step() {
        order.push(n);
    }
    if order.len() != tracker.len() {
        return Err(SchedError::Cycle {
            remaining: tracker.len() - order.len(),
        });
    }
    Ok((order, tracker.stats()))
}
