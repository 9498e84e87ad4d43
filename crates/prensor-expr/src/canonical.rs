//! Canonicalization: merge nodes that compute the same thing from the same inputs.
//!
//! Nodes are replayed in dependency order. A node's sources are replaced by
//! their canonical nodes, then it is merged into an existing canonical node
//! when both have the same kind, pairwise identical canonical sources, and
//! `calculation_equal` holds. Since sources are always settled before their
//! dependents, one linear pass is enough.

use std::collections::{BTreeMap, HashMap};

use prensor_core::error::{Error, Result};
use prensor_core::id::ExprId;

use crate::expression::ExprRef;
use crate::graph::{earliest_equivalent, OriginalGraph};

#[derive(Debug, Clone)]
pub struct CanonicalNode {
    /// The first expression seen for this computation.
    pub expr: ExprRef,
    pub sources: Vec<ExprId>,
    /// Expressions of the canonical nodes that read this one.
    pub destinations: Vec<ExprRef>,
}

#[derive(Debug, Clone)]
pub struct CanonicalGraph {
    nodes: BTreeMap<ExprId, CanonicalNode>,
    /// Original node id -> canonical node id.
    canonical_of: HashMap<ExprId, ExprId>,
    order: Vec<ExprId>,
    merged: usize,
}

type Signature = (&'static str, Vec<ExprId>);

impl CanonicalGraph {
    pub fn build(original: &OriginalGraph) -> Result<Self> {
        let mut nodes: BTreeMap<ExprId, CanonicalNode> = BTreeMap::new();
        let mut canonical_of: HashMap<ExprId, ExprId> = HashMap::new();
        let mut buckets: HashMap<Signature, Vec<ExprId>> = HashMap::new();
        let mut order = Vec::with_capacity(original.len());
        let mut merged = 0usize;

        for id in original.order() {
            let node = original
                .node(*id)
                .ok_or_else(|| Error::Invariant(format!("{} missing from graph", id)))?;
            let sources = node
                .sources
                .iter()
                .map(|s| {
                    canonical_of.get(s).copied().ok_or_else(|| {
                        Error::Invariant(format!("source {} of {} not canonicalized yet", s, id))
                    })
                })
                .collect::<Result<Vec<_>>>()?;

            let key: Signature = (node.expr.kind(), sources.clone());
            let bucket = buckets.entry(key).or_default();
            let existing = bucket.iter().copied().find(|candidate| {
                nodes
                    .get(candidate)
                    .is_some_and(|c| c.expr.calculation_equal(&node.expr))
            });

            match existing {
                Some(target) => {
                    canonical_of.insert(*id, target);
                    merged += 1;
                }
                None => {
                    bucket.push(*id);
                    canonical_of.insert(*id, *id);
                    order.push(*id);
                    nodes.insert(
                        *id,
                        CanonicalNode {
                            expr: ExprRef::clone(&node.expr),
                            sources,
                            destinations: Vec::new(),
                        },
                    );
                }
            }
        }

        let reads: Vec<(ExprId, ExprRef)> = nodes
            .values()
            .flat_map(|n| n.sources.iter().map(move |s| (*s, ExprRef::clone(&n.expr))))
            .collect();
        for (source, reader) in reads {
            if let Some(n) = nodes.get_mut(&source) {
                n.destinations.push(reader);
            }
        }

        #[cfg(feature = "tracing")]
        tracing::debug!(canonical = nodes.len(), merged, "canonicalized expression graph");

        Ok(Self {
            nodes,
            canonical_of,
            order,
            merged,
        })
    }

    pub fn node(&self, id: ExprId) -> Option<&CanonicalNode> {
        self.nodes.get(&id)
    }

    pub fn nodes(&self) -> impl Iterator<Item = (&ExprId, &CanonicalNode)> {
        self.nodes.iter()
    }

    /// Canonical node for an original node id.
    pub fn canonical_id_of(&self, original: ExprId) -> Option<ExprId> {
        self.canonical_of.get(&original).copied()
    }

    /// Canonical node an expression resolves to (through identity chains and merges).
    pub fn resolve(&self, expr: &ExprRef) -> Result<Option<ExprId>> {
        let earliest = earliest_equivalent(expr)?;
        Ok(self.canonical_id_of(earliest.id()))
    }

    /// Canonical ids in replay order (sources first).
    pub fn order(&self) -> &[ExprId] {
        &self.order
    }

    /// `(source, dependent)` pairs, one per read.
    pub fn edges(&self) -> Vec<(ExprId, ExprId)> {
        self.nodes
            .iter()
            .flat_map(|(id, n)| n.sources.iter().map(move |s| (*s, *id)))
            .collect()
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// How many original nodes were folded into another.
    pub fn merged(&self) -> usize {
        self.merged
    }
}
