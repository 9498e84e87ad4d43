//! Discovery: the original expression graph for a set of requested expressions.
//!
//! Starting from the requests, sources are walked transitively. Every
//! expression is first collapsed to its earliest identity-equivalent
//! expression (identity chains are followed to the first non-identity
//! source), so pass-through wrappers never become nodes of their own.

use std::collections::BTreeMap;

use prensor_core::error::{Error, Result};
use prensor_core::id::ExprId;
use prensor_sched::topological_order;

use crate::expression::ExprRef;

/// Follow identity expressions down to the first one that computes something.
pub fn earliest_equivalent(expr: &ExprRef) -> Result<ExprRef> {
    let mut cur = ExprRef::clone(expr);
    while cur.is_identity() {
        let mut sources = cur.sources();
        if sources.len() != 1 {
            return Err(Error::Invariant(format!(
                "identity expression {} has {} sources",
                cur,
                sources.len()
            )));
        }
        cur = sources.remove(0);
    }
    Ok(cur)
}

/// True if `a` and `b` compute the same value: the same object, or the same
/// kind and `calculation_equal` over pairwise equal sources.
///
/// Children are cached weakly, so a subexpression nobody holds may be rebuilt
/// as a new object; this is the check that still recognizes it.
pub fn same_computation(a: &ExprRef, b: &ExprRef) -> bool {
    if std::sync::Arc::ptr_eq(a, b) {
        return true;
    }
    if a.kind() != b.kind() || !a.calculation_equal(b) {
        return false;
    }
    let (sa, sb) = (a.sources(), b.sources());
    sa.len() == sb.len() && sa.iter().zip(sb.iter()).all(|(x, y)| same_computation(x, y))
}

#[derive(Debug, Clone)]
pub struct GraphNode {
    pub expr: ExprRef,
    /// Earliest-equivalent ids of `expr.sources()`, in order.
    pub sources: Vec<ExprId>,
    /// Nodes that read this one (one entry per read).
    pub destinations: Vec<ExprId>,
}

/// One node per distinct earliest-equivalent expression, plus back-edges.
#[derive(Debug, Clone)]
pub struct OriginalGraph {
    nodes: BTreeMap<ExprId, GraphNode>,
    order: Vec<ExprId>,
}

impl OriginalGraph {
    pub fn build(requested: &[ExprRef]) -> Result<Self> {
        let mut nodes: BTreeMap<ExprId, GraphNode> = BTreeMap::new();
        let mut stack: Vec<ExprRef> = requested
            .iter()
            .map(earliest_equivalent)
            .collect::<Result<_>>()?;

        while let Some(expr) = stack.pop() {
            if nodes.contains_key(&expr.id()) {
                continue;
            }
            let sources = expr
                .sources()
                .iter()
                .map(earliest_equivalent)
                .collect::<Result<Vec<_>>>()?;
            let source_ids = sources.iter().map(|s| s.id()).collect();
            stack.extend(sources);
            nodes.insert(
                expr.id(),
                GraphNode {
                    expr,
                    sources: source_ids,
                    destinations: Vec::new(),
                },
            );
        }

        let mut edges = Vec::new();
        for (id, node) in &nodes {
            for s in &node.sources {
                edges.push((*s, *id));
            }
        }
        for (s, d) in &edges {
            if let Some(src) = nodes.get_mut(s) {
                src.destinations.push(*d);
            }
        }

        let ids: Vec<ExprId> = nodes.keys().copied().collect();
        let order = topological_order(&ids, &edges)
            .map_err(|e| Error::Invariant(format!("expression graph: {}", e)))?;

        #[cfg(feature = "tracing")]
        tracing::debug!(nodes = nodes.len(), requested = requested.len(), "discovered expression graph");

        Ok(Self { nodes, order })
    }

    pub fn node(&self, id: ExprId) -> Option<&GraphNode> {
        self.nodes.get(&id)
    }

    /// Node id an expression resolves to, if it is part of this graph.
    pub fn resolve(&self, expr: &ExprRef) -> Result<Option<ExprId>> {
        let earliest = earliest_equivalent(expr)?;
        Ok(self.nodes.contains_key(&earliest.id()).then(|| earliest.id()))
    }

    /// Node ids, sources before dependents.
    pub fn order(&self) -> &[ExprId] {
        &self.order
    }

    pub fn len(&self) -> usize {
        self.nodes.len()
    }

    pub fn is_empty(&self) -> bool {
        self.nodes.is_empty()
    }

    /// Expressions of every node, sources before dependents.
    pub fn expressions_needed(&self) -> Vec<ExprRef> {
        self.order
            .iter()
            .filter_map(|id| self.nodes.get(id).map(|n| ExprRef::clone(&n.expr)))
            .collect()
    }
}
