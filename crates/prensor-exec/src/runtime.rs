//! Runtime: evaluate canonical expression graphs and rebuild prensors.
//!
//! Phases, all synchronous and run to completion in order:
//! - discovery (`OriginalGraph`)
//! - canonicalization (`CanonicalGraph`)
//! - Kahn ordering of canonical nodes (`prensor-sched`)
//! - evaluation: each canonical node is calculated once, type-checked, and
//!   memoized by canonical id
//!
//! Placeholders get their value from a `FeedDict` keyed by the id of the
//! placeholder root expression.

use std::collections::{BTreeMap, HashMap};
use std::sync::Arc;

use thiserror::Error;

use prensor_core::config::CalcOptions;
use prensor_core::id::ExprId;
use prensor_core::node::NodeValue;
use prensor_core::path::Path;
use prensor_core::prensor::{build_prensor, Prensor};

use prensor_expr::{CalcContext, CanonicalGraph, Expr, ExprRef, OriginalGraph, PlaceholderBinding};
use prensor_sched::{check_topological, topological_order_with_stats, OrderStats};

use crate::metrics::emit_span;

#[derive(Debug, Error)]
pub enum ExecError {
    #[error(transparent)]
    Core(#[from] prensor_core::Error),

    #[error("expression {expr} returned the wrong type: expected: {expected} actual: {actual}")]
    TypeContract {
        expr: String,
        expected: String,
        actual: String,
    },

    #[error("placeholder {0} has no bound value")]
    UnboundPlaceholder(String),

    #[error("missing value for {0}")]
    MissingValue(String),

    #[error("invalid graph: {0}")]
    Invalid(String),
}

/// Bound values for placeholder roots, keyed by the placeholder's id.
pub type FeedDict = HashMap<ExprId, Prensor>;

/// The deduplicated graph for one calculation.
#[derive(Debug, Clone)]
pub struct ExpressionGraph {
    original: OriginalGraph,
    canonical: CanonicalGraph,
    order: Vec<ExprId>,
    stats: OrderStats,
}

impl ExpressionGraph {
    pub fn build(requested: &[ExprRef]) -> Result<Self, ExecError> {
        let original = OriginalGraph::build(requested)?;
        let canonical = CanonicalGraph::build(&original)?;
        let (order, stats) = topological_order_with_stats(canonical.order(), &canonical.edges())
            .map_err(|e| ExecError::Invalid(e.to_string()))?;
        let sources: BTreeMap<ExprId, Vec<ExprId>> = canonical
            .nodes()
            .map(|(id, n)| (*id, n.sources.clone()))
            .collect();
        check_topological(&order, &sources).map_err(|e| ExecError::Invalid(e.to_string()))?;
        emit_span(
            "graph_built",
            &[
                ("original", original.len().to_string()),
                ("canonical", canonical.len().to_string()),
                ("merged", canonical.merged().to_string()),
                ("max_ready", stats.max_ready.to_string()),
            ],
        );
        Ok(Self {
            original,
            canonical,
            order,
            stats,
        })
    }

    pub fn original(&self) -> &OriginalGraph {
        &self.original
    }

    pub fn canonical(&self) -> &CanonicalGraph {
        &self.canonical
    }

    /// Canonical evaluation order.
    pub fn order(&self) -> &[ExprId] {
        &self.order
    }

    /// Frontier statistics of the evaluation order.
    pub fn order_stats(&self) -> &OrderStats {
        &self.stats
    }

    /// One expression per canonical node, sources first.
    pub fn expressions_needed(&self) -> Vec<ExprRef> {
        self.order
            .iter()
            .filter_map(|id| self.canonical.node(*id).map(|n| ExprRef::clone(&n.expr)))
            .collect()
    }

    /// Paths (relative to their placeholder root) of every placeholder leaf
    /// the graph reads.
    pub fn placeholder_paths(&self) -> Vec<Path> {
        self.expressions_needed()
            .into_iter()
            .filter(|e| e.is_leaf())
            .filter_map(|e| match e.placeholder_binding() {
                Some(PlaceholderBinding::Descendant { path, .. }) => Some(path),
                _ => None,
            })
            .collect()
    }

    fn resolve(&self, expr: &ExprRef) -> Result<ExprId, ExecError> {
        self.canonical
            .resolve(expr)?
            .ok_or_else(|| ExecError::MissingValue(format!("{} is not part of the graph", expr)))
    }

    /// Calculate every canonical node once.
    pub fn evaluate(
        &self,
        options: &CalcOptions,
        feed: Option<&FeedDict>,
    ) -> Result<Evaluation, ExecError> {
        let mut values: HashMap<ExprId, Arc<NodeValue>> = HashMap::with_capacity(self.order.len());
        for id in &self.order {
            let node = self
                .canonical
                .node(*id)
                .ok_or_else(|| ExecError::Invalid(format!("{} missing from canonical graph", id)))?;
            let sources = node
                .sources
                .iter()
                .map(|s| {
                    values.get(s).cloned().ok_or_else(|| {
                        ExecError::MissingValue(format!("source {} of {}", s, node.expr))
                    })
                })
                .collect::<Result<Vec<_>, _>>()?;
            let side_info = side_info_for(&node.expr, feed)?;
            let ctx = CalcContext {
                sources: &sources,
                destinations: &node.destinations,
                options,
                side_info,
            };
            let value = node.expr.calculate(&ctx)?;
            check_contract(&node.expr, &value)?;
            if options.ragged_checks {
                value.check_shape()?;
            }

            #[cfg(feature = "tracing")]
            tracing::trace!(expr = %node.expr.id(), kind = node.expr.kind(), value = %value, "evaluated expression");

            values.insert(*id, value);
        }
        Ok(Evaluation { values })
    }

    /// Value of a requested expression after `evaluate`.
    pub fn value_of(
        &self,
        evaluation: &Evaluation,
        expr: &ExprRef,
    ) -> Result<Arc<NodeValue>, ExecError> {
        let id = self.resolve(expr)?;
        evaluation
            .values
            .get(&id)
            .cloned()
            .ok_or_else(|| ExecError::MissingValue(expr.to_string()))
    }
}

/// Memoized node values, keyed by canonical id.
#[derive(Debug, Clone, Default)]
pub struct Evaluation {
    values: HashMap<ExprId, Arc<NodeValue>>,
}

impl Evaluation {
    pub fn len(&self) -> usize {
        self.values.len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

fn side_info_for<'a>(
    expr: &Expr,
    feed: Option<&'a FeedDict>,
) -> Result<Option<&'a Prensor>, ExecError> {
    let (root, path) = match expr.placeholder_binding() {
        None => return Ok(None),
        Some(PlaceholderBinding::Root) => (expr.id(), Path::root()),
        Some(PlaceholderBinding::Descendant { root, path }) => (root, path),
    };
    let bound = feed
        .and_then(|f| f.get(&root))
        .ok_or_else(|| ExecError::UnboundPlaceholder(expr.to_string()))?;
    bound
        .get_descendant(&path)
        .map(Some)
        .ok_or_else(|| ExecError::UnboundPlaceholder(format!("{} (no subtree at {})", expr, path)))
}

fn describe_contract(expr: &Expr) -> String {
    let cardinality = if expr.is_repeated() { "repeated" } else { "optional" };
    match expr.data_type() {
        Some(dt) => format!("{} {}", cardinality, dt),
        None => format!("{} non-leaf", cardinality),
    }
}

fn check_contract(expr: &Expr, value: &NodeValue) -> Result<(), ExecError> {
    let shape_ok = expr.is_repeated() == value.is_repeated();
    let type_ok = match (expr.data_type(), value) {
        (None, NodeValue::Root(_)) | (None, NodeValue::Child(_)) => true,
        (Some(dt), NodeValue::Leaf(leaf)) => leaf.values.data_type() == dt,
        _ => false,
    };
    if shape_ok && type_ok {
        return Ok(());
    }
    Err(ExecError::TypeContract {
        expr: expr.to_string(),
        expected: describe_contract(expr),
        actual: value.to_string(),
    })
}

/// Owns the options for a series of calculations.
pub struct Engine {
    options: CalcOptions,
}

impl Default for Engine {
    fn default() -> Self {
        Self::new(CalcOptions::default())
    }
}

impl Engine {
    pub fn new(options: CalcOptions) -> Self {
        Self { options }
    }

    pub fn options(&self) -> &CalcOptions {
        &self.options
    }

    pub fn calculate_values(
        &self,
        exprs: &[ExprRef],
        feed: Option<&FeedDict>,
    ) -> Result<Vec<Arc<NodeValue>>, ExecError> {
        calculate_values(exprs, &self.options, feed)
    }

    pub fn calculate_prensors(
        &self,
        exprs: &[ExprRef],
        feed: Option<&FeedDict>,
    ) -> Result<Vec<Prensor>, ExecError> {
        calculate_prensors(exprs, &self.options, feed)
    }
}

/// Node values of `exprs`, in order.
pub fn calculate_values(
    exprs: &[ExprRef],
    options: &CalcOptions,
    feed: Option<&FeedDict>,
) -> Result<Vec<Arc<NodeValue>>, ExecError> {
    calculate_values_with_graph(exprs, options, feed).map(|(values, _)| values)
}

/// Like [`calculate_values`], also returning the graph that was evaluated.
pub fn calculate_values_with_graph(
    exprs: &[ExprRef],
    options: &CalcOptions,
    feed: Option<&FeedDict>,
) -> Result<(Vec<Arc<NodeValue>>, ExpressionGraph), ExecError> {
    let graph = ExpressionGraph::build(exprs)?;
    let evaluation = graph.evaluate(options, feed)?;
    let values = exprs
        .iter()
        .map(|e| graph.value_of(&evaluation, e))
        .collect::<Result<Vec<_>, _>>()?;
    Ok((values, graph))
}

/// One prensor per requested expression, covering its known descendants.
pub fn calculate_prensors(
    exprs: &[ExprRef],
    options: &CalcOptions,
    feed: Option<&FeedDict>,
) -> Result<Vec<Prensor>, ExecError> {
    calculate_prensors_with_graph(exprs, options, feed).map(|(prensors, _)| prensors)
}

/// Like [`calculate_prensors`], also returning the graph that was evaluated.
pub fn calculate_prensors_with_graph(
    exprs: &[ExprRef],
    options: &CalcOptions,
    feed: Option<&FeedDict>,
) -> Result<(Vec<Prensor>, ExpressionGraph), ExecError> {
    let subtrees: Vec<BTreeMap<Path, ExprRef>> = exprs
        .iter()
        .map(|e| e.get_known_descendants())
        .collect::<Result<_, _>>()?;
    let flat: Vec<ExprRef> = subtrees
        .iter()
        .flat_map(|m| m.values().cloned())
        .collect();

    let graph = ExpressionGraph::build(&flat)?;
    let evaluation = graph.evaluate(options, feed)?;

    let mut prensors = Vec::with_capacity(subtrees.len());
    for subtree in &subtrees {
        let nodes = subtree
            .iter()
            .map(|(p, e)| Ok((p.clone(), graph.value_of(&evaluation, e)?)))
            .collect::<Result<Vec<_>, ExecError>>()?;
        let prensor = build_prensor(nodes)?;
        if options.ragged_checks {
            prensor.validate(options)?;
        }
        prensors.push(prensor);
    }

    #[cfg(feature = "tracing")]
    tracing::debug!(prensors = prensors.len(), nodes = evaluation.len(), "reassembled prensors");

    Ok((prensors, graph))
}
