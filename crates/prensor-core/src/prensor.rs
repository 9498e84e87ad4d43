//! The prensor: a node value plus an ordered map of named child prensors.
//!
//! Trees are built bottom-up from a flat `Path -> NodeValue` mapping and are
//! immutable afterwards. Node values are shared (`Arc`) so that a value
//! computed once can appear in several trees without being copied.
//!
//! Downstream consumers usually want per-leaf arrays rather than the tree:
//! - `ragged_leaves`: nested value row ids, one partition per level
//! - `sparse_leaves`: dewey-encoded coordinates with a dense shape

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::sync::Arc;

use crate::config::CalcOptions;
use crate::error::{Error, Result};
use crate::kernels::is_non_decreasing;
use crate::node::{LeafNode, NodeValue};
use crate::path::{Path, Step};
use crate::types::Values;

#[derive(Debug, Clone, PartialEq)]
pub struct Prensor {
    node: Arc<NodeValue>,
    children: BTreeMap<Step, Prensor>,
}

impl Prensor {
    pub fn new(node: impl Into<Arc<NodeValue>>, children: BTreeMap<Step, Prensor>) -> Self {
        Self {
            node: node.into(),
            children,
        }
    }

    /// A prensor with no children.
    pub fn leaf(node: impl Into<Arc<NodeValue>>) -> Self {
        Self::new(node, BTreeMap::new())
    }

    pub fn node(&self) -> &Arc<NodeValue> {
        &self.node
    }

    pub fn children(&self) -> &BTreeMap<Step, Prensor> {
        &self.children
    }

    pub fn is_leaf(&self) -> bool {
        self.node.is_leaf()
    }

    pub fn field_names(&self) -> BTreeSet<Step> {
        self.children.keys().cloned().collect()
    }

    pub fn get_child(&self, step: &Step) -> Option<&Prensor> {
        self.children.get(step)
    }

    pub fn get_child_or_error(&self, step: &Step) -> Result<&Prensor> {
        self.get_child(step)
            .ok_or_else(|| Error::MissingPath(format!("child {} not found", step)))
    }

    pub fn get_descendant(&self, p: &Path) -> Option<&Prensor> {
        let mut cur = self;
        for s in p.steps() {
            cur = cur.children.get(s)?;
        }
        Some(cur)
    }

    pub fn get_descendant_or_error(&self, p: &Path) -> Result<&Prensor> {
        self.get_descendant(p)
            .ok_or_else(|| Error::MissingPath(format!("{} not found in prensor", p)))
    }

    /// Every subtree keyed by its path, the root included.
    pub fn get_descendants(&self) -> BTreeMap<Path, &Prensor> {
        let mut out = BTreeMap::new();
        self.collect_descendants(Path::root(), &mut out);
        out
    }

    fn collect_descendants<'a>(&'a self, at: Path, out: &mut BTreeMap<Path, &'a Prensor>) {
        for (step, child) in &self.children {
            let child_path = at.join_step(step);
            child.collect_descendants(child_path, out);
        }
        out.insert(at, self);
    }

    /// The flat `Path -> NodeValue` mapping this tree was (or could be) built from.
    pub fn flatten(&self) -> BTreeMap<Path, Arc<NodeValue>> {
        self.get_descendants()
            .into_iter()
            .map(|(p, t)| (p, Arc::clone(&t.node)))
            .collect()
    }

    /// Walk the tree and check every node against its parent.
    ///
    /// With `ragged_checks` off this only checks node kinds.
    pub fn validate(&self, options: &CalcOptions) -> Result<()> {
        if self.node.is_leaf() && !self.children.is_empty() {
            return Err(Error::ShapeMismatch("a leaf cannot have children".to_string()));
        }
        for (step, child) in &self.children {
            if let NodeValue::Root(_) = child.node.as_ref() {
                return Err(Error::ShapeMismatch(format!(
                    "child {} holds a root node",
                    step
                )));
            }
            if options.ragged_checks {
                child.node.check_shape()?;
                child.node.check_parent_extent(self.node.size())?;
            }
            child.validate(options)?;
        }
        Ok(())
    }

    /// Root, intermediate children, and leaf along `p`.
    fn leaf_node_path(&self, p: &Path) -> Result<LeafNodePath<'_>> {
        if p.is_root() {
            return Err(Error::InvalidArgument(
                "leaf should not be at the root".to_string(),
            ));
        }
        let head_size = match self.node.as_ref() {
            NodeValue::Root(r) => r.size,
            NodeValue::Child(c) => c.parent_index.len(),
            NodeValue::Leaf(_) => {
                return Err(Error::InvalidArgument(
                    "must be child or root node at the head of a leaf path".to_string(),
                ))
            }
        };
        let mut middle = Vec::with_capacity(p.len() - 1);
        let mut cur = self;
        for (depth, step) in p.steps().iter().enumerate() {
            cur = cur
                .children
                .get(step)
                .ok_or_else(|| Error::MissingPath(format!("{} not found in prensor", p)))?;
            if depth + 1 < p.len() {
                match cur.node.as_ref() {
                    NodeValue::Child(_) => middle.push(cur.node.as_ref()),
                    _ => {
                        return Err(Error::InvalidArgument(format!(
                            "expected child node at {} in {}",
                            p.prefix(depth + 1),
                            p
                        )))
                    }
                }
            }
        }
        let tail = cur
            .node
            .as_leaf()
            .ok_or_else(|| Error::InvalidArgument(format!("expected leaf node at {}", p)))?;
        Ok(LeafNodePath {
            head_size,
            middle,
            tail,
        })
    }

    fn leaf_paths(&self) -> Vec<Path> {
        self.get_descendants()
            .into_iter()
            .filter(|(p, t)| !p.is_root() && t.is_leaf())
            .map(|(p, _)| p)
            .collect()
    }

    /// Ragged view of the leaf at `p`: every step along the path is a ragged dimension.
    pub fn ragged_leaf(&self, p: &Path, options: &CalcOptions) -> Result<RaggedArray> {
        let nodes = self.leaf_node_path(p)?;
        let mut partitions = Vec::with_capacity(nodes.middle.len() + 1);
        let mut nrows = nodes.head_size;
        for node in &nodes.middle {
            let pi = node.parent_index().unwrap_or(&[]);
            partitions.push(RowPartition::new(pi.to_vec(), nrows, options)?);
            nrows = pi.len();
        }
        partitions.push(RowPartition::new(
            nodes.tail.parent_index.clone(),
            nrows,
            options,
        )?);
        Ok(RaggedArray {
            partitions,
            values: nodes.tail.values.clone(),
        })
    }

    pub fn ragged_leaves(&self, options: &CalcOptions) -> Result<BTreeMap<Path, RaggedArray>> {
        self.leaf_paths()
            .into_iter()
            .map(|p| {
                let r = self.ragged_leaf(&p, options)?;
                Ok((p, r))
            })
            .collect()
    }

    /// Sparse (dewey-encoded) view of the leaf at `p`.
    ///
    /// Optional steps add no dimension: an optional field can hold at most
    /// one element per parent, so its coordinate is its parent's.
    pub fn sparse_leaf(&self, p: &Path) -> Result<SparseArray> {
        let nodes = self.leaf_node_path(p)?;
        let mut indices: Vec<Vec<usize>> = (0..nodes.head_size).map(|i| vec![i]).collect();
        let mut dense_shape = vec![nodes.head_size];
        let levels = nodes
            .middle
            .iter()
            .map(|n| (n.parent_index().unwrap_or(&[]), n.is_repeated(), n.positional_index()))
            .chain(std::iter::once((
                nodes.tail.parent_index.as_slice(),
                nodes.tail.is_repeated,
                crate::kernels::run_length_before(&nodes.tail.parent_index),
            )));
        for (pi, is_repeated, positional) in levels {
            let mut next = Vec::with_capacity(pi.len());
            for (i, &parent) in pi.iter().enumerate() {
                let mut coord = indices.get(parent).cloned().ok_or_else(|| {
                    Error::ShapeMismatch(format!(
                        "parent index {} out of range for parent of size {}",
                        parent,
                        indices.len()
                    ))
                })?;
                if is_repeated {
                    coord.push(positional[i]);
                }
                next.push(coord);
            }
            if is_repeated {
                dense_shape.push(positional.iter().max().map_or(0, |m| m + 1));
            }
            indices = next;
        }
        Ok(SparseArray {
            indices,
            dense_shape,
            values: nodes.tail.values.clone(),
        })
    }

    pub fn sparse_leaves(&self) -> Result<BTreeMap<Path, SparseArray>> {
        self.leaf_paths()
            .into_iter()
            .map(|p| {
                let s = self.sparse_leaf(&p)?;
                Ok((p, s))
            })
            .collect()
    }

    fn write_tree(&self, f: &mut fmt::Formatter<'_>, name: &str, depth: usize) -> fmt::Result {
        writeln!(f, "{:indent$}{}: {}", "", name, self.node, indent = depth * 2)?;
        for (step, child) in &self.children {
            child.write_tree(f, &step.to_string(), depth + 1)?;
        }
        Ok(())
    }
}

impl fmt::Display for Prensor {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        self.write_tree(f, "<root>", 0)
    }
}

struct LeafNodePath<'a> {
    head_size: usize,
    middle: Vec<&'a NodeValue>,
    tail: &'a LeafNode,
}

/// One ragged dimension: the row id of every value, over `nrows` rows.
#[derive(Debug, Clone, PartialEq)]
pub struct RowPartition {
    pub value_rowids: Vec<usize>,
    pub nrows: usize,
}

impl RowPartition {
    pub fn new(value_rowids: Vec<usize>, nrows: usize, options: &CalcOptions) -> Result<Self> {
        if options.ragged_checks {
            if !is_non_decreasing(&value_rowids) {
                return Err(Error::ShapeMismatch(
                    "value row ids must be non-decreasing".to_string(),
                ));
            }
            if let Some(bad) = value_rowids.iter().find(|&&r| r >= nrows) {
                return Err(Error::ShapeMismatch(format!(
                    "row id {} out of range for {} rows",
                    bad, nrows
                )));
            }
        }
        Ok(Self {
            value_rowids,
            nrows,
        })
    }

    /// Row boundaries: row `r` spans `splits[r]..splits[r + 1]`.
    pub fn row_splits(&self) -> Vec<usize> {
        let mut splits = vec![0usize; self.nrows + 1];
        for &r in &self.value_rowids {
            if r < self.nrows {
                splits[r + 1] += 1;
            }
        }
        for i in 1..splits.len() {
            splits[i] += splits[i - 1];
        }
        splits
    }
}

/// A leaf as nested ragged rows: `partitions[0]` is over the top-level records.
#[derive(Debug, Clone, PartialEq)]
pub struct RaggedArray {
    pub partitions: Vec<RowPartition>,
    pub values: Values,
}

impl RaggedArray {
    pub fn nrows(&self) -> usize {
        self.partitions.first().map_or(0, |p| p.nrows)
    }

    pub fn ragged_rank(&self) -> usize {
        self.partitions.len()
    }
}

/// A leaf as coordinates (one row per value) into a dense box of `dense_shape`.
#[derive(Debug, Clone, PartialEq)]
pub struct SparseArray {
    pub indices: Vec<Vec<usize>>,
    pub dense_shape: Vec<usize>,
    pub values: Values,
}

/// Build a prensor from a flat mapping of paths to node values.
///
/// The empty path must be present (`MissingRoot` otherwise), as must every
/// prefix of every present path (`MissingPath` otherwise).
pub fn build_prensor<I, V>(nodes: I) -> Result<Prensor>
where
    I: IntoIterator<Item = (Path, V)>,
    V: Into<Arc<NodeValue>>,
{
    let sorted: BTreeMap<Path, Arc<NodeValue>> =
        nodes.into_iter().map(|(p, v)| (p, v.into())).collect();
    if !sorted.contains_key(&Path::root()) {
        let keys: Vec<String> = sorted.keys().map(|p| format!("'{}'", p)).collect();
        return Err(Error::MissingRoot(format!("[{}]", keys.join(", "))));
    }
    build_subtree(&Path::root(), sorted)
}

fn build_subtree(at: &Path, nodes: BTreeMap<Path, Arc<NodeValue>>) -> Result<Prensor> {
    let mut root = None;
    let mut grouped: BTreeMap<Step, BTreeMap<Path, Arc<NodeValue>>> = BTreeMap::new();
    for (k, v) in nodes {
        match k.first_step() {
            None => root = Some(v),
            Some(first) => {
                grouped
                    .entry(first.clone())
                    .or_default()
                    .insert(k.suffix(1), v);
            }
        }
    }
    let node = root.ok_or_else(|| Error::MissingPath(format!("no node at {}", at)))?;
    let mut children = BTreeMap::new();
    for (step, sub) in grouped {
        let child_at = at.join_step(&step);
        children.insert(step, build_subtree(&child_at, sub)?);
    }
    Ok(Prensor { node, children })
}
