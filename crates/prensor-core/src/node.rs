//! Node values: the per-path payload of a prensor.
//!
//! - `Root`: only a count of top-level records.
//! - `Child`: a parent index into the parent's elements.
//! - `Leaf`: a parent index plus one value per element.
//!
//! Some transforms attach side channels that their descendants read back:
//! filters record which parent elements survived (`indices_to_keep`),
//! reroot records which original record each new root came from
//! (`input_proto_index`), and subtree broadcast records which origin element
//! each copy was taken from (`index_to_value`).

use std::fmt;

use serde::{Deserialize, Serialize};

use crate::error::{Error, Result};
use crate::kernels::{is_non_decreasing, is_strictly_increasing, run_length_before};
use crate::schema::DataType;
use crate::types::Values;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RootNode {
    pub size: usize,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub input_proto_index: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices_to_keep: Option<Vec<usize>>,
}

impl RootNode {
    pub fn new(size: usize) -> Self {
        Self {
            size,
            input_proto_index: None,
            indices_to_keep: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChildNode {
    pub parent_index: Vec<usize>,
    pub is_repeated: bool,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub index_to_value: Option<Vec<usize>>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub indices_to_keep: Option<Vec<usize>>,
}

impl ChildNode {
    pub fn new(parent_index: Vec<usize>, is_repeated: bool) -> Self {
        Self {
            parent_index,
            is_repeated,
            index_to_value: None,
            indices_to_keep: None,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct LeafNode {
    pub parent_index: Vec<usize>,
    pub values: Values,
    pub is_repeated: bool,
}

impl LeafNode {
    pub fn new(parent_index: Vec<usize>, values: Values, is_repeated: bool) -> Result<Self> {
        if parent_index.len() != values.len() {
            return Err(Error::ShapeMismatch(format!(
                "leaf has {} parent indices but {} values",
                parent_index.len(),
                values.len()
            )));
        }
        Ok(Self {
            parent_index,
            values,
            is_repeated,
        })
    }

    /// A required (one per parent) leaf: parent index `0..n`.
    pub fn required(values: Values) -> Self {
        Self {
            parent_index: (0..values.len()).collect(),
            values,
            is_repeated: false,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum NodeValue {
    Root(RootNode),
    Child(ChildNode),
    Leaf(LeafNode),
}

impl NodeValue {
    pub fn root(size: usize) -> Self {
        NodeValue::Root(RootNode::new(size))
    }

    pub fn child(parent_index: Vec<usize>, is_repeated: bool) -> Self {
        NodeValue::Child(ChildNode::new(parent_index, is_repeated))
    }

    pub fn leaf(
        parent_index: Vec<usize>,
        values: impl Into<Values>,
        is_repeated: bool,
    ) -> Result<Self> {
        Ok(NodeValue::Leaf(LeafNode::new(
            parent_index,
            values.into(),
            is_repeated,
        )?))
    }

    /// Roots are always repeated.
    pub fn is_repeated(&self) -> bool {
        match self {
            NodeValue::Root(_) => true,
            NodeValue::Child(c) => c.is_repeated,
            NodeValue::Leaf(l) => l.is_repeated,
        }
    }

    pub fn parent_index(&self) -> Option<&[usize]> {
        match self {
            NodeValue::Root(_) => None,
            NodeValue::Child(c) => Some(&c.parent_index),
            NodeValue::Leaf(l) => Some(&l.parent_index),
        }
    }

    /// Number of elements at this node.
    pub fn size(&self) -> usize {
        match self {
            NodeValue::Root(r) => r.size,
            NodeValue::Child(c) => c.parent_index.len(),
            NodeValue::Leaf(l) => l.parent_index.len(),
        }
    }

    /// Index of each element within its parent (`0..size` for a root).
    pub fn positional_index(&self) -> Vec<usize> {
        match self.parent_index() {
            Some(pi) => run_length_before(pi),
            None => (0..self.size()).collect(),
        }
    }

    pub fn data_type(&self) -> Option<DataType> {
        match self {
            NodeValue::Leaf(l) => Some(l.values.data_type()),
            _ => None,
        }
    }

    pub fn indices_to_keep(&self) -> Option<&[usize]> {
        match self {
            NodeValue::Root(r) => r.indices_to_keep.as_deref(),
            NodeValue::Child(c) => c.indices_to_keep.as_deref(),
            NodeValue::Leaf(_) => None,
        }
    }

    pub fn as_root(&self) -> Option<&RootNode> {
        match self {
            NodeValue::Root(r) => Some(r),
            _ => None,
        }
    }

    pub fn as_child(&self) -> Option<&ChildNode> {
        match self {
            NodeValue::Child(c) => Some(c),
            _ => None,
        }
    }

    pub fn as_leaf(&self) -> Option<&LeafNode> {
        match self {
            NodeValue::Leaf(l) => Some(l),
            _ => None,
        }
    }

    pub fn is_leaf(&self) -> bool {
        matches!(self, NodeValue::Leaf(_))
    }

    pub fn kind(&self) -> &'static str {
        match self {
            NodeValue::Root(_) => "root",
            NodeValue::Child(_) => "child",
            NodeValue::Leaf(_) => "leaf",
        }
    }

    /// Checks that only need this node: parent index ordering, and value
    /// count for leaves. Optional fields allow at most one element per parent.
    pub fn check_shape(&self) -> Result<()> {
        if let NodeValue::Leaf(l) = self {
            if l.parent_index.len() != l.values.len() {
                return Err(Error::ShapeMismatch(format!(
                    "leaf has {} parent indices but {} values",
                    l.parent_index.len(),
                    l.values.len()
                )));
            }
        }
        if let Some(pi) = self.parent_index() {
            if !is_non_decreasing(pi) {
                return Err(Error::ShapeMismatch(
                    "parent index is not non-decreasing".to_string(),
                ));
            }
            if !self.is_repeated() && !is_strictly_increasing(pi) {
                return Err(Error::ShapeMismatch(
                    "optional field has more than one element per parent".to_string(),
                ));
            }
        }
        Ok(())
    }

    /// Every parent index must address an element of a parent of `extent` elements.
    pub fn check_parent_extent(&self, extent: usize) -> Result<()> {
        if let Some(pi) = self.parent_index() {
            if let Some(bad) = pi.iter().find(|&&p| p >= extent) {
                return Err(Error::ShapeMismatch(format!(
                    "parent index {} out of range for parent of size {}",
                    bad, extent
                )));
            }
        }
        Ok(())
    }
}

impl fmt::Display for NodeValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NodeValue::Root(r) => write!(f, "root (size {})", r.size),
            NodeValue::Child(c) => write!(
                f,
                "{} child",
                if c.is_repeated { "repeated" } else { "optional" }
            ),
            NodeValue::Leaf(l) => write!(
                f,
                "{} {}",
                if l.is_repeated { "repeated" } else { "optional" },
                l.values.data_type()
            ),
        }
    }
}
