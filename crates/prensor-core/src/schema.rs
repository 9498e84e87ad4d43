//! Element types and the tree-shaped schema used to describe a prensor
//! without carrying its values (placeholders are declared from one of these).

use std::collections::{BTreeMap, BTreeSet};
use std::fmt;

use serde::{Deserialize, Serialize};

use crate::node::NodeValue;
use crate::path::Step;
use crate::prensor::Prensor;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum DataType {
    Boolean,
    Int32,
    Int64,
    Float32,
    Float64,
    Utf8,
    Binary,
}

impl fmt::Display for DataType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            DataType::Boolean => "bool",
            DataType::Int32 => "int32",
            DataType::Int64 => "int64",
            DataType::Float32 => "float32",
            DataType::Float64 => "float64",
            DataType::Utf8 => "string",
            DataType::Binary => "bytes",
        };
        f.write_str(s)
    }
}

/// Shape of one node and its subtree.
///
/// `data_type == None` marks an internal (root or child) node.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Schema {
    pub is_repeated: bool,
    pub data_type: Option<DataType>,
    pub children: BTreeMap<Step, Schema>,
}

impl Schema {
    /// Schema for a root: repeated, no type.
    pub fn root() -> Self {
        Self::node(true)
    }

    pub fn node(is_repeated: bool) -> Self {
        Self {
            is_repeated,
            data_type: None,
            children: BTreeMap::new(),
        }
    }

    pub fn leaf(is_repeated: bool, data_type: DataType) -> Self {
        Self {
            is_repeated,
            data_type: Some(data_type),
            children: BTreeMap::new(),
        }
    }

    /// Builder-style child insertion.
    pub fn with_child(mut self, step: impl Into<Step>, child: Schema) -> Self {
        self.children.insert(step.into(), child);
        self
    }

    pub fn get_child(&self, step: &Step) -> Option<&Schema> {
        self.children.get(step)
    }

    pub fn known_field_names(&self) -> BTreeSet<Step> {
        self.children.keys().cloned().collect()
    }

    pub fn is_leaf(&self) -> bool {
        self.children.is_empty()
    }

    /// Describe an existing prensor.
    pub fn from_prensor(t: &Prensor) -> Self {
        let node = t.node();
        let data_type = match node.as_ref() {
            NodeValue::Leaf(leaf) => Some(leaf.values.data_type()),
            _ => None,
        };
        Self {
            is_repeated: node.is_repeated(),
            data_type,
            children: t
                .children()
                .iter()
                .map(|(k, v)| (k.clone(), Schema::from_prensor(v)))
                .collect(),
        }
    }
}
