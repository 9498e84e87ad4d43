//! Value payloads for leaf nodes.
//!
//! `Values` is a typed column (one variant per `DataType`); `Scalar` is a
//! single element pulled out of one.

use serde::{Deserialize, Serialize};

use crate::error::Result;
use crate::kernels::gather;
use crate::schema::DataType;

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Scalar {
    Bool(bool),
    I32(i32),
    I64(i64),
    F32(f32),
    F64(f64),
    Str(String),
    Bin(Vec<u8>),
}

impl Scalar {
    pub fn data_type(&self) -> DataType {
        match self {
            Scalar::Bool(_) => DataType::Boolean,
            Scalar::I32(_) => DataType::Int32,
            Scalar::I64(_) => DataType::Int64,
            Scalar::F32(_) => DataType::Float32,
            Scalar::F64(_) => DataType::Float64,
            Scalar::Str(_) => DataType::Utf8,
            Scalar::Bin(_) => DataType::Binary,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum Values {
    Bool(Vec<bool>),
    I32(Vec<i32>),
    I64(Vec<i64>),
    F32(Vec<f32>),
    F64(Vec<f64>),
    Str(Vec<String>),
    Bin(Vec<Vec<u8>>),
}

macro_rules! each_variant {
    ($v:expr, $x:ident => $body:expr) => {
        match $v {
            Values::Bool($x) => $body,
            Values::I32($x) => $body,
            Values::I64($x) => $body,
            Values::F32($x) => $body,
            Values::F64($x) => $body,
            Values::Str($x) => $body,
            Values::Bin($x) => $body,
        }
    };
}

macro_rules! each_variant_map {
    ($v:expr, $x:ident => $body:expr) => {
        match $v {
            Values::Bool($x) => Values::Bool($body),
            Values::I32($x) => Values::I32($body),
            Values::I64($x) => Values::I64($body),
            Values::F32($x) => Values::F32($body),
            Values::F64($x) => Values::F64($body),
            Values::Str($x) => Values::Str($body),
            Values::Bin($x) => Values::Bin($body),
        }
    };
}

impl Values {
    pub fn data_type(&self) -> DataType {
        match self {
            Values::Bool(_) => DataType::Boolean,
            Values::I32(_) => DataType::Int32,
            Values::I64(_) => DataType::Int64,
            Values::F32(_) => DataType::Float32,
            Values::F64(_) => DataType::Float64,
            Values::Str(_) => DataType::Utf8,
            Values::Bin(_) => DataType::Binary,
        }
    }

    /// An empty column of the given type.
    pub fn empty(data_type: DataType) -> Self {
        match data_type {
            DataType::Boolean => Values::Bool(Vec::new()),
            DataType::Int32 => Values::I32(Vec::new()),
            DataType::Int64 => Values::I64(Vec::new()),
            DataType::Float32 => Values::F32(Vec::new()),
            DataType::Float64 => Values::F64(Vec::new()),
            DataType::Utf8 => Values::Str(Vec::new()),
            DataType::Binary => Values::Bin(Vec::new()),
        }
    }

    pub fn len(&self) -> usize {
        each_variant!(self, v => v.len())
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// `out[i] = self[indices[i]]`.
    pub fn gather(&self, indices: &[usize]) -> Result<Values> {
        Ok(each_variant_map!(self, v => gather(v, indices)?))
    }

    pub fn get(&self, i: usize) -> Option<Scalar> {
        match self {
            Values::Bool(v) => v.get(i).copied().map(Scalar::Bool),
            Values::I32(v) => v.get(i).copied().map(Scalar::I32),
            Values::I64(v) => v.get(i).copied().map(Scalar::I64),
            Values::F32(v) => v.get(i).copied().map(Scalar::F32),
            Values::F64(v) => v.get(i).copied().map(Scalar::F64),
            Values::Str(v) => v.get(i).cloned().map(Scalar::Str),
            Values::Bin(v) => v.get(i).cloned().map(Scalar::Bin),
        }
    }

    pub fn as_bool(&self) -> Option<&[bool]> {
        match self {
            Values::Bool(v) => Some(v),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<&[i64]> {
        match self {
            Values::I64(v) => Some(v),
            _ => None,
        }
    }
}

impl From<Vec<bool>> for Values {
    fn from(v: Vec<bool>) -> Self {
        Values::Bool(v)
    }
}

impl From<Vec<i32>> for Values {
    fn from(v: Vec<i32>) -> Self {
        Values::I32(v)
    }
}

impl From<Vec<i64>> for Values {
    fn from(v: Vec<i64>) -> Self {
        Values::I64(v)
    }
}

impl From<Vec<f32>> for Values {
    fn from(v: Vec<f32>) -> Self {
        Values::F32(v)
    }
}

impl From<Vec<f64>> for Values {
    fn from(v: Vec<f64>) -> Self {
        Values::F64(v)
    }
}

impl From<Vec<String>> for Values {
    fn from(v: Vec<String>) -> Self {
        Values::Str(v)
    }
}

impl From<Vec<&str>> for Values {
    fn from(v: Vec<&str>) -> Self {
        Values::Str(v.into_iter().map(str::to_string).collect())
    }
}

impl From<Vec<Vec<u8>>> for Values {
    fn from(v: Vec<Vec<u8>>) -> Self {
        Values::Bin(v)
    }
}
