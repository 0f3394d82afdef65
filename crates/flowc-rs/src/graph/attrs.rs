use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::tensor::TensorValue;

/// Kind-tagged attribute payload stored per node.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum AttrValue {
    I64(i64),
    F64(f64),
    Bool(bool),
    String(String),
    I64Array(Vec<i64>),
    F64Array(Vec<f64>),
    BoolArray(Vec<bool>),
    StringArray(Vec<String>),
    Tensor(TensorValue),
}

impl AttrValue {
    pub fn as_i64(&self) -> Option<i64> {
        match self {
            AttrValue::I64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            AttrValue::F64(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            AttrValue::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_str(&self) -> Option<&str> {
        match self {
            AttrValue::String(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_i64_array(&self) -> Option<&[i64]> {
        match self {
            AttrValue::I64Array(values) => Some(values),
            _ => None,
        }
    }

    pub fn as_tensor(&self) -> Option<&TensorValue> {
        match self {
            AttrValue::Tensor(value) => Some(value),
            _ => None,
        }
    }
}

/// Attribute mapping attached to each node; insertion order is irrelevant.
pub type AttrMap = BTreeMap<String, AttrValue>;

/// Reserved attribute keys owned by the compiler core.
pub mod keys {
    /// Fusion scope id stamped by the scope allocator.
    pub const SCOPE_ID: &str = "fusion.scope_id";
    /// Marker set by the loop-structure pass once a node's loop membership
    /// has been vetted; elimination inside a loop requires it.
    pub const LOOP_CHECKED: &str = "loop.checked";
    /// Index set of loop-entry inputs that must stay contiguous in memory.
    pub const CONTIGUOUS_INPUTS: &str = "memory.contiguous_inputs";
    /// Constant payload of a `Const` node.
    pub const VALUE: &str = "value";
    /// Scalar fill value of a `Fill` node.
    pub const FILL_VALUE: &str = "fill.value";
    /// Requested block dimension for a lowered kernel launch.
    pub const BLOCK_DIM: &str = "launch.block_dim";
}
