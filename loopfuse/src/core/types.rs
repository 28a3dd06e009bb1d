//! Shared deterministic types for the loop-fusion core.
//!
//! These types define stable contracts between the loop driver, the
//! condition validator and engine backends. They carry no engine state.

use std::fmt;

use serde::{Deserialize, Serialize};

/// Element type of an engine-resident array.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum DType {
    Bool,
    Int64,
    Float64,
}

impl DType {
    pub fn name(self) -> &'static str {
        match self {
            DType::Bool => "bool",
            DType::Int64 => "int64",
            DType::Float64 => "float64",
        }
    }

    /// Normalize a raw element value to what this dtype can represent.
    pub fn coerce(self, value: f64) -> f64 {
        match self {
            DType::Bool => {
                if value != 0.0 {
                    1.0
                } else {
                    0.0
                }
            }
            DType::Int64 => value.trunc(),
            DType::Float64 => value,
        }
    }

    /// Result dtype of an arithmetic operation between `self` and `other`.
    ///
    /// Booleans promote to integers, anything involving a float stays float.
    pub fn promote(self, other: DType) -> DType {
        match (self, other) {
            (DType::Float64, _) | (_, DType::Float64) => DType::Float64,
            _ => DType::Int64,
        }
    }
}

impl fmt::Display for DType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// A plain host-side value, i.e. something computed outside the engine.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum HostValue {
    Bool(bool),
    Int(i64),
    Float(f64),
}

impl HostValue {
    pub fn describe(&self) -> String {
        match self {
            HostValue::Bool(value) => format!("host bool {value}"),
            HostValue::Int(value) => format!("host int {value}"),
            HostValue::Float(value) => format!("host float {value}"),
        }
    }
}

/// Value produced by one trace of a conditional loop body.
///
/// Only `Array` can ever satisfy the condition contract; `Host` exists so a
/// body that accidentally computed its condition eagerly is reported instead
/// of silently accepted.
#[derive(Debug, Clone, PartialEq)]
pub enum LoopValue<A> {
    Array(A),
    Host(HostValue),
}

impl<A> From<A> for LoopValue<A> {
    fn from(array: A) -> Self {
        LoopValue::Array(array)
    }
}

/// True if `shape` describes a scalar: rank 0, or rank 1 with one element.
pub fn is_scalar_shape(shape: &[usize]) -> bool {
    match shape {
        [] => true,
        [len] => *len == 1,
        _ => false,
    }
}
