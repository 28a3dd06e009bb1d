//! Deferred instructions recorded by [`LazyEngine`](super::lazy::LazyEngine).

use serde::Serialize;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum BinaryOp {
    Add,
    Sub,
    Mul,
    Div,
}

impl BinaryOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> f64 {
        match self {
            BinaryOp::Add => lhs + rhs,
            BinaryOp::Sub => lhs - rhs,
            BinaryOp::Mul => lhs * rhs,
            BinaryOp::Div => lhs / rhs,
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum CompareOp {
    Lt,
    Le,
    Gt,
    Ge,
}

impl CompareOp {
    pub fn apply(self, lhs: f64, rhs: f64) -> bool {
        match self {
            CompareOp::Lt => lhs < rhs,
            CompareOp::Le => lhs <= rhs,
            CompareOp::Gt => lhs > rhs,
            CompareOp::Ge => lhs >= rhs,
        }
    }
}

/// One deferred operation. Operands are array ids of the owning engine and
/// are resolved against the current view layout every time the instruction
/// runs, which is what lets sliding views move between iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum Instruction {
    Fill {
        out: usize,
        value: f64,
    },
    Assign {
        out: usize,
        input: usize,
    },
    Binary {
        op: BinaryOp,
        out: usize,
        lhs: usize,
        rhs: usize,
    },
    Scalar {
        op: BinaryOp,
        out: usize,
        input: usize,
        scalar: f64,
    },
    Compare {
        op: CompareOp,
        out: usize,
        input: usize,
        scalar: f64,
    },
    Sum {
        out: usize,
        input: usize,
    },
}

impl Instruction {
    pub fn name(&self) -> &'static str {
        match self {
            Instruction::Fill { .. } => "fill",
            Instruction::Assign { .. } => "assign",
            Instruction::Binary { .. } => "binary",
            Instruction::Scalar { .. } => "scalar",
            Instruction::Compare { .. } => "compare",
            Instruction::Sum { .. } => "sum",
        }
    }
}
