//! Loop-fusion errors.
//!
//! Every variant is fatal for the loop being set up: no repeat instruction
//! has been issued when one of these is returned.

use thiserror::Error;

use crate::core::types::DType;

#[derive(Debug, Error)]
pub enum LoopError {
    /// The engine materialized work while the body was being traced.
    #[error(
        "unsupported loop body: op count moved from {before} to {after} during trace \
         (the body forces evaluation, branches on data, or is too big to fuse)"
    )]
    UnsupportedLoopBody { before: u64, after: u64 },

    #[error("loop condition must be an engine array, got {found}")]
    NotAnEngineArray { found: String },

    #[error("loop condition must be of type `bool`, got `{dtype}`")]
    NonBooleanCondition { dtype: DType },

    #[error("loop condition must be a scalar or an array with one element, got shape {shape:?}")]
    NonScalarCondition { shape: Vec<usize> },

    #[error("loop condition is an array view; it must be a base array")]
    ConditionIsView,

    #[error(transparent)]
    Engine(#[from] anyhow::Error),
}
