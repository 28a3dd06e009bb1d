//! Condition contract for conditional loops.
//!
//! A termination value is accepted only if it is:
//! - an array owned by the engine (not a host value, not a foreign handle),
//! - of `bool` dtype,
//! - a scalar or a one-dimensional single-element array,
//! - a base array, so the engine can poll a stable location.
//!
//! Checks run in that order and the first failure is returned.

use crate::core::types::{DType, LoopValue, is_scalar_shape};
use crate::engine::Engine;
use crate::error::LoopError;

/// Validate a termination value and return the condition array it holds.
pub fn validate_condition<'a, E: Engine>(
    engine: &E,
    value: &'a LoopValue<E::Array>,
) -> Result<&'a E::Array, LoopError> {
    let array = match value {
        LoopValue::Host(host) => {
            return Err(LoopError::NotAnEngineArray {
                found: host.describe(),
            });
        }
        LoopValue::Array(array) if !engine.is_engine_array(array) => {
            return Err(LoopError::NotAnEngineArray {
                found: format!("{array:?}, which this engine does not own"),
            });
        }
        LoopValue::Array(array) => array,
    };

    let dtype = engine.dtype(array)?;
    if dtype != DType::Bool {
        return Err(LoopError::NonBooleanCondition { dtype });
    }

    let shape = engine.shape(array)?;
    if !is_scalar_shape(&shape) {
        return Err(LoopError::NonScalarCondition { shape });
    }

    if !engine.is_base(array) {
        return Err(LoopError::ConditionIsView);
    }

    Ok(array)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::types::HostValue;
    use crate::test_support::RecordingEngine;

    #[test]
    fn accepts_bool_scalar_base() {
        let mut engine = RecordingEngine::new();
        let rank0 = LoopValue::Array(engine.base(DType::Bool, &[]));
        let rank1 = LoopValue::Array(engine.base(DType::Bool, &[1]));
        assert!(validate_condition(&engine, &rank0).is_ok());
        assert!(validate_condition(&engine, &rank1).is_ok());
    }

    #[test]
    fn rejects_host_values() {
        let engine = RecordingEngine::new();
        let err = validate_condition(&engine, &LoopValue::Host(HostValue::Bool(true)))
            .expect_err("host value");
        assert!(matches!(err, LoopError::NotAnEngineArray { .. }));
    }

    #[test]
    fn rejects_foreign_arrays() {
        let mut engine = RecordingEngine::new();
        let value = LoopValue::Array(engine.foreign(DType::Bool, &[]));
        let err = validate_condition(&engine, &value).expect_err("foreign");
        assert!(matches!(err, LoopError::NotAnEngineArray { .. }));
    }

    #[test]
    fn rejects_non_boolean() {
        let mut engine = RecordingEngine::new();
        let value = LoopValue::Array(engine.base(DType::Float64, &[]));
        let err = validate_condition(&engine, &value).expect_err("float");
        assert!(matches!(
            err,
            LoopError::NonBooleanCondition {
                dtype: DType::Float64
            }
        ));
    }

    #[test]
    fn rejects_non_scalar_shapes() {
        let mut engine = RecordingEngine::new();
        for shape in [vec![2], vec![0], vec![1, 1]] {
            let value = LoopValue::Array(engine.base(DType::Bool, &shape));
            let err = validate_condition(&engine, &value).expect_err("shape");
            assert!(
                matches!(&err, LoopError::NonScalarCondition { shape: got } if *got == shape),
                "unexpected error for {shape:?}: {err}"
            );
        }
    }

    #[test]
    fn rejects_views_last() {
        let mut engine = RecordingEngine::new();
        let value = LoopValue::Array(engine.view_of(DType::Bool, &[1]));
        let err = validate_condition(&engine, &value).expect_err("view");
        assert!(matches!(err, LoopError::ConditionIsView));

        // dtype is checked before view-ness
        let value = LoopValue::Array(engine.view_of(DType::Int64, &[1]));
        let err = validate_condition(&engine, &value).expect_err("int view");
        assert!(matches!(err, LoopError::NonBooleanCondition { .. }));
    }
}
