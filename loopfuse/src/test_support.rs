//! Test-only engine that records every call instead of computing anything.
//!
//! `RecordingEngine` plays the role the scripted executors play for process
//! backends: tests drive the loop driver against it and assert on the exact
//! sequence of engine calls.

use anyhow::{Result, bail};

use crate::core::iterator::StaticSelector;
use crate::core::types::DType;
use crate::engine::Engine;

/// Array handle understood by [`RecordingEngine`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct FakeArray {
    pub id: usize,
    pub dtype: DType,
    pub shape: Vec<usize>,
    pub base: bool,
    /// Handle that does not belong to the recording engine.
    pub foreign: bool,
}

/// One call observed by the recording engine, in issue order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum EngineCall {
    Flush,
    /// Out-of-band read performed by a loop body.
    Read(FakeArray),
    Sync(FakeArray),
    Repeat {
        count: u64,
        condition: Option<FakeArray>,
    },
    Slide {
        view: FakeArray,
        dim: usize,
        stride: i64,
    },
    View {
        array: FakeArray,
        selectors: Vec<StaticSelector>,
    },
}

#[derive(Debug, Default)]
pub struct RecordingEngine {
    pub calls: Vec<EngineCall>,
    op_count: u64,
    next_id: usize,
    /// When set, `repeat` fails after recording the call.
    pub fail_repeat: bool,
}

impl RecordingEngine {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn base(&mut self, dtype: DType, shape: &[usize]) -> FakeArray {
        self.make(dtype, shape, true, false)
    }

    /// A view handle that was never produced by [`Engine::view`].
    pub fn view_of(&mut self, dtype: DType, shape: &[usize]) -> FakeArray {
        self.make(dtype, shape, false, false)
    }

    pub fn foreign(&mut self, dtype: DType, shape: &[usize]) -> FakeArray {
        self.make(dtype, shape, true, true)
    }

    /// Simulate a body reading data, which forces a materialization.
    pub fn force_read(&mut self, array: &FakeArray) {
        self.op_count += 1;
        self.calls.push(EngineCall::Read(array.clone()));
    }

    pub fn repeats(&self) -> Vec<&EngineCall> {
        self.calls
            .iter()
            .filter(|call| matches!(call, EngineCall::Repeat { .. }))
            .collect()
    }

    pub fn slides(&self) -> Vec<(usize, i64)> {
        self.calls
            .iter()
            .filter_map(|call| match call {
                EngineCall::Slide { dim, stride, .. } => Some((*dim, *stride)),
                _ => None,
            })
            .collect()
    }

    fn make(&mut self, dtype: DType, shape: &[usize], base: bool, foreign: bool) -> FakeArray {
        self.next_id += 1;
        FakeArray {
            id: self.next_id,
            dtype,
            shape: shape.to_vec(),
            base,
            foreign,
        }
    }
}

impl Engine for RecordingEngine {
    type Array = FakeArray;

    fn flush(&mut self) -> Result<()> {
        self.op_count += 1;
        self.calls.push(EngineCall::Flush);
        Ok(())
    }

    fn op_count(&self) -> u64 {
        self.op_count
    }

    fn sync(&mut self, array: &FakeArray) -> Result<()> {
        self.calls.push(EngineCall::Sync(array.clone()));
        Ok(())
    }

    fn repeat(&mut self, count: u64, condition: Option<&FakeArray>) -> Result<()> {
        self.calls.push(EngineCall::Repeat {
            count,
            condition: condition.cloned(),
        });
        if self.fail_repeat {
            bail!("scripted repeat failure");
        }
        Ok(())
    }

    fn slide_view(&mut self, view: &FakeArray, dim: usize, stride: i64) -> Result<()> {
        self.calls.push(EngineCall::Slide {
            view: view.clone(),
            dim,
            stride,
        });
        Ok(())
    }

    fn is_engine_array(&self, array: &FakeArray) -> bool {
        !array.foreign
    }

    fn is_base(&self, array: &FakeArray) -> bool {
        array.base
    }

    fn dtype(&self, array: &FakeArray) -> Result<DType> {
        Ok(array.dtype)
    }

    fn shape(&self, array: &FakeArray) -> Result<Vec<usize>> {
        Ok(array.shape.clone())
    }

    fn view(&mut self, array: &FakeArray, selectors: &[StaticSelector]) -> Result<FakeArray> {
        self.calls.push(EngineCall::View {
            array: array.clone(),
            selectors: selectors.to_vec(),
        });
        Ok(self.make(array.dtype, &array.shape, false, false))
    }
}
