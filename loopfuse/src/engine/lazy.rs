//! In-process reference engine.
//!
//! `LazyEngine` keeps every array as a flat `f64` buffer plus a strided
//! [`Layout`]. Arithmetic is recorded into a pending queue and only runs when
//! the queue is flushed, read, or replayed by [`Engine::repeat`].
//!
//! The engine is append-only: handles are never released, so every base,
//! view and temporary lives as long as the engine. Use one engine per
//! computation rather than one per process.

use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};

use anyhow::{Context, Result, anyhow, ensure};
use serde::Serialize;
use tracing::{debug, instrument, trace, warn};

use crate::core::iterator::StaticSelector;
use crate::core::layout::Layout;
use crate::core::types::DType;
use crate::engine::Engine;
use crate::engine::ops::{BinaryOp, CompareOp, Instruction};
use crate::io::config::EngineConfig;

static NEXT_ENGINE_ID: AtomicU64 = AtomicU64::new(1);

/// Identity of one engine instance; handles never cross instances.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize)]
pub struct EngineId(u64);

/// Handle to an array owned by a [`LazyEngine`].
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct ArrayRef {
    engine: EngineId,
    id: usize,
}

impl fmt::Display for ArrayRef {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "array#{}@engine{}", self.id, self.engine.0)
    }
}

/// Counters exposed for reporting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct EngineStats {
    pub op_count: u64,
    pub pending_ops: usize,
    pub iterations_executed: u64,
}

struct BaseBuffer {
    dtype: DType,
    data: Vec<f64>,
    synced: bool,
}

struct ArrayEntry {
    base: usize,
    layout: Layout,
    is_base: bool,
}

#[derive(Debug, Clone, Copy)]
struct Slide {
    view: usize,
    dim: usize,
    stride: i64,
}

pub struct LazyEngine {
    id: EngineId,
    bases: Vec<BaseBuffer>,
    arrays: Vec<ArrayEntry>,
    pending: Vec<Instruction>,
    slides: Vec<Slide>,
    op_count: u64,
    iterations_executed: u64,
    max_pending_ops: usize,
}

impl Default for LazyEngine {
    fn default() -> Self {
        Self::new(&EngineConfig::default())
    }
}

impl LazyEngine {
    pub fn new(config: &EngineConfig) -> Self {
        Self {
            id: EngineId(NEXT_ENGINE_ID.fetch_add(1, Ordering::Relaxed)),
            bases: Vec::new(),
            arrays: Vec::new(),
            pending: Vec::new(),
            slides: Vec::new(),
            op_count: 0,
            iterations_executed: 0,
            max_pending_ops: config.max_pending_ops,
        }
    }

    pub fn id(&self) -> EngineId {
        self.id
    }

    pub fn stats(&self) -> EngineStats {
        EngineStats {
            op_count: self.op_count,
            pending_ops: self.pending.len(),
            iterations_executed: self.iterations_executed,
        }
    }

    pub fn zeros(&mut self, shape: &[usize], dtype: DType) -> ArrayRef {
        self.full(shape, dtype, 0.0)
    }

    pub fn full(&mut self, shape: &[usize], dtype: DType, value: f64) -> ArrayRef {
        let len = shape.iter().product();
        self.alloc(shape, dtype, vec![dtype.coerce(value); len])
    }

    pub fn from_vec(&mut self, data: Vec<f64>, shape: &[usize], dtype: DType) -> Result<ArrayRef> {
        let len: usize = shape.iter().product();
        ensure!(
            data.len() == len,
            "{} values do not fill shape {shape:?} ({len} elements)",
            data.len()
        );
        let data = data.into_iter().map(|value| dtype.coerce(value)).collect();
        Ok(self.alloc(shape, dtype, data))
    }

    /// `[0, 1, .., len - 1]` as a one-dimensional base.
    pub fn arange(&mut self, len: usize, dtype: DType) -> ArrayRef {
        let data = (0..len).map(|i| dtype.coerce(i as f64)).collect();
        self.alloc(&[len], dtype, data)
    }

    pub fn fill(&mut self, out: &ArrayRef, value: f64) -> Result<()> {
        let out = self.resolve(out)?;
        self.record(Instruction::Fill { out, value })
    }

    /// `out[...] = input`; a single-element input is broadcast.
    pub fn assign(&mut self, out: &ArrayRef, input: &ArrayRef) -> Result<()> {
        let out_id = self.resolve(out)?;
        let input_id = self.resolve(input)?;
        let out_len = self.arrays[out_id].layout.len();
        let input_len = self.arrays[input_id].layout.len();
        ensure!(
            input_len == out_len || input_len == 1,
            "cannot assign {input_len} elements into {out} with {out_len} elements"
        );
        self.record(Instruction::Assign {
            out: out_id,
            input: input_id,
        })
    }

    pub fn binary(&mut self, op: BinaryOp, lhs: &ArrayRef, rhs: &ArrayRef) -> Result<ArrayRef> {
        let lhs_id = self.resolve(lhs)?;
        let rhs_id = self.resolve(rhs)?;
        let dtype = match op {
            BinaryOp::Div => DType::Float64,
            _ => self.dtype_of(lhs_id).promote(self.dtype_of(rhs_id)),
        };
        let shape = self.arrays[lhs_id].layout.shape.clone();
        let out = self.zeros(&shape, dtype);
        self.binary_into(op, &out, lhs, rhs)?;
        Ok(out)
    }

    pub fn binary_into(
        &mut self,
        op: BinaryOp,
        out: &ArrayRef,
        lhs: &ArrayRef,
        rhs: &ArrayRef,
    ) -> Result<()> {
        let out_id = self.resolve(out)?;
        let lhs_id = self.resolve(lhs)?;
        let rhs_id = self.resolve(rhs)?;
        self.ensure_same_shape(out_id, lhs_id)?;
        self.ensure_same_shape(lhs_id, rhs_id)?;
        self.record(Instruction::Binary {
            op,
            out: out_id,
            lhs: lhs_id,
            rhs: rhs_id,
        })
    }

    pub fn scalar(&mut self, op: BinaryOp, input: &ArrayRef, scalar: f64) -> Result<ArrayRef> {
        let input_id = self.resolve(input)?;
        let dtype = if op == BinaryOp::Div || scalar.fract() != 0.0 {
            DType::Float64
        } else {
            self.dtype_of(input_id).promote(DType::Int64)
        };
        let shape = self.arrays[input_id].layout.shape.clone();
        let out = self.zeros(&shape, dtype);
        self.scalar_into(op, &out, input, scalar)?;
        Ok(out)
    }

    pub fn scalar_into(
        &mut self,
        op: BinaryOp,
        out: &ArrayRef,
        input: &ArrayRef,
        scalar: f64,
    ) -> Result<()> {
        let out_id = self.resolve(out)?;
        let input_id = self.resolve(input)?;
        self.ensure_same_shape(out_id, input_id)?;
        self.record(Instruction::Scalar {
            op,
            out: out_id,
            input: input_id,
            scalar,
        })
    }

    /// `array += scalar`, in place.
    pub fn iadd_scalar(&mut self, array: &ArrayRef, scalar: f64) -> Result<()> {
        self.scalar_into(BinaryOp::Add, array, array, scalar)
    }

    /// Elementwise comparison against a scalar into a new boolean base.
    pub fn compare(&mut self, op: CompareOp, input: &ArrayRef, scalar: f64) -> Result<ArrayRef> {
        let input_id = self.resolve(input)?;
        let shape = self.arrays[input_id].layout.shape.clone();
        let out = self.zeros(&shape, DType::Bool);
        self.record(Instruction::Compare {
            op,
            out: out.id,
            input: input_id,
            scalar,
        })?;
        Ok(out)
    }

    /// Sum of all elements into a new rank-0 base.
    pub fn sum(&mut self, input: &ArrayRef) -> Result<ArrayRef> {
        let input_id = self.resolve(input)?;
        let dtype = match self.dtype_of(input_id) {
            DType::Float64 => DType::Float64,
            DType::Bool | DType::Int64 => DType::Int64,
        };
        let out = self.zeros(&[], dtype);
        self.record(Instruction::Sum {
            out: out.id,
            input: input_id,
        })?;
        Ok(out)
    }

    /// Read the values of `array`.
    ///
    /// This is an out-of-band materialization: pending work runs first and
    /// the op count moves.
    pub fn read(&mut self, array: &ArrayRef) -> Result<Vec<f64>> {
        let id = self.resolve(array)?;
        self.materialize("read")?;
        self.load(id)
    }

    pub fn layout(&self, array: &ArrayRef) -> Result<&Layout> {
        let id = self.resolve(array)?;
        Ok(&self.arrays[id].layout)
    }

    fn alloc(&mut self, shape: &[usize], dtype: DType, data: Vec<f64>) -> ArrayRef {
        let base = self.bases.len();
        self.bases.push(BaseBuffer {
            dtype,
            data,
            synced: false,
        });
        let id = self.arrays.len();
        self.arrays.push(ArrayEntry {
            base,
            layout: Layout::contiguous(shape),
            is_base: true,
        });
        ArrayRef {
            engine: self.id,
            id,
        }
    }

    fn resolve(&self, array: &ArrayRef) -> Result<usize> {
        ensure!(
            array.engine == self.id,
            "{array} belongs to a different engine"
        );
        ensure!(array.id < self.arrays.len(), "unknown {array}");
        Ok(array.id)
    }

    fn dtype_of(&self, id: usize) -> DType {
        self.bases[self.arrays[id].base].dtype
    }

    fn ensure_same_shape(&self, left: usize, right: usize) -> Result<()> {
        let left_shape = &self.arrays[left].layout.shape;
        let right_shape = &self.arrays[right].layout.shape;
        ensure!(
            left_shape == right_shape,
            "shape mismatch: {left_shape:?} vs {right_shape:?}"
        );
        Ok(())
    }

    fn record(&mut self, instruction: Instruction) -> Result<()> {
        trace!(
            op = instruction.name(),
            pending = self.pending.len() + 1,
            "recording instruction"
        );
        self.pending.push(instruction);
        if self.pending.len() > self.max_pending_ops {
            debug!(
                pending = self.pending.len(),
                limit = self.max_pending_ops,
                "pending queue over limit; flushing"
            );
            self.materialize("queue limit")?;
        }
        Ok(())
    }

    fn materialize(&mut self, reason: &str) -> Result<()> {
        let program = std::mem::take(&mut self.pending);
        if !self.slides.is_empty() {
            warn!(
                slides = self.slides.len(),
                "discarding slide registrations outside a repeat"
            );
            self.slides.clear();
        }
        self.op_count += 1;
        debug!(
            reason,
            ops = program.len(),
            op_count = self.op_count,
            "materializing pending operations"
        );
        for instruction in &program {
            self.execute(instruction)
                .with_context(|| format!("execute {}", instruction.name()))?;
        }
        Ok(())
    }

    fn replay(
        &mut self,
        program: &[Instruction],
        slides: &[Slide],
        count: u64,
        condition: Option<usize>,
    ) -> Result<()> {
        for iteration in 0..count {
            for instruction in program {
                self.execute(instruction)
                    .with_context(|| format!("iteration {iteration}: {}", instruction.name()))?;
            }
            self.iterations_executed += 1;

            if let Some(id) = condition {
                let keep_going = self.load(id)?.first().is_some_and(|value| *value != 0.0);
                if !keep_going {
                    debug!(iterations = iteration + 1, "condition is false; stopping");
                    return Ok(());
                }
            }

            for slide in slides {
                self.arrays[slide.view]
                    .layout
                    .advance(slide.dim, slide.stride)?;
            }
        }
        Ok(())
    }

    fn execute(&mut self, instruction: &Instruction) -> Result<()> {
        match *instruction {
            Instruction::Fill { out, value } => {
                let len = self.arrays[out].layout.len();
                self.store(out, &vec![value; len])
            }
            Instruction::Assign { out, input } => {
                let values = self.load(input)?;
                let len = self.arrays[out].layout.len();
                if values.len() == len {
                    return self.store(out, &values);
                }
                let value = values
                    .first()
                    .copied()
                    .ok_or_else(|| anyhow!("assign from an empty array"))?;
                self.store(out, &vec![value; len])
            }
            Instruction::Binary { op, out, lhs, rhs } => {
                let lhs = self.load(lhs)?;
                let rhs = self.load(rhs)?;
                let values: Vec<f64> = lhs
                    .iter()
                    .zip(&rhs)
                    .map(|(left, right)| op.apply(*left, *right))
                    .collect();
                self.store(out, &values)
            }
            Instruction::Scalar {
                op,
                out,
                input,
                scalar,
            } => {
                let values: Vec<f64> = self
                    .load(input)?
                    .into_iter()
                    .map(|value| op.apply(value, scalar))
                    .collect();
                self.store(out, &values)
            }
            Instruction::Compare {
                op,
                out,
                input,
                scalar,
            } => {
                let values: Vec<f64> = self
                    .load(input)?
                    .into_iter()
                    .map(|value| if op.apply(value, scalar) { 1.0 } else { 0.0 })
                    .collect();
                self.store(out, &values)
            }
            Instruction::Sum { out, input } => {
                let total: f64 = self.load(input)?.iter().sum();
                self.store(out, &[total])
            }
        }
    }

    fn load(&self, id: usize) -> Result<Vec<f64>> {
        let entry = &self.arrays[id];
        let data = &self.bases[entry.base].data;
        entry
            .layout
            .element_offsets()
            .into_iter()
            .map(|offset| {
                usize::try_from(offset)
                    .ok()
                    .and_then(|index| data.get(index))
                    .copied()
                    .ok_or_else(|| {
                        anyhow!(
                            "array#{id} reads offset {offset} outside its base of {} elements",
                            data.len()
                        )
                    })
            })
            .collect()
    }

    fn store(&mut self, id: usize, values: &[f64]) -> Result<()> {
        let entry = &self.arrays[id];
        let offsets = entry.layout.element_offsets();
        let base = &mut self.bases[entry.base];
        let dtype = base.dtype;
        let len = base.data.len();
        for (offset, value) in offsets.into_iter().zip(values) {
            let slot = usize::try_from(offset)
                .ok()
                .and_then(|index| base.data.get_mut(index))
                .ok_or_else(|| {
                    anyhow!("array#{id} writes offset {offset} outside its base of {len} elements")
                })?;
            *slot = dtype.coerce(*value);
        }
        Ok(())
    }
}

impl Engine for LazyEngine {
    type Array = ArrayRef;

    fn flush(&mut self) -> Result<()> {
        self.materialize("flush")
    }

    fn op_count(&self) -> u64 {
        self.op_count
    }

    fn sync(&mut self, array: &ArrayRef) -> Result<()> {
        let id = self.resolve(array)?;
        let entry = &self.arrays[id];
        ensure!(entry.is_base, "cannot sync view {array}");
        self.bases[entry.base].synced = true;
        Ok(())
    }

    #[instrument(skip_all, fields(count = count, conditional = condition.is_some()))]
    fn repeat(&mut self, count: u64, condition: Option<&ArrayRef>) -> Result<()> {
        let condition = match condition {
            Some(array) => {
                let id = self.resolve(array)?;
                let entry = &self.arrays[id];
                ensure!(
                    entry.is_base && self.bases[entry.base].synced,
                    "repeat condition {array} must be a synced base array"
                );
                Some(id)
            }
            None => None,
        };

        let program = std::mem::take(&mut self.pending);
        let slides = std::mem::take(&mut self.slides);
        if program.is_empty() {
            debug!("nothing traced; repeat is a no-op");
            return Ok(());
        }
        debug!(ops = program.len(), slides = slides.len(), "replaying traced program");

        let mut saved: Vec<(usize, Layout)> = Vec::new();
        for slide in &slides {
            if !saved.iter().any(|(id, _)| *id == slide.view) {
                saved.push((slide.view, self.arrays[slide.view].layout.clone()));
            }
        }

        let result = self.replay(&program, &slides, count, condition);
        for (id, layout) in saved {
            self.arrays[id].layout = layout;
        }
        result
    }

    fn slide_view(&mut self, view: &ArrayRef, dim: usize, stride: i64) -> Result<()> {
        let id = self.resolve(view)?;
        let entry = &self.arrays[id];
        ensure!(!entry.is_base, "cannot slide base {view}; slide a view of it");
        ensure!(
            dim < entry.layout.ndim(),
            "slide dimension {dim} out of range for {}-d {view}",
            entry.layout.ndim()
        );
        trace!(view = %view, dim, stride, "registering slide");
        self.slides.push(Slide {
            view: id,
            dim,
            stride,
        });
        Ok(())
    }

    fn is_engine_array(&self, array: &ArrayRef) -> bool {
        self.resolve(array).is_ok()
    }

    fn is_base(&self, array: &ArrayRef) -> bool {
        self.resolve(array).is_ok_and(|id| self.arrays[id].is_base)
    }

    fn dtype(&self, array: &ArrayRef) -> Result<DType> {
        let id = self.resolve(array)?;
        Ok(self.dtype_of(id))
    }

    fn shape(&self, array: &ArrayRef) -> Result<Vec<usize>> {
        let id = self.resolve(array)?;
        Ok(self.arrays[id].layout.shape.clone())
    }

    fn view(&mut self, array: &ArrayRef, selectors: &[StaticSelector]) -> Result<ArrayRef> {
        let id = self.resolve(array)?;
        let entry = &self.arrays[id];
        let layout = entry
            .layout
            .select(selectors)
            .with_context(|| format!("index {array}"))?;
        let base = entry.base;
        let view_id = self.arrays.len();
        self.arrays.push(ArrayEntry {
            base,
            layout,
            is_base: false,
        });
        Ok(ArrayRef {
            engine: self.id,
            id: view_id,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn operations_are_deferred_until_read() {
        let mut engine = LazyEngine::default();
        let a = engine.zeros(&[3], DType::Float64);
        engine.iadd_scalar(&a, 2.0).expect("iadd");
        assert_eq!(engine.stats().pending_ops, 1);
        assert_eq!(engine.op_count(), 0);

        assert_eq!(engine.read(&a).expect("read"), vec![2.0, 2.0, 2.0]);
        assert_eq!(engine.op_count(), 1);
        assert_eq!(engine.stats().pending_ops, 0);
    }

    #[test]
    fn repeat_replays_the_pending_program() {
        let mut engine = LazyEngine::default();
        let a = engine.zeros(&[2], DType::Int64);
        engine.iadd_scalar(&a, 1.0).expect("iadd");
        engine.repeat(5, None).expect("repeat");
        assert_eq!(engine.stats().iterations_executed, 5);
        assert_eq!(engine.read(&a).expect("read"), vec![5.0, 5.0]);
    }

    #[test]
    fn conditional_repeat_stops_when_condition_is_false() {
        let mut engine = LazyEngine::default();
        let a = engine.zeros(&[4], DType::Float64);
        engine.iadd_scalar(&a, 1.0).expect("iadd");
        let total = engine.sum(&a).expect("sum");
        let cond = engine.compare(CompareOp::Lt, &total, 10.0).expect("lt");
        engine.sync(&cond).expect("sync");
        engine.repeat(100, Some(&cond)).expect("repeat");
        assert_eq!(engine.read(&a).expect("read"), vec![3.0; 4]);
    }

    #[test]
    fn repeat_requires_synced_condition() {
        let mut engine = LazyEngine::default();
        let cond = engine.full(&[], DType::Bool, 1.0);
        let err = engine.repeat(3, Some(&cond)).expect_err("unsynced");
        assert!(err.to_string().contains("synced base"));
    }

    #[test]
    fn slides_advance_each_iteration_and_restore_afterwards() {
        let mut engine = LazyEngine::default();
        let data = engine.arange(6, DType::Float64);
        let out = engine.zeros(&[4], DType::Float64);
        let window = engine
            .view(&data, &[StaticSelector::range(0, 3)])
            .expect("window");
        let cell = engine
            .view(&out, &[StaticSelector::range(0, 1)])
            .expect("cell");
        engine.slide_view(&window, 0, 1).expect("slide window");
        engine.slide_view(&cell, 0, 1).expect("slide cell");
        let total = engine.sum(&window).expect("sum");
        engine.assign(&cell, &total).expect("assign");

        engine.repeat(4, None).expect("repeat");
        assert_eq!(engine.read(&out).expect("read"), vec![3.0, 6.0, 9.0, 12.0]);
        assert_eq!(engine.layout(&window).expect("layout").offset, 0);
    }

    #[test]
    fn sliding_past_the_base_is_an_error() {
        let mut engine = LazyEngine::default();
        let data = engine.arange(3, DType::Float64);
        let window = engine
            .view(&data, &[StaticSelector::range(0, 2)])
            .expect("window");
        engine.slide_view(&window, 0, 1).expect("slide");
        engine.iadd_scalar(&window, 1.0).expect("iadd");
        let err = engine.repeat(5, None).expect_err("overflow");
        assert!(format!("{err:#}").contains("outside its base"));
    }

    #[test]
    fn queue_limit_forces_a_flush() {
        let mut engine = LazyEngine::new(&EngineConfig { max_pending_ops: 2 });
        let a = engine.zeros(&[1], DType::Float64);
        engine.iadd_scalar(&a, 1.0).expect("iadd");
        engine.iadd_scalar(&a, 1.0).expect("iadd");
        assert_eq!(engine.op_count(), 0);
        engine.iadd_scalar(&a, 1.0).expect("iadd");
        assert_eq!(engine.op_count(), 1);
        assert_eq!(engine.stats().pending_ops, 0);
    }

    #[test]
    fn foreign_arrays_are_not_engine_arrays() {
        let mut ours = LazyEngine::default();
        let mut theirs = LazyEngine::default();
        let foreign = theirs.zeros(&[1], DType::Bool);
        assert!(!ours.is_engine_array(&foreign));
        assert!(ours.iadd_scalar(&foreign, 1.0).is_err());
    }

    #[test]
    fn base_arrays_cannot_slide() {
        let mut engine = LazyEngine::default();
        let a = engine.zeros(&[4], DType::Float64);
        assert!(engine.slide_view(&a, 0, 1).is_err());
        let view = engine.view(&a, &[]).expect("view");
        assert!(!engine.is_base(&view));
        assert!(engine.slide_view(&view, 1, 1).is_err());
    }

    #[test]
    fn shape_mismatch_is_rejected_at_record_time() {
        let mut engine = LazyEngine::default();
        let a = engine.zeros(&[2], DType::Float64);
        let b = engine.zeros(&[3], DType::Float64);
        assert!(engine.binary(BinaryOp::Add, &a, &b).is_err());
        assert_eq!(engine.stats().pending_ops, 0);
    }

    #[test]
    fn handles_stay_valid_for_the_engine_lifetime() {
        let mut engine = LazyEngine::default();
        let a = engine.full(&[2], DType::Float64, 1.0);
        let total = engine.sum(&a).expect("sum");
        let head = engine.view(&a, &[StaticSelector::range(0, 1)]).expect("view");
        engine.flush().expect("flush");
        for _ in 0..3 {
            engine.sum(&a).expect("temporary");
        }
        engine.flush().expect("flush");

        assert_eq!(engine.read(&total).expect("total"), vec![2.0]);
        assert_eq!(engine.read(&head).expect("head"), vec![1.0]);
    }
}
