//! Built-in loop kernels for `loopfuse run`.
//!
//! Each kernel builds its inputs on a [`LazyEngine`], runs one fused loop and
//! reads the result back.

use anyhow::{Result, ensure};
use serde::Serialize;
use tracing::info;

use crate::core::iterator::{IndexExpr, SliceSpec, get_iterator};
use crate::core::types::DType;
use crate::engine::lazy::{ArrayRef, EngineStats, LazyEngine};
use crate::engine::ops::CompareOp;
use crate::looping::{do_while, for_loop, iterator_loop};
use crate::slide::IterArray;

/// Result printed by `loopfuse run`.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct KernelOutput {
    pub kernel: &'static str,
    pub result: Vec<f64>,
    pub stats: EngineStats,
}

/// `a += 1`, `niters` times, on a zero vector of length `len`.
///
/// With `force_read` the body also reads `a`, which the loop driver rejects.
pub fn increment(
    engine: &mut LazyEngine,
    len: usize,
    niters: i64,
    force_read: bool,
) -> Result<KernelOutput> {
    let a = engine.zeros(&[len], DType::Float64);
    for_loop(engine, niters, |e| {
        e.iadd_scalar(&a, 1.0)?;
        if force_read {
            e.read(&a)?;
        }
        Ok(())
    })?;
    finish(engine, "increment", &a)
}

/// `a += 1` while `sum(a) < limit`, at most `niters` times.
pub fn converge(
    engine: &mut LazyEngine,
    len: usize,
    limit: f64,
    niters: Option<u64>,
) -> Result<KernelOutput> {
    let a = engine.zeros(&[len], DType::Float64);
    do_while(engine, niters, |e| {
        e.iadd_scalar(&a, 1.0)?;
        let total = e.sum(&a)?;
        let keep_going = e.compare(CompareOp::Lt, &total, limit)?;
        Ok(Some(keep_going.into()))
    })?;
    finish(engine, "converge", &a)
}

/// Sliding-window sums of `[0, 1, .., len - 1]` with the given window width.
///
/// The window and the output cell are both derived from one iterator tag, so
/// a single traced body walks the whole input.
pub fn stencil(engine: &mut LazyEngine, len: usize, window: usize) -> Result<KernelOutput> {
    ensure!(
        (1..=len).contains(&window),
        "window must be between 1 and {len}, got {window}"
    );
    let out_len = len - window + 1;
    let input = IterArray::new(engine.arange(len, DType::Float64));
    let output = IterArray::new(engine.zeros(&[out_len], DType::Float64));
    let i = get_iterator(0);

    iterator_loop(engine, out_len as i64, |e| {
        let span = input.index(e, &IndexExpr::Slice(SliceSpec::new(i, i + window as i64)))?;
        let cell = output.index(e, &IndexExpr::Slice(SliceSpec::new(i, i + 1)))?;
        let total = e.sum(&span)?;
        e.assign(&cell, &total)
    })?;
    finish(engine, "stencil", &output)
}

fn finish(engine: &mut LazyEngine, kernel: &'static str, result: &ArrayRef) -> Result<KernelOutput> {
    let result = engine.read(result)?;
    let stats = engine.stats();
    info!(kernel, iterations = stats.iterations_executed, "kernel finished");
    Ok(KernelOutput {
        kernel,
        result,
        stats,
    })
}
