//! Loop drivers: trace a body once, then let the engine repeat it.
//!
//! Neither driver iterates on the host. Each one traces the body a single
//! time (see [`trace`](crate::trace)), validates what it produced and issues
//! one `repeat` instruction. Nesting drivers is not supported: the inner
//! trace would look like a forced materialization to the outer one.

use tracing::{debug, info};

use crate::core::types::LoopValue;
use crate::engine::Engine;
use crate::error::LoopError;
use crate::trace::trace_body;
use crate::validate::validate_condition;

/// Iteration bound used when a conditional loop has no maximum.
pub const UNBOUNDED_ITERATIONS: u64 = (i64::MAX - 1) as u64;

/// What a driver asked the engine to do.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LoopReport {
    /// Iteration bound passed to `repeat`.
    pub niters: u64,
    /// True if a condition array was attached to the repeat.
    pub conditional: bool,
}

/// Repeat `body` while it returns a true condition, at most `niters` times.
///
/// The body runs once here, against a drained engine. If it returns nothing
/// the traced program is repeated unconditionally; if it returns a value that
/// value must satisfy the condition contract, is synced, and is re-evaluated
/// by the engine after every iteration. `None` means no maximum.
pub fn do_while<E, F>(engine: &mut E, niters: Option<u64>, body: F) -> Result<LoopReport, LoopError>
where
    E: Engine,
    F: FnOnce(&mut E) -> anyhow::Result<Option<LoopValue<E::Array>>>,
{
    let termination = trace_body(engine, body)?;
    let niters = niters.unwrap_or(UNBOUNDED_ITERATIONS);

    let Some(termination) = termination else {
        debug!(niters, "repeating traced body unconditionally");
        engine.repeat(niters, None)?;
        return Ok(LoopReport {
            niters,
            conditional: false,
        });
    };

    let condition = validate_condition(&*engine, &termination)?;
    engine.sync(condition)?;
    info!(niters, "repeating traced body while condition holds");
    engine.repeat(niters, Some(condition))?;
    Ok(LoopReport {
        niters,
        conditional: true,
    })
}

/// Repeat `body` exactly `niters` times.
///
/// A count below one is a no-op: the engine is not touched and the body is
/// never called, so `None` is returned.
pub fn for_loop<E, F>(engine: &mut E, niters: i64, body: F) -> Result<Option<LoopReport>, LoopError>
where
    E: Engine,
    F: FnOnce(&mut E) -> anyhow::Result<()>,
{
    if niters < 1 {
        debug!(niters, "non-positive iteration count; skipping loop");
        return Ok(None);
    }

    trace_body(engine, body)?;
    let niters = niters.unsigned_abs();
    debug!(niters, "repeating traced body");
    engine.repeat(niters, None)?;
    Ok(Some(LoopReport {
        niters,
        conditional: false,
    }))
}

/// [`for_loop`] under the name used for bodies built on iterator tags.
pub fn iterator_loop<E, F>(
    engine: &mut E,
    niters: i64,
    body: F,
) -> Result<Option<LoopReport>, LoopError>
where
    E: Engine,
    F: FnOnce(&mut E) -> anyhow::Result<()>,
{
    for_loop(engine, niters, body)
}
