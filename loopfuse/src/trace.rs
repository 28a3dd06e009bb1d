//! One-shot trace of a loop body.
//!
//! The body runs exactly once against a freshly drained engine. If the
//! engine's op count moved while it ran, the body forced an out-of-band
//! materialization and cannot be replayed as one deferred program.
//!
//! The counter diff is an approximation: it cannot tell a body that is too
//! large to fuse from one that performs a single synchronous read. Both are
//! rejected the same way.

use anyhow::Context;
use tracing::{debug, warn};

use crate::engine::Engine;
use crate::error::LoopError;

/// Op count observed right before a body runs.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct OpCountSnapshot {
    before: u64,
}

impl OpCountSnapshot {
    pub fn take<E: Engine>(engine: &E) -> Self {
        Self {
            before: engine.op_count(),
        }
    }

    pub fn before(&self) -> u64 {
        self.before
    }

    /// Fail with `UnsupportedLoopBody` if the op count changed since the snapshot.
    pub fn verify<E: Engine>(&self, engine: &E) -> Result<(), LoopError> {
        let after = engine.op_count();
        if after != self.before {
            warn!(
                before = self.before,
                after, "loop body forced a materialization during trace"
            );
            return Err(LoopError::UnsupportedLoopBody {
                before: self.before,
                after,
            });
        }
        Ok(())
    }
}

/// Drain the engine, run `body` once and check it stayed deferred.
pub fn trace_body<E, T, F>(engine: &mut E, body: F) -> Result<T, LoopError>
where
    E: Engine,
    F: FnOnce(&mut E) -> anyhow::Result<T>,
{
    engine
        .flush()
        .context("drain pending operations before trace")?;
    let snapshot = OpCountSnapshot::take(&*engine);
    debug!(op_count = snapshot.before(), "tracing loop body");
    let output = body(engine)?;
    snapshot.verify(&*engine)?;
    Ok(output)
}
