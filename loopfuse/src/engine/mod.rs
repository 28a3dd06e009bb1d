//! Engine abstraction consumed by the loop-fusion layer.
//!
//! The [`Engine`] trait is the whole contract this crate needs from a lazy
//! array backend. [`lazy::LazyEngine`] is the in-process reference backend;
//! tests use a recording engine that only logs calls.

pub mod lazy;
pub mod ops;

use std::fmt;

use anyhow::Result;

use crate::core::iterator::StaticSelector;
use crate::core::types::DType;

/// A lazy array backend with a deferred-operation queue.
///
/// Operations issued between two flushes form the program that a
/// [`repeat`](Engine::repeat) call replays.
pub trait Engine {
    /// Handle to an engine-resident array (base or view).
    type Array: Clone + PartialEq + fmt::Debug;

    /// Materialize every pending deferred operation.
    fn flush(&mut self) -> Result<()>;

    /// Number of synchronous materializations performed so far. Never decreases.
    fn op_count(&self) -> u64;

    /// Make `array` (a base array) resident at a stable, readable location.
    fn sync(&mut self, array: &Self::Array) -> Result<()>;

    /// Replay the operations traced since the last flush up to `count` times.
    ///
    /// With a condition, the engine re-evaluates it after every iteration and
    /// stops early once it is false.
    fn repeat(&mut self, count: u64, condition: Option<&Self::Array>) -> Result<()>;

    /// Advance `view` by `stride` along `dim` at every iteration boundary of
    /// the repeat currently being traced.
    fn slide_view(&mut self, view: &Self::Array, dim: usize, stride: i64) -> Result<()>;

    /// True if `array` is a live handle owned by this engine.
    fn is_engine_array(&self, array: &Self::Array) -> bool;

    /// True if `array` owns its storage rather than aliasing another array.
    fn is_base(&self, array: &Self::Array) -> bool;

    fn dtype(&self, array: &Self::Array) -> Result<DType>;

    fn shape(&self, array: &Self::Array) -> Result<Vec<usize>>;

    /// Static indexing: a new view of `array` selected by `selectors`.
    fn view(&mut self, array: &Self::Array, selectors: &[StaticSelector]) -> Result<Self::Array>;
}
