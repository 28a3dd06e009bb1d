//! Loop fusion over a lazy array engine.
//!
//! An iterative algorithm written as a loop body is traced once and handed to
//! the engine as a single replayable program instead of being dispatched
//! iteration by iteration. The architecture keeps a strict separation:
//!
//! - **[`core`]**: Pure logic (dtypes, iterator tags, index planning, strided
//!   layouts). No engine state, fully testable in isolation.
//! - **[`engine`]**: The [`engine::Engine`] contract plus the in-process
//!   reference backend [`engine::lazy::LazyEngine`].
//!
//! The protocol itself lives in [`looping`] (drivers), [`trace`] (op-count
//! check), [`validate`] (condition contract) and [`slide`] (sliding views and
//! the iterator-tag indexing adapter).

pub mod core;
pub mod engine;
pub mod error;
pub mod exit_codes;
pub mod io;
pub mod kernels;
pub mod logging;
pub mod looping;
pub mod slide;
#[cfg(any(test, feature = "test-support"))]
pub mod test_support;
pub mod trace;
pub mod validate;

pub use crate::core::iterator::{IteratorTag, get_iterator};
pub use crate::core::types::{DType, HostValue, LoopValue};
pub use crate::engine::Engine;
pub use crate::error::LoopError;
pub use crate::looping::{LoopReport, UNBOUNDED_ITERATIONS, do_while, for_loop, iterator_loop};
pub use crate::slide::{IterArray, slide_view};
