//! Stable exit codes for loopfuse CLI commands.

/// Command succeeded.
pub const OK: i32 = 0;
/// Command failed due to invalid arguments, config, or engine errors.
pub const INVALID: i32 = 1;
/// The loop body forced a materialization while it was traced.
pub const UNSUPPORTED: i32 = 2;
/// The loop body returned a value that is not a valid loop condition.
pub const BAD_CONDITION: i32 = 3;
