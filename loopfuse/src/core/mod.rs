//! Deterministic, pure logic shared by the loop-fusion layer.
//!
//! Core modules must be free of engine side effects. They operate on plain
//! values (dtypes, index expressions, strided layouts) and are fully testable
//! in isolation.

pub mod iterator;
pub mod layout;
pub mod types;
