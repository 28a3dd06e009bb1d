//! File-backed configuration for loopfuse commands.

pub mod config;
