// src/exec/mod.rs

//! Process execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the
//!   `ShellBackend` used in production, which tests can replace.
//! - [`fifo`] creates named pipes for streaming outputs.

pub mod backend;
pub mod fifo;

pub use backend::{CommandOutput, CommandRequest, ExecutorBackend, ShellBackend};
pub use fifo::make_fifo;
