//! The txr worker: pulls image-generation jobs from the queue, routes
//! them through the workflow dispatcher, and posts results back.
//!
//! One blocking [`runner::JobLoop`] runs per selected device. The
//! binary in `main.rs` wires up configuration, the engine handle,
//! signal handling, and the restart supervisor around them.

pub mod cli;
pub mod config;
pub mod devices;
pub mod restart;
pub mod runner;

pub use config::WorkerConfig;
pub use runner::{JobLoop, JobLoopOptions, WorkerExit};
