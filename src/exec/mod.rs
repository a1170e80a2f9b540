// src/exec/mod.rs

//! Execution layer.
//!
//! - [`backend`] provides the `ExecutorBackend` trait and the production
//!   `RealExecutorBackend`, which tests can replace with a fake.
//! - [`executor_loop`] receives scheduled tasks and spawns their bodies.
//! - [`task_runner`] runs a single task body and reports its outcome.
//! - [`process`] supervises long-running child processes such as the dev
//!   server.

pub mod backend;
pub mod executor_loop;
pub mod process;
pub mod task_runner;

pub use backend::{ExecutorBackend, RealExecutorBackend};
pub use executor_loop::spawn_executor;
pub use process::{ProcessSpec, ProcessSupervisor};
