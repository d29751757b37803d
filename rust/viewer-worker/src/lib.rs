//! The worker side of the dataset viewer: concrete [viewer_core::job::JobRunner]s,
//! the [JobExecutor] that runs a job through the version gate and persists
//! its outcome, and a generic [worker_queue::WorkerQueue] that drives the
//! executor on a pool of tokio tasks.
#![warn(missing_docs)]

#[macro_use]
extern crate tracing;

mod executor;
mod processor;

pub mod inspector;
pub mod runners;
pub mod worker_queue;

pub use executor::*;
pub use processor::*;
pub use worker_queue::WorkerSettings;
