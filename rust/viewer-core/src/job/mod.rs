//! The job execution contract. Every kind of computation implements
//! [JobRunner]; runners are collected in a [JobRunnerRegistry] at process
//! start, and work is handed to whatever drives them through a [JobClient].

mod client;
mod registry;
mod runner;

pub use client::*;
pub use registry::*;
pub use runner::*;
