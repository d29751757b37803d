//! Contains a generic worker queue in service of the
//! dataset viewer job processing.

mod orchestrator;
mod processor;
mod queue;
mod worker;

pub use processor::*;
pub use queue::*;
