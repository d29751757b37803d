//! The public HTTP API of the dataset viewer. Requests are validated against
//! the [endpoint::EndpointStepMapping], authorized by the
//! [authority::AccessGate], and answered from the response cache; misses are
//! handed to the workers as jobs.

#[macro_use]
extern crate tracing;

pub mod authority;
pub mod endpoint;
pub mod extractors;
pub mod handlers;

mod cli;
mod config;
mod error;
mod gateway;

pub use cli::*;
pub use config::*;
pub use error::*;
pub use gateway::*;
