//! Core data types and contracts of the dataset viewer: the error envelope
//! returned to callers, the identity of jobs and the items they discover, the
//! [job::JobRunner] contract, and the version-gated response cache.
#![warn(missing_docs)]

#[macro_use]
extern crate tracing as extern_tracing;

pub mod cache;
pub mod data;
pub mod error;
pub mod job;
pub mod tracing;
