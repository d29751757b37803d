//! Request extractors: the [crate::authority::Credentials] a client presents,
//! and the [QueryParams] of dataset endpoints.

mod credentials;
mod params;

pub use params::*;
