//! Identity and value types shared by every part of the viewer.

mod graph;
mod identity;
mod split;
mod strings;

pub use graph::*;
pub use identity::*;
pub use split::*;
pub use strings::*;

/// The opaque content produced by a job, as persisted in the response cache
/// and served to clients.
pub type JobContent = serde_json::Map<String, serde_json::Value>;
