//! The response cache: one [CacheEntry] per [crate::data::JobIdentity], and
//! the version gate that decides whether an entry may be reused.

mod entry;
mod gate;
mod memory;

pub use entry::*;
pub use gate::*;
pub use memory::*;

use crate::data::JobIdentity;
use anyhow::Result;
use async_trait::async_trait;

/// Storage for [CacheEntry]s, keyed by [JobIdentity]. Implementations must
/// replace entries atomically: a reader observes either the previous entry
/// or the new one, never a mix.
#[async_trait]
pub trait ResponseCache: Clone + Send + Sync {
    /// Read the live entry for `identity`
    async fn get(&self, identity: &JobIdentity) -> Result<Option<CacheEntry>>;

    /// Store `entry`, replacing any previous entry for the same identity;
    /// returns the replaced entry
    async fn upsert(&self, entry: CacheEntry) -> Result<Option<CacheEntry>>;

    /// Remove the entry for `identity`, returning it
    async fn delete(&self, identity: &JobIdentity) -> Result<Option<CacheEntry>>;
}
