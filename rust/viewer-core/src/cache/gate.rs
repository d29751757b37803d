use anyhow::Result;

use crate::{
    cache::{CacheEntry, ResponseCache},
    data::{JobIdentity, JobVersion},
};

/// The result of reading the cache through the version gate.
#[derive(Debug, Clone, PartialEq)]
pub enum CacheLookup {
    /// The entry was produced by the current runner version and may be
    /// reused as is, whether it records a success or a failure
    Fresh(CacheEntry),
    /// An entry exists but was produced by another runner version; it must
    /// be recomputed before it is served
    Stale(CacheEntry),
    /// Nothing is cached for this identity
    Missing,
}

impl CacheLookup {
    /// The reusable entry, if any
    pub fn fresh(self) -> Option<CacheEntry> {
        match self {
            CacheLookup::Fresh(entry) => Some(entry),
            _ => None,
        }
    }

    /// True when a recomputation is needed
    pub fn needs_compute(&self) -> bool {
        !matches!(self, CacheLookup::Fresh(_))
    }
}

/// Read the entry for `identity` and classify it against the runner's
/// `current_version`.
pub async fn lookup<C: ResponseCache>(
    cache: &C,
    identity: &JobIdentity,
    current_version: &JobVersion,
) -> Result<CacheLookup> {
    Ok(match cache.get(identity).await? {
        Some(entry) if entry.is_fresh(current_version) => CacheLookup::Fresh(entry),
        Some(entry) => {
            debug!(
                "Cached entry for {} is stale (version {} != {})",
                identity, entry.job_version, current_version
            );
            CacheLookup::Stale(entry)
        }
        None => CacheLookup::Missing,
    })
}
