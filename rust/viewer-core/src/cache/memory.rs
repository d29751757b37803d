use anyhow::Result;
use async_trait::async_trait;
use std::{collections::HashMap, sync::Arc};
use tokio::sync::Mutex;

use crate::{
    cache::{CacheEntry, ResponseCache},
    data::JobIdentity,
};

/// A [ResponseCache] held in process memory. Clones share the same entries.
#[derive(Clone, Default, Debug)]
pub struct MemoryCache {
    entries: Arc<Mutex<HashMap<JobIdentity, CacheEntry>>>,
}

impl MemoryCache {
    /// The number of live entries
    pub async fn len(&self) -> usize {
        self.entries.lock().await.len()
    }

    /// True when no entry is stored
    pub async fn is_empty(&self) -> bool {
        self.entries.lock().await.is_empty()
    }

    /// A snapshot of every live entry
    pub async fn entries(&self) -> Vec<CacheEntry> {
        self.entries.lock().await.values().cloned().collect()
    }
}

#[async_trait]
impl ResponseCache for MemoryCache {
    async fn get(&self, identity: &JobIdentity) -> Result<Option<CacheEntry>> {
        let entries = self.entries.lock().await;
        Ok(entries.get(identity).cloned())
    }

    async fn upsert(&self, entry: CacheEntry) -> Result<Option<CacheEntry>> {
        let mut entries = self.entries.lock().await;
        Ok(entries.insert(entry.identity.clone(), entry))
    }

    async fn delete(&self, identity: &JobIdentity) -> Result<Option<CacheEntry>> {
        let mut entries = self.entries.lock().await;
        Ok(entries.remove(identity))
    }
}
