// In-memory implementation of the CacheStore port.
//
// Holds resolved-policy snapshots and change-history arrays with per-entry
// TTLs. Expiry happens on read; a dedicated cache server (the original used
// one) slots in behind the same trait.

use crate::core::policy::{CacheStore, PolicyError};
use async_trait::async_trait;
use chrono::{DateTime, Duration, Utc};
use dashmap::DashMap;

#[derive(Clone)]
struct CacheEntry {
    value: String,
    expires_at: DateTime<Utc>,
}

/// Process-local TTL cache over a concurrent map.
#[derive(Default)]
pub struct InMemoryCacheStore {
    entries: DashMap<String, CacheEntry>,
}

impl InMemoryCacheStore {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl CacheStore for InMemoryCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>, PolicyError> {
        if let Some(entry) = self.entries.get(key) {
            if Utc::now() < entry.expires_at {
                return Ok(Some(entry.value.clone()));
            }
            drop(entry);
            self.entries.remove(key);
        }
        Ok(None)
    }

    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), PolicyError> {
        self.entries.insert(
            key.to_string(),
            CacheEntry {
                value: value.to_string(),
                expires_at: Utc::now() + Duration::seconds(ttl_seconds as i64),
            },
        );
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<(), PolicyError> {
        self.entries.remove(key);
        Ok(())
    }
}
