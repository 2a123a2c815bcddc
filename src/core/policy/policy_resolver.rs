// Policy resolution - merges stored overrides onto defaults, with caching.
//
// This service handles:
// - Resolving the effective Policy for a guild (cache -> store -> defaults)
// - Writing individual setting overrides with synchronous cache invalidation
// - The append-only settings change history (7 day retention)
//
// NO platform dependencies here - storage is reached through ports.

use super::policy_models::{ChangeHistoryEntry, OverrideRow, Policy};
use async_trait::async_trait;
use chrono::{Duration, Utc};
use serde_json::Value;
use thiserror::Error;

/// Resolved policies are cached this long before a re-merge.
pub const POLICY_CACHE_TTL_SECS: u64 = 1800;

/// Change-history entries live this long, both as cache TTL and as the
/// pruning horizon applied on every append.
pub const HISTORY_RETENTION_DAYS: i64 = 7;

// ============================================================================
// ERRORS
// ============================================================================

#[derive(Debug, Error)]
pub enum PolicyError {
    #[error("Storage error: {0}")]
    StorageError(String),

    #[error("Cache error: {0}")]
    CacheError(String),
}

// ============================================================================
// STORAGE TRAITS (PORTS)
// ============================================================================

/// Durable per-guild setting overrides.
///
/// Following the same pattern as the actor-state store in moderation.
#[async_trait]
pub trait OverrideStore: Send + Sync {
    /// All override rows for a guild.
    async fn get_overrides(&self, guild_id: u64) -> Result<Vec<OverrideRow>, PolicyError>;

    /// Insert or replace one `"category.field"` override.
    async fn upsert_override(
        &self,
        guild_id: u64,
        setting_key: &str,
        value_json: &str,
    ) -> Result<(), PolicyError>;

    /// Remove every override for a guild.
    async fn delete_by_guild(&self, guild_id: u64) -> Result<(), PolicyError>;

    /// Remove every override whose key starts with `category_prefix`.
    async fn delete_by_prefix(
        &self,
        guild_id: u64,
        category_prefix: &str,
    ) -> Result<(), PolicyError>;
}

/// Expiring string cache. Holds resolved-policy snapshots under
/// `policy:<guild>` and the change-history JSON array under `history:<guild>`.
#[async_trait]
pub trait CacheStore: Send + Sync {
    async fn get(&self, key: &str) -> Result<Option<String>, PolicyError>;
    async fn set(&self, key: &str, value: &str, ttl_seconds: u64) -> Result<(), PolicyError>;
    async fn del(&self, key: &str) -> Result<(), PolicyError>;
}

// ============================================================================
// CORE SERVICE
// ============================================================================

/// Resolves and mutates per-guild moderation settings.
pub struct PolicyResolver<O: OverrideStore, C: CacheStore> {
    overrides: O,
    cache: C,
}

fn policy_key(guild_id: u64) -> String {
    format!("policy:{}", guild_id)
}

fn history_key(guild_id: u64) -> String {
    format!("history:{}", guild_id)
}

impl<O: OverrideStore, C: CacheStore> PolicyResolver<O, C> {
    pub fn new(overrides: O, cache: C) -> Self {
        Self { overrides, cache }
    }

    /// The effective policy for a guild.
    ///
    /// Never fails: an unreachable override store degrades to the compiled-in
    /// defaults so moderation keeps running rather than failing open or
    /// closed arbitrarily.
    pub async fn get_guild_settings(&self, guild_id: u64) -> Policy {
        let key = policy_key(guild_id);

        match self.cache.get(&key).await {
            Ok(Some(raw)) => match serde_json::from_str::<Policy>(&raw) {
                Ok(policy) => return policy,
                Err(e) => {
                    tracing::debug!(guild_id, "Discarding unreadable cached policy: {}", e);
                }
            },
            Ok(None) => {}
            Err(e) => {
                tracing::warn!(guild_id, "Policy cache read failed: {}", e);
            }
        }

        let rows = match self.overrides.get_overrides(guild_id).await {
            Ok(rows) => rows,
            Err(e) => {
                tracing::warn!(
                    guild_id,
                    "Override store unavailable, using default policy: {}",
                    e
                );
                return Policy::default();
            }
        };

        let policy = Policy::from_overrides(&rows);

        match serde_json::to_string(&policy) {
            Ok(raw) => {
                if let Err(e) = self.cache.set(&key, &raw, POLICY_CACHE_TTL_SECS).await {
                    tracing::warn!(guild_id, "Failed to cache resolved policy: {}", e);
                }
            }
            Err(e) => tracing::warn!(guild_id, "Failed to serialize policy for cache: {}", e),
        }

        policy
    }

    /// Write one setting override. Invalidates the cached policy before
    /// returning, so a subsequent read observes the new value, and appends a
    /// change-history entry (best effort).
    pub async fn update_setting(
        &self,
        guild_id: u64,
        setting_key: &str,
        value: &Value,
    ) -> Result<(), PolicyError> {
        let old_value = self.get_guild_settings(guild_id).await.setting_value(setting_key);

        self.overrides
            .upsert_override(guild_id, setting_key, &value.to_string())
            .await?;

        self.append_history(guild_id, setting_key, old_value, value.clone())
            .await;
        self.invalidate(guild_id).await;

        Ok(())
    }

    /// Drop every override for a guild, reverting it to defaults.
    pub async fn reset_guild(&self, guild_id: u64) -> Result<(), PolicyError> {
        self.overrides.delete_by_guild(guild_id).await?;
        self.invalidate(guild_id).await;
        Ok(())
    }

    /// Drop all overrides under one category prefix (e.g. "moderation").
    pub async fn reset_category(&self, guild_id: u64, category: &str) -> Result<(), PolicyError> {
        self.overrides.delete_by_prefix(guild_id, category).await?;
        self.invalidate(guild_id).await;
        Ok(())
    }

    /// The retained settings change history, newest entries last.
    /// A missing or malformed array reads as empty.
    pub async fn change_history(&self, guild_id: u64) -> Vec<ChangeHistoryEntry> {
        match self.cache.get(&history_key(guild_id)).await {
            Ok(Some(raw)) => serde_json::from_str(&raw).unwrap_or_default(),
            Ok(None) => Vec::new(),
            Err(e) => {
                tracing::warn!(guild_id, "Change history read failed: {}", e);
                Vec::new()
            }
        }
    }

    async fn invalidate(&self, guild_id: u64) {
        if let Err(e) = self.cache.del(&policy_key(guild_id)).await {
            tracing::warn!(guild_id, "Failed to invalidate cached policy: {}", e);
        }
    }

    /// Append one history entry, pruning anything older than the retention
    /// horizon, and rewrite the array in full. Failures only cost audit data,
    /// never the settings write itself.
    async fn append_history(&self, guild_id: u64, key: &str, old_value: Value, new_value: Value) {
        let now = Utc::now();
        let mut entries = self.change_history(guild_id).await;

        let horizon = now - Duration::days(HISTORY_RETENTION_DAYS);
        entries.retain(|e| e.date > horizon);
        entries.push(ChangeHistoryEntry {
            date: now,
            actor: "system".to_string(),
            key: key.to_string(),
            old_value,
            new_value,
        });

        match serde_json::to_string(&entries) {
            Ok(raw) => {
                let ttl = (HISTORY_RETENTION_DAYS * 86_400) as u64;
                if let Err(e) = self.cache.set(&history_key(guild_id), &raw, ttl).await {
                    tracing::warn!(guild_id, "Failed to write change history: {}", e);
                }
            }
            Err(e) => tracing::warn!(guild_id, "Failed to serialize change history: {}", e),
        }
    }
}

// ============================================================================
// TESTS
// ============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use dashmap::DashMap;
    use serde_json::json;
    use std::sync::atomic::{AtomicUsize, Ordering};

    /// In-memory override store for testing
    #[derive(Default)]
    struct MockOverrideStore {
        rows: DashMap<(u64, String), String>,
        reads: AtomicUsize,
        fail_reads: bool,
    }

    #[async_trait]
    impl OverrideStore for MockOverrideStore {
        async fn get_overrides(&self, guild_id: u64) -> Result<Vec<OverrideRow>, PolicyError> {
            self.reads.fetch_add(1, Ordering::SeqCst);
            if self.fail_reads {
                return Err(PolicyError::StorageError("connection refused".into()));
            }
            Ok(self
                .rows
                .iter()
                .filter(|e| e.key().0 == guild_id)
                .map(|e| OverrideRow {
                    setting_key: e.key().1.clone(),
                    value_json: e.value().clone(),
                })
                .collect())
        }

        async fn upsert_override(
            &self,
            guild_id: u64,
            setting_key: &str,
            value_json: &str,
        ) -> Result<(), PolicyError> {
            self.rows
                .insert((guild_id, setting_key.to_string()), value_json.to_string());
            Ok(())
        }

        async fn delete_by_guild(&self, guild_id: u64) -> Result<(), PolicyError> {
            self.rows.retain(|k, _| k.0 != guild_id);
            Ok(())
        }

        async fn delete_by_prefix(
            &self,
            guild_id: u64,
            category_prefix: &str,
        ) -> Result<(), PolicyError> {
            let prefix = format!("{}.", category_prefix);
            self.rows
                .retain(|k, _| !(k.0 == guild_id && k.1.starts_with(&prefix)));
            Ok(())
        }
    }

    /// In-memory cache for testing. TTLs are ignored; nothing here lives
    /// long enough to expire.
    #[derive(Default)]
    struct MockCache {
        entries: DashMap<String, String>,
    }

    #[async_trait]
    impl CacheStore for MockCache {
        async fn get(&self, key: &str) -> Result<Option<String>, PolicyError> {
            Ok(self.entries.get(key).map(|v| v.clone()))
        }

        async fn set(&self, key: &str, value: &str, _ttl: u64) -> Result<(), PolicyError> {
            self.entries.insert(key.to_string(), value.to_string());
            Ok(())
        }

        async fn del(&self, key: &str) -> Result<(), PolicyError> {
            self.entries.remove(key);
            Ok(())
        }
    }

    fn resolver() -> PolicyResolver<MockOverrideStore, MockCache> {
        PolicyResolver::new(MockOverrideStore::default(), MockCache::default())
    }

    #[tokio::test]
    async fn resolves_defaults_for_unknown_guild() {
        let resolver = resolver();
        let policy = resolver.get_guild_settings(1).await;
        assert_eq!(policy, Policy::default());
    }

    #[tokio::test]
    async fn second_read_is_served_from_cache() {
        let resolver = resolver();

        resolver.get_guild_settings(1).await;
        resolver.get_guild_settings(1).await;

        assert_eq!(resolver.overrides.reads.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn update_invalidates_before_next_read() {
        let resolver = resolver();

        // Prime the cache with the default (enabled) policy.
        assert!(resolver.get_guild_settings(7).await.enabled);

        resolver
            .update_setting(7, "moderation.enabled", &json!(false))
            .await
            .unwrap();

        // The very next read must observe the write, never a stale `true`.
        assert!(!resolver.get_guild_settings(7).await.enabled);
    }

    #[tokio::test]
    async fn store_outage_falls_back_to_defaults() {
        let store = MockOverrideStore {
            fail_reads: true,
            ..Default::default()
        };
        let resolver = PolicyResolver::new(store, MockCache::default());

        let policy = resolver.get_guild_settings(3).await;
        assert_eq!(policy, Policy::default());
    }

    #[tokio::test]
    async fn reset_category_reverts_typed_fields() {
        let resolver = resolver();

        resolver
            .update_setting(5, "moderation.spam_protection", &json!(false))
            .await
            .unwrap();
        assert!(!resolver.get_guild_settings(5).await.spam_protection);

        resolver.reset_category(5, "moderation").await.unwrap();
        assert!(resolver.get_guild_settings(5).await.spam_protection);
    }

    #[tokio::test]
    async fn history_records_old_and_new_values() {
        let resolver = resolver();

        resolver
            .update_setting(9, "moderation.enabled", &json!(false))
            .await
            .unwrap();
        resolver
            .update_setting(9, "moderation.enabled", &json!(true))
            .await
            .unwrap();

        let history = resolver.change_history(9).await;
        assert_eq!(history.len(), 2);
        assert_eq!(history[0].actor, "system");
        assert_eq!(history[0].old_value, json!(true));
        assert_eq!(history[0].new_value, json!(false));
        assert_eq!(history[1].old_value, json!(false));
        assert_eq!(history[1].new_value, json!(true));
    }

    #[tokio::test]
    async fn history_prunes_entries_past_retention() {
        let resolver = resolver();

        // Seed the history array with one ancient entry directly.
        let stale = vec![ChangeHistoryEntry {
            date: Utc::now() - Duration::days(HISTORY_RETENTION_DAYS + 1),
            actor: "system".into(),
            key: "moderation.enabled".into(),
            old_value: json!(true),
            new_value: json!(false),
        }];
        resolver
            .cache
            .set(&history_key(2), &serde_json::to_string(&stale).unwrap(), 60)
            .await
            .unwrap();

        resolver
            .update_setting(2, "moderation.profanity_filter", &json!(false))
            .await
            .unwrap();

        let history = resolver.change_history(2).await;
        assert_eq!(history.len(), 1);
        assert_eq!(history[0].key, "moderation.profanity_filter");
    }

    #[tokio::test]
    async fn malformed_history_reads_as_empty() {
        let resolver = resolver();
        resolver
            .cache
            .set(&history_key(4), "not an array", 60)
            .await
            .unwrap();

        assert!(resolver.change_history(4).await.is_empty());
    }
}
