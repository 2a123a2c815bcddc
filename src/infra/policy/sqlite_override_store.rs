// SQLite-backed override store for durable per-guild settings.
//
// Tables:
// - guild_settings: One row per (guild, setting_key) override

use crate::core::policy::{OverrideRow, OverrideStore, PolicyError};
use async_trait::async_trait;
use sqlx::{Pool, Row, Sqlite};

pub struct SqliteOverrideStore {
    pool: Pool<Sqlite>,
}

impl SqliteOverrideStore {
    /// Open (or create) the database at `path` and run migrations.
    pub async fn new(path: &str) -> anyhow::Result<Self> {
        let pool = sqlx::sqlite::SqlitePoolOptions::new()
            .connect(&format!("sqlite://{}?mode=rwc", path))
            .await?;
        let store = Self { pool };
        store.migrate().await?;
        Ok(store)
    }

    /// Wrap an existing pool (used by tests with `sqlite::memory:`).
    pub fn with_pool(pool: Pool<Sqlite>) -> Self {
        Self { pool }
    }

    /// Run database migrations to create required tables.
    pub async fn migrate(&self) -> Result<(), PolicyError> {
        sqlx::query(
            r#"
            CREATE TABLE IF NOT EXISTS guild_settings (
                guild_id INTEGER NOT NULL,
                setting_key TEXT NOT NULL,
                value_json TEXT NOT NULL,
                PRIMARY KEY (guild_id, setting_key)
            );
            "#,
        )
        .execute(&self.pool)
        .await
        .map_err(|e| PolicyError::StorageError(e.to_string()))?;

        Ok(())
    }
}

#[async_trait]
impl OverrideStore for SqliteOverrideStore {
    async fn get_overrides(&self, guild_id: u64) -> Result<Vec<OverrideRow>, PolicyError> {
        let rows = sqlx::query(
            r#"
            SELECT setting_key, value_json
            FROM guild_settings
            WHERE guild_id = ?
            ORDER BY setting_key
            "#,
        )
        .bind(guild_id as i64)
        .fetch_all(&self.pool)
        .await
        .map_err(|e| PolicyError::StorageError(e.to_string()))?;

        Ok(rows
            .into_iter()
            .map(|row| OverrideRow {
                setting_key: row.get("setting_key"),
                value_json: row.get("value_json"),
            })
            .collect())
    }

    async fn upsert_override(
        &self,
        guild_id: u64,
        setting_key: &str,
        value_json: &str,
    ) -> Result<(), PolicyError> {
        sqlx::query(
            r#"
            INSERT INTO guild_settings (guild_id, setting_key, value_json)
            VALUES (?, ?, ?)
            ON CONFLICT(guild_id, setting_key) DO UPDATE SET
                value_json = excluded.value_json
            "#,
        )
        .bind(guild_id as i64)
        .bind(setting_key)
        .bind(value_json)
        .execute(&self.pool)
        .await
        .map_err(|e| PolicyError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_guild(&self, guild_id: u64) -> Result<(), PolicyError> {
        sqlx::query("DELETE FROM guild_settings WHERE guild_id = ?")
            .bind(guild_id as i64)
            .execute(&self.pool)
            .await
            .map_err(|e| PolicyError::StorageError(e.to_string()))?;
        Ok(())
    }

    async fn delete_by_prefix(
        &self,
        guild_id: u64,
        category_prefix: &str,
    ) -> Result<(), PolicyError> {
        sqlx::query("DELETE FROM guild_settings WHERE guild_id = ? AND setting_key LIKE ?")
            .bind(guild_id as i64)
            .bind(format!("{}.%", category_prefix))
            .execute(&self.pool)
            .await
            .map_err(|e| PolicyError::StorageError(e.to_string()))?;
        Ok(())
    }
}
