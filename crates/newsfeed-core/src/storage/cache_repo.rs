use chrono::Utc;

use super::retry::with_retry;
use super::{CacheStore, Database};
use crate::Result;

/// Key-value cache persisted in the SQLite `cache_entries` table
#[derive(Clone)]
pub struct SqliteCacheStore {
    db: Database,
}

impl SqliteCacheStore {
    pub fn new(db: Database) -> Self {
        Self { db }
    }
}

#[async_trait::async_trait]
impl CacheStore for SqliteCacheStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        let pool = self.db.pool();
        let value = with_retry("cache get", || {
            sqlx::query_scalar::<_, String>("SELECT value FROM cache_entries WHERE key = ?")
                .bind(key)
                .fetch_optional(pool)
        })
        .await?;

        Ok(value)
    }

    async fn set(&self, key: &str, value: &str) -> Result<()> {
        let pool = self.db.pool();
        let now = Utc::now();
        with_retry("cache set", || {
            sqlx::query(
                r#"
                INSERT INTO cache_entries (key, value, updated_at)
                VALUES (?, ?, ?)
                ON CONFLICT(key) DO UPDATE SET value = excluded.value, updated_at = excluded.updated_at
                "#,
            )
            .bind(key)
            .bind(value)
            .bind(now)
            .execute(pool)
        })
        .await?;

        tracing::debug!(key, bytes = value.len(), "Cache entry written");
        Ok(())
    }
}
