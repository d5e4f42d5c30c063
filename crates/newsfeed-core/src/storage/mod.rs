mod cache_repo;
mod database;
mod memory;
pub mod retry;

pub use cache_repo::SqliteCacheStore;
pub use database::Database;
pub use memory::MemoryCacheStore;

use std::sync::Arc;

use crate::config::{AppConfig, CacheBackend};
use crate::Result;

/// Durable key-value storage the fetcher persists results into
///
/// Only strings go in and out; the fetcher owns the encoding.
#[async_trait::async_trait]
pub trait CacheStore: Send + Sync {
    /// Read the value stored under `key`
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Store `value` under `key`, replacing any previous value
    async fn set(&self, key: &str, value: &str) -> Result<()>;
}

/// Open the cache store selected by configuration
pub async fn open_cache_store(config: &AppConfig) -> Result<Arc<dyn CacheStore>> {
    let store: Arc<dyn CacheStore> = match config.cache.backend {
        CacheBackend::Sqlite => {
            let db = Database::open(&config.database_path()).await?;
            Arc::new(SqliteCacheStore::new(db))
        }
        CacheBackend::Memory => {
            tracing::info!("Using in-memory cache; cached results will not survive restarts");
            Arc::new(MemoryCacheStore::new())
        }
    };

    Ok(store)
}
