//! Durable store contract.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use session_core::{Error, Result};

/// Key/value store used for failover.
///
/// Writes are idempotent by key: `setex` overwrites wholesale and `del`
/// deletes if present, so duplicated or reordered failover writes are safe.
/// Implementations bound every call with their own timeout.
#[async_trait]
pub trait DurableStore: Send + Sync {
    /// Reads a value.
    async fn get(&self, key: &str) -> Result<Option<String>>;

    /// Writes a value that expires after `ttl`.
    async fn setex(&self, key: &str, ttl: Duration, value: &str) -> Result<()>;

    /// Deletes a value if it exists.
    async fn del(&self, key: &str) -> Result<()>;

    /// Pushes back the expiry of an existing value.
    async fn expire(&self, key: &str, ttl: Duration) -> Result<()>;

    /// Backend name for logs.
    fn backend(&self) -> &'static str;
}

/// Shared handle to a durable store.
pub type SharedDurableStore = Arc<dyn DurableStore>;

/// Builds a store from a configured URL.
///
/// `memory://` selects the in-process store, which only makes sense for a
/// single process hosting every node; anything else is handed to Redis.
pub fn connect(url: &str, timeout: Duration) -> Result<SharedDurableStore> {
    if url.is_empty() {
        return Err(Error::config("durable store url is empty"));
    }
    if url.starts_with("memory://") {
        return Ok(Arc::new(crate::memory::MemoryStore::new()));
    }
    Ok(Arc::new(crate::redis_store::RedisStore::new(url, timeout)?))
}

/// Whole seconds of a TTL, never zero.
pub(crate) fn ttl_secs(ttl: Duration) -> u64 {
    ttl.as_secs().max(1)
}
