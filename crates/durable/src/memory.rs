//! In-process durable store.
//!
//! Only meaningful when every node shares one process (tests, local
//! development); it honours per-key TTLs like Redis does.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use moka::future::Cache;
use moka::ops::compute::Op;
use moka::Expiry;
use session_core::Result;

use crate::store::DurableStore;

/// Maximum number of stored sessions.
const MEMORY_STORE_MAX_CAPACITY: u64 = 1_000_000;

#[derive(Clone)]
struct Entry {
    value: String,
    ttl: Duration,
}

/// Expires each entry after the TTL it was written with.
struct EntryExpiry;

impl Expiry<String, Entry> for EntryExpiry {
    fn expire_after_create(&self, _key: &String, entry: &Entry, _created_at: Instant) -> Option<Duration> {
        Some(entry.ttl)
    }

    fn expire_after_update(
        &self,
        _key: &String,
        entry: &Entry,
        _updated_at: Instant,
        _duration_until_expiry: Option<Duration>,
    ) -> Option<Duration> {
        Some(entry.ttl)
    }
}

/// In-memory durable store.
#[derive(Clone)]
pub struct MemoryStore {
    entries: Cache<String, Entry>,
}

impl MemoryStore {
    pub fn new() -> Self {
        Self {
            entries: Cache::builder()
                .max_capacity(MEMORY_STORE_MAX_CAPACITY)
                .expire_after(EntryExpiry)
                .build(),
        }
    }

    /// Whether `key` is currently stored.
    pub async fn contains(&self, key: &str) -> bool {
        self.entries.get(key).await.is_some()
    }
}

impl Default for MemoryStore {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DurableStore for MemoryStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        Ok(self.entries.get(key).await.map(|entry| entry.value))
    }

    async fn setex(&self, key: &str, ttl: Duration, value: &str) -> Result<()> {
        let entry = Entry {
            value: value.to_string(),
            ttl,
        };
        self.entries.insert(key.to_string(), entry).await;
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.entries.invalidate(key).await;
        Ok(())
    }

    async fn expire(&self, key: &str, ttl: Duration) -> Result<()> {
        // Compute runs under the entry lock, so a concurrent `del` is never undone.
        self.entries
            .entry_by_ref(key)
            .and_compute_with(|current| {
                let op = match current {
                    Some(entry) => {
                        let mut entry = entry.into_value();
                        entry.ttl = ttl;
                        Op::Put(entry)
                    }
                    None => Op::Nop,
                };
                std::future::ready(op)
            })
            .await;
        Ok(())
    }

    fn backend(&self) -> &'static str {
        "memory"
    }
}
