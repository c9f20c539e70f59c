//! Mock implementations for testing.

use std::collections::HashMap;
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use durable_store::DurableStore;
use parking_lot::Mutex;
use session_core::{Error, Result};

/// A durable store operation, as recorded by [`MockDurableStore`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum DurableCall {
    Get(String),
    Setex(String),
    Del(String),
    Expire(String),
}

/// Mock durable store that keeps values in memory.
///
/// Implements the same `DurableStore` trait as Redis so tests can check
/// exactly which keys the session servers wrote, and can make every call
/// fail to simulate an outage.
#[derive(Clone, Default)]
pub struct MockDurableStore {
    values: Arc<Mutex<HashMap<String, String>>>,
    calls: Arc<Mutex<Vec<DurableCall>>>,
    should_fail: Arc<Mutex<bool>>,
}

impl MockDurableStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Set failure mode for testing error handling.
    pub fn set_should_fail(&self, fail: bool) {
        *self.should_fail.lock() = fail;
    }

    pub fn contains(&self, key: &str) -> bool {
        self.values.lock().contains_key(key)
    }

    pub fn value(&self, key: &str) -> Option<String> {
        self.values.lock().get(key).cloned()
    }

    /// Seeds a value without recording a call.
    pub fn insert(&self, key: &str, value: &str) {
        self.values.lock().insert(key.to_string(), value.to_string());
    }

    pub fn len(&self) -> usize {
        self.values.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.values.lock().is_empty()
    }

    /// All calls made so far, in order.
    pub fn calls(&self) -> Vec<DurableCall> {
        self.calls.lock().clone()
    }

    pub fn clear_calls(&self) {
        self.calls.lock().clear();
    }

    fn record(&self, call: DurableCall) -> Result<()> {
        self.calls.lock().push(call);
        if *self.should_fail.lock() {
            return Err(Error::durable("mock durable store failure"));
        }
        Ok(())
    }
}

#[async_trait]
impl DurableStore for MockDurableStore {
    async fn get(&self, key: &str) -> Result<Option<String>> {
        self.record(DurableCall::Get(key.to_string()))?;
        Ok(self.values.lock().get(key).cloned())
    }

    async fn setex(&self, key: &str, _ttl: Duration, value: &str) -> Result<()> {
        self.record(DurableCall::Setex(key.to_string()))?;
        self.values.lock().insert(key.to_string(), value.to_string());
        Ok(())
    }

    async fn del(&self, key: &str) -> Result<()> {
        self.record(DurableCall::Del(key.to_string()))?;
        self.values.lock().remove(key);
        Ok(())
    }

    async fn expire(&self, key: &str, _ttl: Duration) -> Result<()> {
        self.record(DurableCall::Expire(key.to_string()))
    }

    fn backend(&self) -> &'static str {
        "mock"
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_mock_store_records_calls() {
        let store = MockDurableStore::new();
        store.setex("a", Duration::from_secs(1), "v").await.unwrap();
        assert_eq!(store.get("a").await.unwrap().as_deref(), Some("v"));
        store.del("a").await.unwrap();

        assert!(store.is_empty());
        assert_eq!(
            store.calls(),
            vec![
                DurableCall::Setex("a".into()),
                DurableCall::Get("a".into()),
                DurableCall::Del("a".into()),
            ]
        );
    }

    #[tokio::test]
    async fn test_mock_store_failure_mode() {
        let store = MockDurableStore::new();
        store.set_should_fail(true);
        assert!(store.setex("a", Duration::from_secs(1), "v").await.is_err());
        assert!(!store.contains("a"));

        store.set_should_fail(false);
        assert!(store.get("a").await.unwrap().is_none());
    }
}
