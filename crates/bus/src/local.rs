//! In-process bus.
//!
//! Used when several nodes share one process, and by tests to inject
//! failures: an isolated address swallows requests so callers hit their
//! timeout, exactly like a node that stopped answering.

use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use parking_lot::RwLock;
use session_core::{Command, Reply};
use tracing::debug;

use crate::bus::{CommandHandler, MessageBus};
use crate::error::BusError;

/// Addressable in-process bus.
#[derive(Default)]
pub struct LocalBus {
    handlers: RwLock<HashMap<String, Arc<dyn CommandHandler>>>,
    isolated: RwLock<HashSet<String>>,
}

impl LocalBus {
    pub fn new() -> Self {
        Self::default()
    }

    /// Registers the handler for `address`, replacing any previous one.
    pub fn register(&self, address: impl Into<String>, handler: Arc<dyn CommandHandler>) {
        let address = address.into();
        debug!(address = %address, "Registered bus handler");
        self.handlers.write().insert(address, handler);
    }

    /// Removes the handler for `address`. Later requests fail fast.
    pub fn unregister(&self, address: &str) -> bool {
        self.handlers.write().remove(address).is_some()
    }

    /// Drops every request to `address` until [`LocalBus::heal`] is called.
    pub fn isolate(&self, address: impl Into<String>) {
        self.isolated.write().insert(address.into());
    }

    pub fn heal(&self, address: &str) {
        self.isolated.write().remove(address);
    }

    pub fn is_registered(&self, address: &str) -> bool {
        self.handlers.read().contains_key(address)
    }
}

#[async_trait]
impl MessageBus for LocalBus {
    async fn request(
        &self,
        address: &str,
        command: Command,
        timeout: Duration,
    ) -> Result<Reply, BusError> {
        let timed_out = || BusError::Timeout {
            address: address.to_string(),
            timeout_ms: timeout.as_millis() as u64,
        };

        if self.isolated.read().contains(address) {
            tokio::time::sleep(timeout).await;
            return Err(timed_out());
        }

        let handler = self.handlers.read().get(address).cloned();
        let Some(handler) = handler else {
            return Err(BusError::NoHandler(address.to_string()));
        };

        tokio::time::timeout(timeout, handler.handle(command))
            .await
            .map_err(|_| timed_out())
    }
}
