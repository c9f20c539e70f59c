//! Bus and handler traits.

use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use session_core::{Command, Reply};

use crate::error::BusError;

/// Something that answers session commands, i.e. a session server.
#[async_trait]
pub trait CommandHandler: Send + Sync {
    async fn handle(&self, command: Command) -> Reply;
}

/// Request/reply transport addressed by session server address.
#[async_trait]
pub trait MessageBus: Send + Sync {
    /// Sends `command` to `address` and waits at most `timeout` for the reply.
    async fn request(
        &self,
        address: &str,
        command: Command,
        timeout: Duration,
    ) -> Result<Reply, BusError>;
}

/// Shared handle to a message bus.
pub type SharedBus = Arc<dyn MessageBus>;
