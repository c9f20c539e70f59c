//! Cross-process bus over HTTP.
//!
//! Each peer node exposes `POST /bus/{address}`; a command is sent as JSON
//! and the reply comes back as JSON.

use std::collections::HashMap;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::StatusCode;
use session_core::{Command, Reply};
use tracing::{debug, warn};

use crate::bus::MessageBus;
use crate::error::BusError;

/// Bus client that forwards commands to peer nodes over HTTP.
#[derive(Clone)]
pub struct HttpBus {
    /// Server address -> peer base URL (e.g. "http://10.0.0.2:8080")
    peers: HashMap<String, String>,
    http_client: reqwest::Client,
}

impl HttpBus {
    pub fn new(peers: HashMap<String, String>) -> Self {
        Self {
            peers,
            http_client: reqwest::Client::new(),
        }
    }

    /// Adds or replaces the base URL serving `address`.
    pub fn with_peer(mut self, address: impl Into<String>, base_url: impl Into<String>) -> Self {
        self.peers.insert(address.into(), base_url.into());
        self
    }

    pub fn peer_count(&self) -> usize {
        self.peers.len()
    }

    fn url_for(&self, address: &str) -> Option<String> {
        self.peers
            .get(address)
            .map(|base| format!("{}/bus/{}", base.trim_end_matches('/'), address))
    }
}

#[async_trait]
impl MessageBus for HttpBus {
    async fn request(
        &self,
        address: &str,
        command: Command,
        timeout: Duration,
    ) -> Result<Reply, BusError> {
        let Some(url) = self.url_for(address) else {
            return Err(BusError::NoHandler(address.to_string()));
        };

        debug!(url = %url, act = command.act, "Forwarding session command");

        let response = self
            .http_client
            .post(&url)
            .timeout(timeout)
            .json(&command)
            .send()
            .await
            .map_err(|e| {
                if e.is_timeout() {
                    BusError::Timeout {
                        address: address.to_string(),
                        timeout_ms: timeout.as_millis() as u64,
                    }
                } else {
                    warn!(error = %e, address, "Bus request failed");
                    BusError::Transport(e.to_string())
                }
            })?;

        if response.status() == StatusCode::NOT_FOUND {
            return Err(BusError::NoHandler(address.to_string()));
        }

        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            warn!(status = %status, body = %body, "Peer returned error");
            return Err(BusError::Transport(format!("peer returned {}: {}", status, body)));
        }

        response.json::<Reply>().await.map_err(|e| {
            if e.is_timeout() {
                BusError::Timeout {
                    address: address.to_string(),
                    timeout_ms: timeout.as_millis() as u64,
                }
            } else {
                BusError::Transport(format!("invalid reply: {}", e))
            }
        })
    }
}
