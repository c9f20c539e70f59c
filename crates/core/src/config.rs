//! Session node configuration.

use std::time::Duration;

use serde::{Deserialize, Serialize};

/// Configuration consumed by the session server and manager of one node.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionConfig {
    /// Identity of this node, embedded in every id it mints
    #[serde(default = "default_node_id")]
    pub node_id: u32,
    /// Application namespace (`\`-separated segments are allowed)
    #[serde(default = "default_app_namespace")]
    pub app_namespace: String,
    /// Explicit session namespace, overrides the derived one
    #[serde(default)]
    pub namespace: Option<String>,
    /// Explicit bus address, pins every lookup to this address
    #[serde(default)]
    pub address: Option<String>,
    /// Sliding session TTL in seconds
    #[serde(default = "default_ttl_secs")]
    pub ttl_secs: u64,
    /// Inter-node call timeout in milliseconds
    #[serde(default = "default_bus_timeout_ms")]
    pub bus_timeout_ms: u64,
    /// Durable store call timeout in milliseconds
    #[serde(default = "default_durable_timeout_ms")]
    pub durable_timeout_ms: u64,
    /// Cookie path
    #[serde(default = "default_cookie_path")]
    pub cookie_path: String,
    /// Cookie domain
    #[serde(default)]
    pub cookie_domain: Option<String>,
    /// Cookie lifetime in seconds (0 = browser session)
    #[serde(default)]
    pub cookie_ttl_secs: u64,
    /// Key material for the identifier cipher
    #[serde(default = "default_secret")]
    pub secret: String,
    /// Durable store URL; failover is disabled without one
    #[serde(default)]
    pub durable_url: Option<String>,
}

fn default_node_id() -> u32 {
    1
}

fn default_app_namespace() -> String {
    "app".to_string()
}

fn default_ttl_secs() -> u64 {
    30 * 60
}

fn default_bus_timeout_ms() -> u64 {
    2500
}

fn default_durable_timeout_ms() -> u64 {
    3000
}

fn default_cookie_path() -> String {
    "/".to_string()
}

fn default_secret() -> String {
    "change-me".to_string()
}

impl Default for SessionConfig {
    fn default() -> Self {
        Self {
            node_id: default_node_id(),
            app_namespace: default_app_namespace(),
            namespace: None,
            address: None,
            ttl_secs: default_ttl_secs(),
            bus_timeout_ms: default_bus_timeout_ms(),
            durable_timeout_ms: default_durable_timeout_ms(),
            cookie_path: default_cookie_path(),
            cookie_domain: None,
            cookie_ttl_secs: 0,
            secret: default_secret(),
            durable_url: None,
        }
    }
}

impl SessionConfig {
    /// Returns the session namespace.
    pub fn namespace(&self) -> String {
        match &self.namespace {
            Some(ns) => ns.clone(),
            None => format!("{}.session", self.app_namespace.replace('\\', ".")),
        }
    }

    /// Returns the bus address of `node_id`'s session server.
    pub fn address_of(&self, node_id: u32) -> String {
        match &self.address {
            Some(address) => address.clone(),
            None => format!("{}.server{}", self.namespace(), node_id),
        }
    }

    /// Returns this node's session server address.
    pub fn local_address(&self) -> String {
        self.address_of(self.node_id)
    }

    pub fn ttl(&self) -> Duration {
        Duration::from_secs(self.ttl_secs)
    }

    pub fn bus_timeout(&self) -> Duration {
        Duration::from_millis(self.bus_timeout_ms)
    }

    pub fn durable_timeout(&self) -> Duration {
        Duration::from_millis(self.durable_timeout_ms)
    }

    /// Whether a durable store is configured.
    pub fn failover_enabled(&self) -> bool {
        self.durable_url.as_deref().is_some_and(|url| !url.is_empty())
    }

    /// Returns a copy for another node with the same cluster settings.
    pub fn for_node(&self, node_id: u32) -> Self {
        Self {
            node_id,
            ..self.clone()
        }
    }
}
