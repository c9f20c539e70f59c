//! Session cluster node
//!
//! Runs one node of the distributed session store:
//! - the node's session server (local map, GC timers, durable mirroring)
//! - the session manager routing requests to the owning node
//! - the HTTP surface for sessions, inter-node bus traffic and health

use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use anyhow::{Context, Result};
use tokio::signal;
use tracing::{error, info, warn};

use api::{router, AppState};
use durable_store::SharedDurableStore;
use session_bus::HttpBus;
use session_core::SessionConfig;
use session_manager::SessionManager;
use session_server::SessionServer;
use telemetry::{health, init_tracing_from_env, metrics};

/// Application configuration.
#[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
struct Config {
    #[serde(default = "default_host")]
    host: String,
    #[serde(default = "default_port")]
    port: u16,

    /// Session settings of this node
    #[serde(default)]
    node: SessionConfig,

    /// Peer node id -> base URL, for the HTTP bus
    #[serde(default)]
    peers: HashMap<String, String>,

    /// Durable store probe and metrics log interval
    #[serde(default = "default_health_interval_secs")]
    health_interval_secs: u64,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_health_interval_secs() -> u64 {
    30
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            node: SessionConfig::default(),
            peers: HashMap::new(),
            health_interval_secs: default_health_interval_secs(),
        }
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    // Load .env file if present
    dotenvy::dotenv().ok();

    init_tracing_from_env();

    info!("Starting session node v{}", env!("CARGO_PKG_VERSION"));

    let config = load_config()?;

    info!(
        node_id = config.node.node_id,
        address = %config.node.local_address(),
        ttl_secs = config.node.ttl_secs,
        peers = config.peers.len(),
        failover = config.node.failover_enabled(),
        "Loaded session config"
    );

    let durable = connect_durable(&config.node).await?;

    let server = SessionServer::spawn(&config.node, durable.clone());
    let bus = Arc::new(build_bus(&config));
    let manager = SessionManager::new(config.node.clone(), server.clone(), bus);

    let _health_handle = start_health_task(
        durable.clone(),
        Duration::from_secs(config.health_interval_secs.max(1)),
    );

    let app = router(AppState::new(manager));

    let addr: SocketAddr = format!("{}:{}", config.host, config.port)
        .parse()
        .context("Invalid server address")?;

    info!("Listening on http://{}", addr);

    let listener = tokio::net::TcpListener::bind(addr)
        .await
        .context("Failed to bind to address")?;

    // Run server with graceful shutdown
    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await
        .context("Server error")?;

    info!("Shutting down...");

    // Local sessions are lost with the process; the durable copies remain.
    let stats = server.stats().await;
    info!(sessions = stats.sessions, "Dropping local sessions");

    info!("Shutdown complete");
    Ok(())
}

/// Load configuration from files and environment.
fn load_config() -> Result<Config> {
    let config = config::Config::builder()
        // Start with defaults
        .add_source(config::Config::try_from(&Config::default())?)
        // Load from config file if exists
        .add_source(
            config::File::with_name("config/default")
                .required(false)
                .format(config::FileFormat::Toml),
        )
        // Override with environment variables
        .add_source(
            config::Environment::default()
                .separator("__")
                .prefix("SESSION")
                .try_parsing(true),
        )
        .build()
        .context("Failed to build configuration")?;

    let mut config: Config = config
        .try_deserialize()
        .context("Failed to deserialize configuration")?;

    // Flat overrides for the settings deployments change most often
    if let Ok(node_id) = std::env::var("SESSION_NODE_ID") {
        config.node.node_id = node_id
            .parse()
            .context("SESSION_NODE_ID must be an unsigned integer")?;
    }
    if let Ok(url) = std::env::var("SESSION_DURABLE_URL") {
        config.node.durable_url = Some(url).filter(|u| !u.is_empty());
    }
    if let Ok(secret) = std::env::var("SESSION_SECRET") {
        config.node.secret = secret;
    }
    if let Ok(peers) = std::env::var("SESSION_PEERS") {
        config.peers = parse_peers(&peers);
    }

    Ok(config)
}

/// Parses `2=http://10.0.0.2:8080,3=http://10.0.0.3:8080`.
fn parse_peers(raw: &str) -> HashMap<String, String> {
    raw.split(',')
        .filter_map(|entry| {
            let (node, url) = entry.trim().split_once('=')?;
            Some((node.trim().to_string(), url.trim().to_string()))
        })
        .collect()
}

/// Opens the durable store, if one is configured.
async fn connect_durable(node: &SessionConfig) -> Result<Option<SharedDurableStore>> {
    let Some(url) = node.durable_url.as_deref().filter(|u| !u.is_empty()) else {
        warn!("No durable store configured, sessions are lost when their node fails");
        health()
            .durable_store
            .set_unhealthy("not configured, failover disabled");
        return Ok(None);
    };

    let store = durable_store::connect(url, node.durable_timeout())
        .context("Failed to create durable store")?;

    if durable_store::health::update_health(store.as_ref()).await {
        info!(backend = store.backend(), "Durable store connection: healthy");
    } else {
        error!(backend = store.backend(), "Durable store connection: unhealthy");
    }

    Ok(Some(store))
}

/// Builds the HTTP bus from the configured peers.
fn build_bus(config: &Config) -> HttpBus {
    let mut bus = HttpBus::new(HashMap::new());
    for (node, url) in &config.peers {
        match node.parse::<u32>() {
            Ok(node_id) if node_id == config.node.node_id => {}
            Ok(node_id) => {
                bus = bus.with_peer(config.node.address_of(node_id), url.clone());
            }
            Err(_) => warn!(peer = %node, "Ignoring peer with non-numeric node id"),
        }
    }
    info!(peers = bus.peer_count(), "Session bus ready");
    bus
}

/// Periodically re-probes the durable store and logs a metrics snapshot.
fn start_health_task(
    durable: Option<SharedDurableStore>,
    every: Duration,
) -> tokio::task::JoinHandle<()> {
    tokio::spawn(async move {
        let mut ticker = tokio::time::interval(every);
        ticker.tick().await;
        loop {
            ticker.tick().await;

            if let Some(store) = &durable {
                durable_store::health::update_health(store.as_ref()).await;
            }

            let snapshot = metrics().snapshot();
            info!(
                local_sessions = snapshot.local_sessions,
                remote_gets = snapshot.remote_gets,
                failovers = snapshot.failovers,
                sessions_lost = snapshot.sessions_lost,
                bus_timeouts = snapshot.bus_timeouts,
                gc_expired = snapshot.gc_expired,
                durable_errors = snapshot.durable_errors,
                "Session metrics"
            );
        }
    })
}

/// Graceful shutdown signal handler.
async fn shutdown_signal() {
    let ctrl_c = async {
        signal::ctrl_c()
            .await
            .expect("Failed to install Ctrl+C handler");
    };

    #[cfg(unix)]
    let terminate = async {
        signal::unix::signal(signal::unix::SignalKind::terminate())
            .expect("Failed to install signal handler")
            .recv()
            .await;
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {
            info!("Received Ctrl+C signal");
        }
        _ = terminate => {
            info!("Received terminate signal");
        }
    }
}
