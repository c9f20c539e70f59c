//! Common test setup functions.

use std::sync::Arc;

use api::{router, AppState};
use axum::Router;
use durable_store::SharedDurableStore;
use session_bus::LocalBus;
use session_core::SessionConfig;
use session_manager::{CookieJar, SessionContext, SessionManager};
use session_server::{SessionServer, SessionServerHandle};

use crate::mocks::MockDurableStore;

/// Secret shared by every node of a test cluster.
pub const TEST_SECRET: &str = "integration-secret";

/// One node of a [`TestCluster`].
pub struct TestNode {
    pub node_id: u32,
    pub manager: SessionManager,
    pub server: SessionServerHandle,
}

impl TestNode {
    pub fn address(&self) -> &str {
        self.server.address()
    }

    /// HTTP router of this node, driven through the real handlers.
    pub fn router(&self) -> Router {
        router(AppState::new(self.manager.clone()))
    }
}

/// Several session nodes wired through one in-process bus.
///
/// With a durable store every node shares it, mirroring a cluster whose
/// nodes all reach the same Redis.
pub struct TestCluster {
    pub bus: Arc<LocalBus>,
    pub store: Option<MockDurableStore>,
    pub nodes: Vec<TestNode>,
}

impl TestCluster {
    /// Cluster of `size` nodes (ids 1..=size) sharing a mock durable store.
    pub fn new(size: u32) -> Self {
        Self::build(size, Some(MockDurableStore::new()), base_config())
    }

    /// Cluster without a durable store, so failover is disabled.
    pub fn without_durable(size: u32) -> Self {
        Self::build(size, None, base_config())
    }

    pub fn with_config(size: u32, config: SessionConfig) -> Self {
        Self::build(size, Some(MockDurableStore::new()), config)
    }

    fn build(size: u32, store: Option<MockDurableStore>, config: SessionConfig) -> Self {
        let bus = Arc::new(LocalBus::new());

        let nodes = (1..=size)
            .map(|node_id| {
                let node_config = config.for_node(node_id);
                let durable = store
                    .clone()
                    .map(|s| Arc::new(s) as SharedDurableStore);
                let server = SessionServer::spawn(&node_config, durable);
                bus.register(server.address(), Arc::new(server.clone()));

                let manager = SessionManager::new(node_config, server.clone(), bus.clone())
                    .with_failover(store.is_some());

                TestNode {
                    node_id,
                    manager,
                    server,
                }
            })
            .collect();

        Self { bus, store, nodes }
    }

    /// Node with the given id (1-based).
    pub fn node(&self, node_id: u32) -> &TestNode {
        &self.nodes[(node_id - 1) as usize]
    }

    /// Durable store of the cluster. Panics when there is none.
    pub fn store(&self) -> &MockDurableStore {
        self.store.as_ref().expect("cluster has no durable store")
    }

    /// Makes `node_id` stop answering bus calls.
    pub fn isolate(&self, node_id: u32) {
        self.bus.isolate(self.node(node_id).address());
    }

    pub fn heal(&self, node_id: u32) {
        self.bus.heal(self.node(node_id).address());
    }
}

/// Base configuration of test clusters.
pub fn base_config() -> SessionConfig {
    SessionConfig {
        app_namespace: "Tests\\Cluster".into(),
        secret: TEST_SECRET.into(),
        ttl_secs: 60,
        bus_timeout_ms: 500,
        ..SessionConfig::default()
    }
}

/// Request context presenting `session_id` as its cookie.
pub fn request_with_session(session_id: &str) -> SessionContext {
    SessionContext::new(
        CookieJar::from_header(&crate::fixtures::session_cookie(session_id)),
        crate::fixtures::CLIENT_HOST,
    )
}

/// Request context without cookies.
pub fn fresh_request() -> SessionContext {
    SessionContext::new(CookieJar::new(), crate::fixtures::CLIENT_HOST)
}

/// Lets background tasks (durable mirrors, destroys) run to completion.
pub async fn settle() {
    for _ in 0..50 {
        tokio::task::yield_now().await;
    }
}
