//! Durable store health checks.

use tracing::{debug, error};

use crate::store::DurableStore;

/// Key read by the health probe; it never exists.
const PROBE_KEY: &str = "__session_health_probe__";

/// Check durable store health with a bounded read.
pub async fn check_connection(store: &dyn DurableStore) -> bool {
    match store.get(PROBE_KEY).await {
        Ok(_) => {
            debug!(backend = store.backend(), "Durable store connection healthy");
            true
        }
        Err(e) => {
            error!(backend = store.backend(), "Durable store unreachable: {}", e);
            false
        }
    }
}

/// Probe the store and record the outcome in the global health registry.
pub async fn update_health(store: &dyn DurableStore) -> bool {
    let healthy = check_connection(store).await;
    if healthy {
        telemetry::health().durable_store.set_healthy();
    } else {
        telemetry::health()
            .durable_store
            .set_unhealthy(format!("{} unreachable", store.backend()));
    }
    healthy
}
