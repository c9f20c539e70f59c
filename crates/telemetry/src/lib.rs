//! Internal telemetry for the session cluster.
//!
//! Counters and component health live in process; they are exposed through
//! the node's health endpoints and periodic log lines.

pub mod health;
pub mod metrics;
pub mod tracing_setup;

pub use health::*;
pub use metrics::*;
pub use tracing_setup::*;
