//! Per-node session server.
//!
//! Owns the node-local session map and its GC timers and executes the
//! session commands (`GET`, `SAVE`, `DESTROY`, `DESTROY_ALL` and their
//! failover variants) against it and the durable store.

mod gc;
mod pending;
pub mod server;

pub use server::{ServerStats, SessionProbe, SessionServer, SessionServerHandle};
