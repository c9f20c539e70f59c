//! Durable fallback store for the session cluster.
//!
//! The durable store is only the system of record when a node cannot be
//! reached; on the happy path it receives mirrored writes and nothing else.

pub mod health;
pub mod memory;
pub mod redis_store;
pub mod store;

pub use memory::MemoryStore;
pub use redis_store::RedisStore;
pub use store::*;
