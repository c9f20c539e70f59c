//! Shared helpers for the multi-node integration tests.

pub mod mocks;
pub mod setup;

pub use mocks::{DurableCall, MockDurableStore};
pub use setup::{settle, TestCluster, TestNode};
