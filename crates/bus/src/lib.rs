//! Addressable request/reply bus between session nodes.
//!
//! Every call carries its own timeout; a late reply after the caller gave
//! up is dropped on the floor.

pub mod bus;
pub mod error;
pub mod http;
pub mod local;

pub use bus::*;
pub use error::BusError;
pub use http::HttpBus;
pub use local::LocalBus;
