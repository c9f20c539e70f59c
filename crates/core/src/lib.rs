//! Core types for the clustered session store.
//!
//! Everything a node needs to agree on with its peers lives here: the
//! session identifier format, the stored record shape, the inter-node
//! command envelope and the configuration surface.

pub mod cipher;
pub mod command;
pub mod config;
pub mod error;
pub mod id;
pub mod record;

pub use cipher::*;
pub use command::*;
pub use config::*;
pub use error::{Error, Result};
pub use id::*;
pub use record::*;
