//! Bus error types.

use thiserror::Error;

/// Why a bus request did not produce a reply.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BusError {
    /// No reply within the call timeout
    #[error("request to {address} timed out after {timeout_ms}ms")]
    Timeout { address: String, timeout_ms: u64 },

    /// Nobody is listening on the address
    #[error("no handler registered for {0}")]
    NoHandler(String),

    /// Transport-level failure
    #[error("transport error: {0}")]
    Transport(String),
}

impl BusError {
    pub fn is_timeout(&self) -> bool {
        matches!(self, Self::Timeout { .. })
    }
}

impl From<BusError> for session_core::Error {
    fn from(err: BusError) -> Self {
        match err {
            BusError::Timeout {
                address,
                timeout_ms,
            } => session_core::Error::remote_timeout(address, timeout_ms),
            other => session_core::Error::internal(other.to_string()),
        }
    }
}
