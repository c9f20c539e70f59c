//! Unified error types for the session cluster.
//!
//! Error codes:
//! - SESS_001: Malformed or undecryptable session identifier
//! - SESS_002: Owning node did not answer in time
//! - SESS_003: Durable fallback store failure
//! - SESS_004: Session not found on any node

use thiserror::Error;

/// Result type alias using our Error type.
pub type Result<T> = std::result::Result<T, Error>;

/// Session subsystem error codes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SessionErrorCode {
    /// SESS_001
    InvalidIdentifier,
    /// SESS_002
    RemoteTimeout,
    /// SESS_003
    DurableStore,
    /// SESS_004
    NotFound,
}

impl SessionErrorCode {
    /// Get the error code string.
    pub fn code(&self) -> &'static str {
        match self {
            Self::InvalidIdentifier => "SESS_001",
            Self::RemoteTimeout => "SESS_002",
            Self::DurableStore => "SESS_003",
            Self::NotFound => "SESS_004",
        }
    }
}

/// Unified error type for the session cluster.
///
/// None of these cross the manager/server boundary; they are logged and
/// collapsed into "no session" before reaching the request pipeline.
#[derive(Debug, Error)]
pub enum Error {
    #[error("invalid session identifier: {0}")]
    InvalidIdentifier(String),

    #[error("remote call to {address} timed out after {timeout_ms}ms")]
    RemoteTimeout { address: String, timeout_ms: u64 },

    #[error("durable store error: {0}")]
    DurableStore(String),

    #[error("session not found: {0}")]
    NotFound(String),

    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    #[error("config error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(String),
}

impl Error {
    pub fn invalid_identifier(msg: impl Into<String>) -> Self {
        Self::InvalidIdentifier(msg.into())
    }

    pub fn remote_timeout(address: impl Into<String>, timeout_ms: u64) -> Self {
        Self::RemoteTimeout {
            address: address.into(),
            timeout_ms,
        }
    }

    pub fn durable(msg: impl Into<String>) -> Self {
        Self::DurableStore(msg.into())
    }

    pub fn not_found(id: impl Into<String>) -> Self {
        Self::NotFound(id.into())
    }

    pub fn config(msg: impl Into<String>) -> Self {
        Self::Config(msg.into())
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::Internal(msg.into())
    }

    /// Get the error code if this is one of the session taxonomy errors.
    pub fn error_code(&self) -> Option<&'static str> {
        match self {
            Self::InvalidIdentifier(_) => Some(SessionErrorCode::InvalidIdentifier.code()),
            Self::RemoteTimeout { .. } => Some(SessionErrorCode::RemoteTimeout.code()),
            Self::DurableStore(_) => Some(SessionErrorCode::DurableStore.code()),
            Self::NotFound(_) => Some(SessionErrorCode::NotFound.code()),
            _ => None,
        }
    }
}
