//! Standardized API responses.

use std::collections::HashMap;

use axum::{
    http::{header, HeaderValue, StatusCode},
    response::{IntoResponse, Response},
    Json,
};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use session_core::SessionRecord;
use session_manager::SessionContext;
use telemetry::ComponentHealthReport;
use tracing::warn;

/// Session as returned to HTTP clients.
#[derive(Debug, Serialize, Deserialize)]
pub struct SessionResponse {
    pub id: String,
    pub last_access: i64,
    pub data: HashMap<String, Value>,
    /// Whether the write reached a session server (writes only)
    #[serde(skip_serializing_if = "Option::is_none")]
    pub saved: Option<bool>,
}

impl SessionResponse {
    pub fn new(record: &SessionRecord) -> Self {
        Self {
            id: record.id.clone(),
            last_access: record.last_access,
            data: record.data().clone(),
            saved: None,
        }
    }

    pub fn saved(record: &SessionRecord, saved: bool) -> Self {
        Self {
            saved: Some(saved),
            ..Self::new(record)
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub address: String,
    pub local_sessions: u64,
    pub components: Vec<ComponentHealthReport>,
}

/// Error response.
#[derive(Debug, Serialize, Deserialize)]
pub struct ErrorResponse {
    pub error: String,
    pub code: String,
}

impl ErrorResponse {
    pub fn new(error: impl Into<String>, code: impl Into<String>) -> Self {
        Self {
            error: error.into(),
            code: code.into(),
        }
    }
}

/// API error type with error codes.
pub struct ApiError {
    pub status: StatusCode,
    pub response: ErrorResponse,
}

impl ApiError {
    pub fn with_code(status: StatusCode, code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self {
            status,
            response: ErrorResponse::new(msg, code),
        }
    }

    pub fn bad_request(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::BAD_REQUEST, "VALID_001", msg)
    }

    pub fn not_found(code: impl Into<String>, msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::NOT_FOUND, code, msg)
    }

    pub fn internal(msg: impl Into<String>) -> Self {
        Self::with_code(StatusCode::INTERNAL_SERVER_ERROR, "INTERNAL", msg)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        (self.status, Json(self.response)).into_response()
    }
}

impl From<session_core::Error> for ApiError {
    fn from(err: session_core::Error) -> Self {
        match err.error_code() {
            Some(code) => match err {
                session_core::Error::InvalidIdentifier(_) => ApiError::with_code(
                    StatusCode::BAD_REQUEST,
                    code,
                    err.to_string(),
                ),
                session_core::Error::NotFound(_) => ApiError::not_found(code, err.to_string()),
                _ => ApiError::with_code(StatusCode::SERVICE_UNAVAILABLE, code, err.to_string()),
            },
            None => match err {
                session_core::Error::Serialization(_) => ApiError::bad_request(err.to_string()),
                _ => ApiError::internal(err.to_string()),
            },
        }
    }
}

/// Copies the cookies queued by the session manager onto `response`.
pub fn with_cookies(mut response: Response, ctx: &mut SessionContext) -> Response {
    for cookie in ctx.jar.take_outgoing() {
        match HeaderValue::from_str(&cookie.header_value()) {
            Ok(value) => {
                response.headers_mut().append(header::SET_COOKIE, value);
            }
            Err(e) => warn!(cookie = %cookie.name, "Unencodable cookie dropped: {}", e),
        }
    }
    response
}
