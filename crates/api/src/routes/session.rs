//! Session endpoints.
//!
//! Thin wrappers over the session manager: they exist so the cluster can
//! be driven over HTTP, and so browsers see the cookie lifecycle.

use axum::{
    extract::State,
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::Value;
use session_core::SessionRecord;
use tracing::debug;

use crate::extractors::RequestSession;
use crate::response::{with_cookies, ApiError, SessionResponse};
use crate::state::AppState;

/// GET /session - Current session data.
pub async fn get_session_handler(
    State(state): State<AppState>,
    RequestSession(mut ctx): RequestSession,
) -> Response {
    let response = match state.manager.get_session(&mut ctx).await {
        Some(record) => Json(SessionResponse::new(&record)).into_response(),
        None => ApiError::not_found("SESS_004", "No active session").into_response(),
    };
    with_cookies(response, &mut ctx)
}

/// PUT /session - Merge a JSON object into the session, starting one if needed.
pub async fn put_session_handler(
    State(state): State<AppState>,
    RequestSession(mut ctx): RequestSession,
    Json(body): Json<Value>,
) -> Response {
    let Value::Object(values) = body else {
        return ApiError::bad_request("Session data must be a JSON object").into_response();
    };

    let mut record = match state.manager.get_session(&mut ctx).await {
        Some(record) => record,
        None => state.manager.start_session(&mut ctx),
    };
    record.merge(values);

    let saved = state.manager.save_session_data(Some(&mut record)).await;
    debug!(id = %record.id, saved, "Session written");

    let status = if saved {
        StatusCode::OK
    } else {
        StatusCode::SERVICE_UNAVAILABLE
    };
    let response = (status, Json(SessionResponse::saved(&record, saved))).into_response();
    with_cookies(response, &mut ctx)
}

/// DELETE /session - Destroy the session and expire its cookie.
///
/// Responds without waiting for the owning node.
pub async fn delete_session_handler(
    State(state): State<AppState>,
    RequestSession(mut ctx): RequestSession,
) -> Response {
    if let Some(id) = ctx.session_id().map(str::to_string) {
        let record = SessionRecord::new(id);
        let _ = state.manager.destroy_session(&mut ctx, &record);
    }
    with_cookies(StatusCode::NO_CONTENT.into_response(), &mut ctx)
}
