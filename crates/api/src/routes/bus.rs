//! Inter-node bus endpoint, the receiving side of `HttpBus`.

use axum::{
    extract::{Path, State},
    response::{IntoResponse, Response},
    Json,
};
use session_core::Command;
use tracing::debug;

use crate::response::ApiError;
use crate::state::AppState;

/// POST /bus/:address - Deliver a command to this node's session server.
pub async fn bus_handler(
    State(state): State<AppState>,
    Path(address): Path<String>,
    Json(command): Json<Command>,
) -> Response {
    if address != state.local_address() {
        return ApiError::not_found(
            "BUS_001",
            format!("{} is not served by this node", address),
        )
        .into_response();
    }

    debug!(address = %address, act = command.act, "Bus command received");
    Json(state.local_server().call(command).await).into_response()
}
