use std::sync::Arc;

use axum::{
    extract::{rejection::JsonRejection, Extension, State},
    http::StatusCode,
    Json,
};
use tracing::{error, info};

use crate::auth::{guards, Identity, Role};
use crate::models::{ErrorResponse, PublishRequest, PublishResponse, Rejection};
use crate::state::AppState;
use crate::ws::RoomKey;

/// Relay a domain event to every socket in a room
#[utoipa::path(
    post,
    path = "/api/v1/events",
    tag = "events",
    request_body = PublishRequest,
    responses(
        (status = 200, description = "Event relayed", body = PublishResponse),
        (status = 400, description = "Malformed body, invalid room or non-domain event", body = ErrorResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse),
        (status = 403, description = "Caller may not publish", body = ErrorResponse)
    )
)]
pub async fn publish_event(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    payload: Result<Json<PublishRequest>, JsonRejection>,
) -> Result<(StatusCode, Json<PublishResponse>), Rejection> {
    // Backend service, or staff acting directly
    let principal = guards::ensure_service_or_role(
        &identity,
        &state.config.api_service_name,
        &[Role::Organizer, Role::Judge],
    )?;

    let Json(request) = payload.map_err(|e| {
        error!("Publish by {} rejected: {}", principal, e.body_text());
        ErrorResponse::reject(StatusCode::BAD_REQUEST, e.body_text())
    })?;

    let room: RoomKey = request.room.parse().map_err(|e| {
        error!("Publish by {} rejected: {}", principal, e);
        ErrorResponse::reject(StatusCode::BAD_REQUEST, format!("{}", e))
    })?;

    let delivered = state
        .publisher
        .publish(&room, &request.message)
        .await
        .map_err(|e| ErrorResponse::reject(StatusCode::BAD_REQUEST, e.to_string()))?;

    info!(
        "{} published {} to {}",
        principal,
        request.message.event_name(),
        room
    );
    Ok((StatusCode::OK, Json(PublishResponse { delivered })))
}
