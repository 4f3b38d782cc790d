use std::sync::Arc;

use axum::{
    extract::{Extension, Path, State},
    http::StatusCode,
    Json,
};
use tracing::info;

use crate::auth::{guards, Identity};
use crate::models::{BroadcastResponse, DisconnectResponse, ErrorResponse, OnlineUsersResponse, Rejection};
use crate::state::AppState;

/// Users with at least one open socket
#[utoipa::path(
    get,
    path = "/api/v1/presence",
    tag = "presence",
    responses(
        (status = 200, description = "Online users", body = OnlineUsersResponse),
        (status = 401, description = "Missing or invalid token", body = ErrorResponse)
    )
)]
pub async fn online_users(
    State(state): State<Arc<AppState>>,
    Extension(_identity): Extension<Identity>,
) -> Json<OnlineUsersResponse> {
    Json(OnlineUsersResponse {
        user_ids: state.hub.online_users().await,
    })
}

/// Push `users:online` to every socket
#[utoipa::path(
    post,
    path = "/api/v1/presence/broadcast",
    tag = "presence",
    responses(
        (status = 200, description = "Snapshot sent", body = BroadcastResponse),
        (status = 403, description = "Admin or backend service required", body = ErrorResponse)
    )
)]
pub async fn broadcast_online_users(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
) -> Result<(StatusCode, Json<BroadcastResponse>), Rejection> {
    let principal = guards::ensure_service_or_role(&identity, &state.config.api_service_name, &[])?;
    let delivered = state.hub.broadcast_online_users().await;
    info!("{} broadcast the online set to {} sockets", principal, delivered);
    Ok((StatusCode::OK, Json(BroadcastResponse { delivered })))
}

/// Close every socket of a user
#[utoipa::path(
    delete,
    path = "/api/v1/connections/{user_id}",
    tag = "presence",
    params(("user_id" = String, Path, description = "User whose sockets are closed")),
    responses(
        (status = 200, description = "Close requested", body = DisconnectResponse),
        (status = 403, description = "Admin or backend service required", body = ErrorResponse)
    )
)]
pub async fn disconnect_user(
    State(state): State<Arc<AppState>>,
    Extension(identity): Extension<Identity>,
    Path(user_id): Path<String>,
) -> Result<(StatusCode, Json<DisconnectResponse>), Rejection> {
    let principal = guards::ensure_service_or_role(&identity, &state.config.api_service_name, &[])?;
    let closed = state.hub.disconnect_user(&user_id).await;
    info!("{} disconnected user {} ({} sockets)", principal, user_id, closed);
    Ok((StatusCode::OK, Json(DisconnectResponse { closed })))
}
