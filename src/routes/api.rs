use std::sync::Arc;

use axum::{
    middleware,
    routing::{delete, get, post},
    Router,
};

use crate::handlers::{broadcast_online_users, diagnostics, disconnect_user, health_check, online_users, publish_event, ready_check};
use crate::routes::auth_middleware::auth_middleware;
use crate::state::AppState;

/// Create API routes
pub fn create_api_routes(state: Arc<AppState>) -> Router {
    let protected = Router::<Arc<AppState>>::new()
        .route("/v1/diagnostics", get(diagnostics))
        .route("/v1/presence", get(online_users))
        .route("/v1/presence/broadcast", post(broadcast_online_users))
        .route("/v1/events", post(publish_event))
        .route("/v1/connections/:user_id", delete(disconnect_user))
        .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware)); // Applies to all routes added above

    Router::<Arc<AppState>>::new()
        .route("/health", get(health_check))
        .route("/ready", get(ready_check))
        .merge(protected)
        .with_state(state)
}
