use utoipa::OpenApi;

use crate::handlers;
use crate::models::*;

#[derive(OpenApi)]
#[openapi(
    paths(
        handlers::health::health_check,
        handlers::health::ready_check,
        handlers::presence::online_users,
        handlers::presence::broadcast_online_users,
        handlers::presence::disconnect_user,
        handlers::events::publish_event,
        handlers::diagnostics::diagnostics,
    ),
    components(
        schemas(
            HealthResponse,
            ErrorResponse,
            DiagnosticsResponse,
            OnlineUsersResponse,
            BroadcastResponse,
            DisconnectResponse,
            PublishRequest,
            PublishResponse,
        )
    ),
    tags(
        (name = "health", description = "Liveness and readiness"),
        (name = "presence", description = "Online users and connection control"),
        (name = "events", description = "Domain event relay"),
        (name = "admin", description = "Operator endpoints")
    )
)]
pub struct ApiDoc;
