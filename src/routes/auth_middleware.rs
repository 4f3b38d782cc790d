use std::sync::Arc;

use axum::{
    extract::{Request, State},
    http::StatusCode,
    middleware::Next,
    response::Response,
};
use tracing::{debug, error, warn};

use crate::error::AuthError;
use crate::models::{ErrorResponse, Rejection};
use crate::services::auth_service::get_auth_token;
use crate::state::AppState;

/// Validates the bearer token and stores the caller's `Identity` in the
/// request extensions for downstream handlers.
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut req: Request,
    next: Next,
) -> Result<Response, Rejection> {
    // 1. Get the auth token from the request
    let token = get_auth_token(req.headers(), None).map_err(|e| {
        debug!("Rejecting request without token: {}", e);
        ErrorResponse::reject(StatusCode::UNAUTHORIZED, e.to_string())
    })?;

    // 2. Validate it
    let identity = match state.verifier.verify(&token) {
        Ok(identity) => identity,
        Err(AuthError::NotConfigured) => {
            error!("JWT secret not configured");
            return Err(ErrorResponse::reject(
                StatusCode::INTERNAL_SERVER_ERROR,
                "Authentication is not configured",
            ));
        }
        Err(e) => {
            warn!("Token validation failed: {}", e);
            return Err(ErrorResponse::reject(StatusCode::UNAUTHORIZED, e.to_string()));
        }
    };

    // 3. Hand the identity to the handlers
    debug!("Authenticated {}", identity.principal());
    req.extensions_mut().insert(identity);

    Ok(next.run(req).await)
}
