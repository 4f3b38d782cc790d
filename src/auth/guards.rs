use axum::http::StatusCode;

use super::identity::{Identity, Role};
use crate::models::{ErrorResponse, Rejection};

pub fn is_admin(identity: &Identity) -> bool {
    identity.is_user() && identity.has_role(Role::Admin)
}

pub fn is_service(identity: &Identity, service_name: &str) -> bool {
    identity.is_service() && identity.subject == service_name
}

/// Require a user token.
pub fn ensure_user(identity: &Identity) -> Result<&str, Rejection> {
    if identity.is_user() {
        return Ok(&identity.subject);
    }
    Err(ErrorResponse::reject(
        StatusCode::FORBIDDEN,
        "A user token is required",
    ))
}

/// Require one of the given roles. Admins always pass.
pub fn ensure_any_role(identity: &Identity, roles: &[Role]) -> Result<Role, Rejection> {
    if is_admin(identity) {
        return Ok(Role::Admin);
    }
    if identity.is_user() {
        if let Some(role) = roles.iter().find(|r| identity.has_role(**r)) {
            return Ok(*role);
        }
    }
    Err(ErrorResponse::reject(
        StatusCode::FORBIDDEN,
        format!("One of roles {:?} required", roles),
    ))
}

pub fn ensure_admin(identity: &Identity) -> Result<Role, Rejection> {
    if is_admin(identity) {
        return Ok(Role::Admin);
    }
    Err(ErrorResponse::reject(
        StatusCode::FORBIDDEN,
        "Admin access required",
    ))
}

/// Require the named backend service, or a user holding one of the roles.
/// Returns the principal that was granted access.
pub fn ensure_service_or_role(
    identity: &Identity,
    service_name: &str,
    roles: &[Role],
) -> Result<String, Rejection> {
    if is_service(identity, service_name) {
        return Ok(identity.principal());
    }
    if identity.is_service() {
        return Err(ErrorResponse::reject(
            StatusCode::FORBIDDEN,
            format!("Service '{}' access denied", identity.subject),
        ));
    }
    ensure_any_role(identity, roles).map(|_| identity.principal())
}
