use std::time::Duration;

use axum::http::{header, HeaderMap};
use jsonwebtoken::{decode, Algorithm, DecodingKey, TokenData, Validation};
use moka::sync::Cache;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::auth::{Identity, Role, TokenKind};
use crate::config::Config;
use crate::error::AuthError;

const AUTH_COOKIE: &str = "auth_token";

/// Access token claims issued by the API server.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Claims {
    pub sub: Option<String>,
    #[serde(rename = "type", default, skip_serializing_if = "Option::is_none")]
    pub token_type: Option<String>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub role: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub roles: Vec<String>,
    pub exp: i64,
}

// Get the auth token from request headers, falling back to the handshake
// `token` query parameter and then the auth cookie.
pub fn get_auth_token(headers: &HeaderMap, query_token: Option<&str>) -> Result<String, AuthError> {
    // 1. Authorization header
    if let Some(auth_header) = headers.get(header::AUTHORIZATION) {
        let auth_str = auth_header
            .to_str()
            .map_err(|_| AuthError::InvalidHeader("Authorization"))?;
        let token = auth_str.strip_prefix("Bearer ").unwrap_or(auth_str).trim();
        if !token.is_empty() {
            return Ok(token.to_string());
        }
    }

    // 2. Handshake parameter
    if let Some(token) = query_token.map(str::trim).filter(|t| !t.is_empty()) {
        return Ok(token.to_string());
    }

    // 3. Cookie
    let cookie_header = headers
        .get(header::COOKIE)
        .ok_or(AuthError::MissingToken)?
        .to_str()
        .map_err(|_| AuthError::InvalidHeader("Cookie"))?;
    for cookie in cookie::Cookie::split_parse(cookie_header).flatten() {
        if cookie.name() == AUTH_COOKIE {
            return Ok(cookie.value().to_string());
        }
    }
    Err(AuthError::MissingToken)
}

// Validate a JWT token and return the token data
pub fn validate_jwt(token: &str, secret: &str) -> Result<TokenData<Claims>, jsonwebtoken::errors::Error> {
    let mut validation = Validation::new(Algorithm::HS256);
    // Expired means expired, with no grace period
    validation.leeway = 0;
    let decoding_key = DecodingKey::from_secret(secret.as_bytes());
    decode::<Claims>(token, &decoding_key, &validation)
}

fn identity_from_claims(claims: Claims) -> Result<Identity, AuthError> {
    let subject = claims
        .sub
        .filter(|s| !s.is_empty())
        .ok_or(AuthError::MissingSubject)?;

    let kind = match claims.token_type.as_deref() {
        None | Some("user") => TokenKind::User,
        Some("service") => TokenKind::Service,
        Some(other) => return Err(AuthError::InvalidTokenType(other.to_string())),
    };

    let mut roles: Vec<Role> = Vec::new();
    for raw in claims.role.iter().chain(claims.roles.iter()) {
        match raw.parse::<Role>() {
            Ok(role) if !roles.contains(&role) => roles.push(role),
            Ok(_) => {}
            Err(e) => debug!("Ignoring role claim for {}: {}", subject, e),
        }
    }

    Ok(Identity {
        subject,
        kind,
        roles,
        expires_at: claims.exp,
    })
}

/// Verifies bearer tokens and caches the resulting identities.
pub struct TokenVerifier {
    secret: Option<String>,
    cache: Cache<String, Identity>,
}

impl TokenVerifier {
    pub fn new(secret: Option<String>, cache_ttl: Duration) -> Self {
        if secret.is_none() {
            warn!("No JWT secret configured - every token will be rejected");
        }
        Self {
            secret,
            cache: Cache::builder()
                .max_capacity(100_000)
                .time_to_live(cache_ttl)
                .build(),
        }
    }

    pub fn from_config(config: &Config) -> Self {
        Self::new(config.jwt_secret.clone(), config.token_cache_ttl())
    }

    pub fn verify(&self, token: &str) -> Result<Identity, AuthError> {
        if let Some(identity) = self.cache.get(token) {
            if !identity.is_expired() {
                return Ok(identity);
            }
            self.cache.invalidate(token);
        }

        let secret = self.secret.as_ref().ok_or(AuthError::NotConfigured)?;
        let token_data = validate_jwt(token, secret)?;
        let identity = identity_from_claims(token_data.claims)?;
        debug!("Token validated for {}", identity.principal());

        self.cache.insert(token.to_string(), identity.clone());
        Ok(identity)
    }

    pub fn cached_identities(&self) -> u64 {
        self.cache.run_pending_tasks();
        self.cache.entry_count()
    }
}
