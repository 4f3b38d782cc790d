//! Error types shared by the gateway and the client.

use thiserror::Error;

/// Gateway error type.
#[derive(Debug, Error)]
pub enum GatewayError {
    /// A room key that is not `kind:id` with a known kind and non-empty id.
    #[error("invalid room '{0}'")]
    InvalidRoom(String),

    /// Client frame could not be parsed.
    #[error("invalid message: {0}")]
    Json(#[from] serde_json::Error),

    /// Only domain events may be relayed into rooms.
    #[error("event '{0}' cannot be published")]
    NotPublishable(String),
}

/// Authentication failures for bearer tokens.
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("missing Authorization header, token parameter or auth_token cookie")]
    MissingToken,

    #[error("invalid {0} header")]
    InvalidHeader(&'static str),

    #[error("no JWT secret configured")]
    NotConfigured,

    #[error("JWT validation failed: {0}")]
    Jwt(#[from] jsonwebtoken::errors::Error),

    #[error("token has no subject")]
    MissingSubject,

    #[error("invalid token type '{0}'")]
    InvalidTokenType(String),
}

/// Gateway configuration could not be read from the environment.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Environment variable error: {0}")]
    EnvError(#[from] envy::Error),
}

/// Client-side connection errors.
#[derive(Debug, Error)]
pub enum ClientError {
    #[error("invalid gateway url: {0}")]
    Url(#[from] url::ParseError),

    #[error("unsupported gateway url scheme '{0}'")]
    Scheme(String),

    #[error("configuration error: {0}")]
    Config(#[from] envy::Error),

    #[error("websocket error: {0}")]
    WebSocket(#[from] tokio_tungstenite::tungstenite::Error),

    #[error("encode error: {0}")]
    Json(#[from] serde_json::Error),
}

pub type Result<T, E = GatewayError> = std::result::Result<T, E>;
