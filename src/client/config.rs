use std::time::Duration;

use serde::Deserialize;
use url::Url;

use super::reconnect::ReconnectPolicy;
use crate::error::ClientError;

/// Connection manager configuration
#[derive(Debug, Clone, Deserialize)]
pub struct ClientConfig {
    /// Gateway origin
    #[serde(rename = "next_public_ws_url", default = "default_ws_url")]
    pub ws_url: String,

    #[serde(default = "default_ws_namespace")]
    pub ws_namespace: String,

    #[serde(default = "default_heartbeat_interval_ms")]
    pub heartbeat_interval_ms: u64,

    #[serde(default = "default_reconnection_delay_ms")]
    pub reconnection_delay_ms: u64,

    #[serde(default = "default_reconnection_delay_max_ms")]
    pub reconnection_delay_max_ms: u64,

    #[serde(default = "default_reconnection_attempts")]
    pub reconnection_attempts: u32,

    /// Step of the linear backoff after a server-initiated disconnect
    #[serde(default = "default_server_disconnect_backoff_ms")]
    pub server_disconnect_backoff_ms: u64,
}

impl ClientConfig {
    /// Load from the environment (and `.env` when present).
    pub fn from_env() -> Result<Self, ClientError> {
        dotenvy::dotenv().ok();
        Ok(envy::from_env::<ClientConfig>()?)
    }

    pub fn with_url(ws_url: impl Into<String>) -> Self {
        Self {
            ws_url: ws_url.into(),
            ..Self::default()
        }
    }

    /// WebSocket endpoint for a session: `http(s)` origins map to `ws(s)`,
    /// the namespace becomes the path and the token rides in the query.
    pub fn endpoint(&self, token: &str) -> Result<Url, ClientError> {
        let mut url = Url::parse(&self.ws_url)?;
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => return Err(ClientError::Scheme(other.to_string())),
        };
        url.set_scheme(scheme)
            .map_err(|_| ClientError::Scheme(url.scheme().to_string()))?;

        let base = url.path().trim_end_matches('/').to_string();
        let namespace = self.ws_namespace.trim_start_matches('/');
        url.set_path(&format!("{}/{}", base, namespace));
        url.query_pairs_mut().clear().append_pair("token", token);
        Ok(url)
    }

    pub fn heartbeat_interval(&self) -> Duration {
        Duration::from_millis(self.heartbeat_interval_ms.max(1))
    }

    pub fn reconnect_policy(&self) -> ReconnectPolicy {
        ReconnectPolicy {
            base_delay: Duration::from_millis(self.reconnection_delay_ms),
            max_delay: Duration::from_millis(self.reconnection_delay_max_ms),
            server_disconnect_step: Duration::from_millis(self.server_disconnect_backoff_ms),
            max_attempts: self.reconnection_attempts,
        }
    }
}

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            ws_url: default_ws_url(),
            ws_namespace: default_ws_namespace(),
            heartbeat_interval_ms: default_heartbeat_interval_ms(),
            reconnection_delay_ms: default_reconnection_delay_ms(),
            reconnection_delay_max_ms: default_reconnection_delay_max_ms(),
            reconnection_attempts: default_reconnection_attempts(),
            server_disconnect_backoff_ms: default_server_disconnect_backoff_ms(),
        }
    }
}

fn default_ws_url() -> String {
    "http://localhost:4000".to_string()
}

fn default_ws_namespace() -> String {
    "/ws".to_string()
}

fn default_heartbeat_interval_ms() -> u64 {
    30_000
}

fn default_reconnection_delay_ms() -> u64 {
    1_000
}

fn default_reconnection_delay_max_ms() -> u64 {
    5_000
}

fn default_reconnection_attempts() -> u32 {
    5
}

fn default_server_disconnect_backoff_ms() -> u64 {
    2_000
}
