use serde::{Deserialize, Serialize};
use std::time::Duration;

pub use crate::error::ConfigError;

/// Gateway configuration
#[derive(Debug, Clone, Deserialize, Serialize)]
pub struct Config {
    /// Server host address
    #[serde(default = "default_host")]
    pub host: String,

    /// Server port
    #[serde(default = "default_port")]
    pub port: u16,

    /// CORS allowed origins, comma separated
    pub cors_origins: Option<String>,

    /// Level for this crate and tower_http, or a full filter directive.
    /// `RUST_LOG` wins when set.
    #[serde(default = "default_log_level")]
    pub log_level: String,

    /// HS256 secret shared with the API server that issues access tokens
    pub jwt_secret: Option<String>,

    /// Name carried in `sub` by the API server's service tokens
    #[serde(default = "default_api_service_name")]
    pub api_service_name: String,

    #[serde(default = "default_ws_ping_interval_secs")]
    pub ws_ping_interval_secs: u64,

    #[serde(default = "default_ws_ping_timeout_secs")]
    pub ws_ping_timeout_secs: u64,

    #[serde(default = "default_token_cache_ttl_secs")]
    pub token_cache_ttl_secs: u64,
}

impl Config {
    /// Load configuration from environment variables or app.env file
    pub fn load() -> Result<Self, ConfigError> {
        // Try to load from app.env file first
        if std::path::Path::new("app.env").exists() {
            dotenvy::from_filename("app.env").ok();
        } else {
            dotenvy::dotenv().ok();
        }

        Ok(envy::from_env::<Config>()?)
    }

    /// Get the full server address
    pub fn server_address(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }

    /// Filter used when `RUST_LOG` is unset.
    pub fn log_filter(&self) -> String {
        let level = self.log_level.trim();
        if level.contains('=') || level.contains(',') {
            return level.to_string();
        }
        format!(
            "innovation_lab_realtime={0},tower_http={0},axum::rejection=trace,info",
            level
        )
    }

    /// Parsed CORS origins; `None` means any origin is accepted.
    pub fn cors_origin_list(&self) -> Option<Vec<String>> {
        let origins = self.cors_origins.as_ref()?;
        let list: Vec<String> = origins
            .split(',')
            .map(|o| o.trim().to_string())
            .filter(|o| !o.is_empty())
            .collect();
        if list.is_empty() {
            None
        } else {
            Some(list)
        }
    }

    pub fn ws_ping_interval(&self) -> Duration {
        Duration::from_secs(self.ws_ping_interval_secs.max(1))
    }

    /// How long a socket may stay silent before the gateway drops it.
    pub fn ws_idle_timeout(&self) -> Duration {
        self.ws_ping_interval() + Duration::from_secs(self.ws_ping_timeout_secs)
    }

    pub fn token_cache_ttl(&self) -> Duration {
        Duration::from_secs(self.token_cache_ttl_secs)
    }
}

impl Default for Config {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: None,
            log_level: default_log_level(),
            jwt_secret: None,
            api_service_name: default_api_service_name(),
            ws_ping_interval_secs: default_ws_ping_interval_secs(),
            ws_ping_timeout_secs: default_ws_ping_timeout_secs(),
            token_cache_ttl_secs: default_token_cache_ttl_secs(),
        }
    }
}

// Default value functions
fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    4000
}

fn default_log_level() -> String {
    "debug".to_string()
}

fn default_api_service_name() -> String {
    "innovation-lab-api".to_string()
}

fn default_ws_ping_interval_secs() -> u64 {
    25
}

fn default_ws_ping_timeout_secs() -> u64 {
    20
}

fn default_token_cache_ttl_secs() -> u64 {
    60
}
