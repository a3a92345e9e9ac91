use anyhow::{anyhow, Context, Result};
use serde::{Deserialize, Serialize};
use std::env;
use std::time::Duration;

/// Where cluster configuration and runtime status come from.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum SourceMode {
    /// The backend's `GET /clusters` serves both halves.
    Backend,
    /// Config store and control plane are queried separately.
    Direct,
}

impl std::str::FromStr for SourceMode {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self> {
        match s.trim().to_ascii_lowercase().as_str() {
            "backend" => Ok(SourceMode::Backend),
            "direct" => Ok(SourceMode::Direct),
            other => Err(anyhow!("Unknown SOURCE_MODE '{}', expected backend or direct", other)),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub server_address: String,
    pub backend_url: String,
    pub source_mode: SourceMode,
    pub config_store_url: String,
    pub config_path_prefix: String,
    pub config_exclude_pattern: String,
    pub control_plane_url: String,
    pub poll_interval_secs: u64,
    pub operation_display_secs: u64,
    pub request_timeout_secs: u64,
    pub backoff_max_secs: u64,
    pub log_level: String,
}

impl Default for Config {
    fn default() -> Self {
        Self {
            server_address: "0.0.0.0:3002".to_string(),
            backend_url: "http://localhost:5000".to_string(),
            source_mode: SourceMode::Backend,
            config_store_url: "http://localhost:5000".to_string(),
            config_path_prefix: "/application/ecdp-config/UAT/EMR-BASE/".to_string(),
            config_exclude_pattern: "STRESS".to_string(),
            control_plane_url: "http://localhost:5000".to_string(),
            poll_interval_secs: 5,
            operation_display_secs: 5,
            request_timeout_secs: 30,
            backoff_max_secs: 60,
            log_level: "info".to_string(),
        }
    }
}

impl Config {
    pub fn load() -> Result<Self> {
        // .env is only read when explicitly requested
        if env::var("USE_DOTENV").ok().as_deref() == Some("true") {
            dotenv::dotenv().ok();
        }

        let defaults = Config::default();
        let backend_url = env::var("BACKEND_URL").unwrap_or(defaults.backend_url);

        let config = Config {
            server_address: env::var("SERVER_ADDRESS").unwrap_or(defaults.server_address),
            source_mode: match env::var("SOURCE_MODE") {
                Ok(mode) => mode.parse()?,
                Err(_) => defaults.source_mode,
            },
            config_store_url: env::var("CONFIG_STORE_URL").unwrap_or_else(|_| backend_url.clone()),
            config_path_prefix: env::var("CONFIG_PATH_PREFIX")
                .unwrap_or(defaults.config_path_prefix),
            config_exclude_pattern: env::var("CONFIG_EXCLUDE_PATTERN")
                .unwrap_or(defaults.config_exclude_pattern),
            control_plane_url: env::var("CONTROL_PLANE_URL").unwrap_or_else(|_| backend_url.clone()),
            poll_interval_secs: read_secs("POLL_INTERVAL_SECS", defaults.poll_interval_secs)?,
            operation_display_secs: read_secs(
                "OPERATION_DISPLAY_SECS",
                defaults.operation_display_secs,
            )?,
            request_timeout_secs: read_secs("REQUEST_TIMEOUT_SECS", defaults.request_timeout_secs)?,
            backoff_max_secs: read_secs("BACKOFF_MAX_SECS", defaults.backoff_max_secs)?,
            log_level: env::var("RUST_LOG").unwrap_or(defaults.log_level),
            backend_url,
        };

        Ok(config)
    }

    pub fn poll_interval(&self) -> Duration {
        Duration::from_secs(self.poll_interval_secs.max(1))
    }

    pub fn operation_display_timeout(&self) -> Duration {
        Duration::from_secs(self.operation_display_secs)
    }

    pub fn request_timeout(&self) -> Duration {
        Duration::from_secs(self.request_timeout_secs.max(1))
    }

    pub fn backoff_max(&self) -> Duration {
        Duration::from_secs(self.backoff_max_secs)
    }

    pub fn parameters_url(&self) -> String {
        format!("{}/parameters", self.config_store_url.trim_end_matches('/'))
    }

    pub fn control_plane_clusters_url(&self) -> String {
        format!("{}/clusters", self.control_plane_url.trim_end_matches('/'))
    }
}

fn read_secs(key: &str, default: u64) -> Result<u64> {
    match env::var(key) {
        Ok(raw) => raw
            .trim()
            .parse::<u64>()
            .with_context(|| format!("{} must be a whole number of seconds, got '{}'", key, raw)),
        Err(_) => Ok(default),
    }
}
