use std::env;

use thiserror::Error;

use crate::config_env::{optional_trimmed_env, parse_u64_env, parse_usize_env};

const DEFAULT_BIND_ADDR: &str = "127.0.0.1:5001";
const DEFAULT_MAX_PHOTO_BYTES: usize = 10 * 1024 * 1024;
const DEFAULT_SESSION_TTL_SECONDS: u64 = 24 * 60 * 60;

#[derive(Debug, Clone)]
pub struct ApiConfig {
    pub bind_addr: String,
    pub max_photo_bytes: usize,
    pub session_ttl_seconds: u64,
    /// `redis://` URL; sessions stay in process memory when unset.
    pub session_store_url: Option<String>,
}

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("missing required env var {0}")]
    MissingVar(String),
    #[error("invalid integer in env var {0}")]
    ParseInt(String),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}

impl ApiConfig {
    pub fn from_env() -> Result<Self, ConfigError> {
        let config = Self {
            bind_addr: env::var("API_BIND_ADDR").unwrap_or_else(|_| DEFAULT_BIND_ADDR.to_string()),
            max_photo_bytes: parse_usize_env("POSTCARD_MAX_PHOTO_BYTES", DEFAULT_MAX_PHOTO_BYTES)?,
            session_ttl_seconds: parse_u64_env("SESSION_TTL_SECONDS", DEFAULT_SESSION_TTL_SECONDS)?,
            session_store_url: optional_trimmed_env("SESSION_STORE_URL"),
        };

        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.max_photo_bytes == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "POSTCARD_MAX_PHOTO_BYTES must be greater than 0".to_string(),
            ));
        }
        if self.session_ttl_seconds == 0 {
            return Err(ConfigError::InvalidConfiguration(
                "SESSION_TTL_SECONDS must be greater than 0".to_string(),
            ));
        }
        if let Some(url) = self.session_store_url.as_deref()
            && !url.starts_with("redis://")
            && !url.starts_with("rediss://")
        {
            return Err(ConfigError::InvalidConfiguration(
                "SESSION_STORE_URL must be a redis:// or rediss:// URL".to_string(),
            ));
        }

        Ok(())
    }
}

/// Loads a `.env` file from the working directory if one exists.
pub fn load_dotenv() {
    let _ = dotenvy::dotenv();
}
