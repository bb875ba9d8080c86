use std::time::Duration;

use thiserror::Error;

use crate::config::ConfigError;
use crate::config_env::{parse_u32_env, parse_u64_env};

use super::{RetryClass, UpstreamCall};

const DEFAULT_ANALYSIS_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_IMAGE_TIMEOUT_MS: u64 = 40_000;
const DEFAULT_CAPTION_TIMEOUT_MS: u64 = 20_000;
const DEFAULT_ANALYSIS_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_GENERATION_MAX_ATTEMPTS: u32 = 2;
const DEFAULT_TIMEOUT_MAX_ATTEMPTS: u32 = 1;
const DEFAULT_RETRY_BASE_BACKOFF_MS: u64 = 500;
const DEFAULT_RETRY_MAX_BACKOFF_MS: u64 = 4_000;

/// Attempt budget per error class. Permanent errors always get exactly one attempt.
#[derive(Debug, Clone)]
pub struct RetryPolicy {
    pub analysis_max_attempts: u32,
    pub generation_max_attempts: u32,
    pub timeout_max_attempts: u32,
    pub base_backoff_ms: u64,
    pub max_backoff_ms: u64,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            analysis_max_attempts: DEFAULT_ANALYSIS_MAX_ATTEMPTS,
            generation_max_attempts: DEFAULT_GENERATION_MAX_ATTEMPTS,
            timeout_max_attempts: DEFAULT_TIMEOUT_MAX_ATTEMPTS,
            base_backoff_ms: DEFAULT_RETRY_BASE_BACKOFF_MS,
            max_backoff_ms: DEFAULT_RETRY_MAX_BACKOFF_MS,
        }
    }
}

impl RetryPolicy {
    pub fn max_attempts(&self, class: RetryClass) -> u32 {
        match class {
            RetryClass::UpstreamAnalysis => self.analysis_max_attempts,
            RetryClass::UpstreamGeneration => self.generation_max_attempts,
            RetryClass::UpstreamTimeout => self.timeout_max_attempts,
            RetryClass::Permanent => 1,
        }
    }

    /// No retries at all; used by tests and by callers that manage retries themselves.
    pub fn single_attempt() -> Self {
        Self {
            analysis_max_attempts: 1,
            generation_max_attempts: 1,
            timeout_max_attempts: 1,
            base_backoff_ms: 0,
            max_backoff_ms: 0,
        }
    }
}

#[derive(Debug, Clone)]
pub struct LlmReliabilityConfig {
    pub analysis_timeout_ms: u64,
    pub image_timeout_ms: u64,
    pub caption_timeout_ms: u64,
    pub retry: RetryPolicy,
}

impl Default for LlmReliabilityConfig {
    fn default() -> Self {
        Self {
            analysis_timeout_ms: DEFAULT_ANALYSIS_TIMEOUT_MS,
            image_timeout_ms: DEFAULT_IMAGE_TIMEOUT_MS,
            caption_timeout_ms: DEFAULT_CAPTION_TIMEOUT_MS,
            retry: RetryPolicy::default(),
        }
    }
}

impl LlmReliabilityConfig {
    pub fn from_env() -> Result<Self, LlmReliabilityConfigError> {
        let defaults = Self::default();
        let config = Self {
            analysis_timeout_ms: parse_u64_env(
                "POSTCARD_ANALYSIS_TIMEOUT_MS",
                defaults.analysis_timeout_ms,
            )?,
            image_timeout_ms: parse_u64_env("POSTCARD_IMAGE_TIMEOUT_MS", defaults.image_timeout_ms)?,
            caption_timeout_ms: parse_u64_env(
                "POSTCARD_CAPTION_TIMEOUT_MS",
                defaults.caption_timeout_ms,
            )?,
            retry: RetryPolicy {
                analysis_max_attempts: parse_u32_env(
                    "POSTCARD_RETRY_ANALYSIS_MAX_ATTEMPTS",
                    defaults.retry.analysis_max_attempts,
                )?,
                generation_max_attempts: parse_u32_env(
                    "POSTCARD_RETRY_GENERATION_MAX_ATTEMPTS",
                    defaults.retry.generation_max_attempts,
                )?,
                timeout_max_attempts: parse_u32_env(
                    "POSTCARD_RETRY_TIMEOUT_MAX_ATTEMPTS",
                    defaults.retry.timeout_max_attempts,
                )?,
                base_backoff_ms: parse_u64_env(
                    "POSTCARD_RETRY_BASE_BACKOFF_MS",
                    defaults.retry.base_backoff_ms,
                )?,
                max_backoff_ms: parse_u64_env(
                    "POSTCARD_RETRY_MAX_BACKOFF_MS",
                    defaults.retry.max_backoff_ms,
                )?,
            },
        };
        config.validate()?;
        Ok(config)
    }

    pub fn validate(&self) -> Result<(), LlmReliabilityConfigError> {
        if self.analysis_timeout_ms == 0 {
            return Err(LlmReliabilityConfigError::InvalidConfiguration(
                "POSTCARD_ANALYSIS_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        if self.image_timeout_ms == 0 {
            return Err(LlmReliabilityConfigError::InvalidConfiguration(
                "POSTCARD_IMAGE_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        if self.caption_timeout_ms == 0 {
            return Err(LlmReliabilityConfigError::InvalidConfiguration(
                "POSTCARD_CAPTION_TIMEOUT_MS must be greater than 0".to_string(),
            ));
        }
        if self.retry.analysis_max_attempts == 0
            || self.retry.generation_max_attempts == 0
            || self.retry.timeout_max_attempts == 0
        {
            return Err(LlmReliabilityConfigError::InvalidConfiguration(
                "POSTCARD_RETRY_*_MAX_ATTEMPTS must be at least 1".to_string(),
            ));
        }
        if self.retry.max_backoff_ms < self.retry.base_backoff_ms {
            return Err(LlmReliabilityConfigError::InvalidConfiguration(
                "POSTCARD_RETRY_MAX_BACKOFF_MS must not be below the base backoff".to_string(),
            ));
        }
        Ok(())
    }

    pub fn timeout_for(&self, call: UpstreamCall) -> Duration {
        let millis = match call {
            UpstreamCall::Analysis => self.analysis_timeout_ms,
            UpstreamCall::ImageSynthesis => self.image_timeout_ms,
            UpstreamCall::Caption => self.caption_timeout_ms,
        };
        Duration::from_millis(millis)
    }
}

#[derive(Debug, Error)]
pub enum LlmReliabilityConfigError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
}
