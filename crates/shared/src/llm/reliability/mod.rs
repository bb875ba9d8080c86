use std::fmt;
use std::future::Future;

use thiserror::Error;
use tokio::time::{sleep, timeout};
use tracing::warn;

use util::retry_delay;

mod config;
mod util;

pub use config::{LlmReliabilityConfig, LlmReliabilityConfigError, RetryPolicy};

/// The three kinds of outbound call the pipeline makes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UpstreamCall {
    Analysis,
    ImageSynthesis,
    Caption,
}

impl UpstreamCall {
    pub const fn label(self) -> &'static str {
        match self {
            Self::Analysis => "analysis",
            Self::ImageSynthesis => "image_synthesis",
            Self::Caption => "caption",
        }
    }
}

impl fmt::Display for UpstreamCall {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RetryClass {
    UpstreamAnalysis,
    UpstreamGeneration,
    UpstreamTimeout,
    Permanent,
}

pub trait Retryable {
    fn retry_class(&self) -> RetryClass;
}

#[derive(Debug, Clone, Copy, Error)]
#[error("{call} call exceeded {timeout_ms}ms")]
pub struct CallTimedOut {
    pub call: UpstreamCall,
    pub timeout_ms: u64,
}

/// Runs one upstream call under the configured per-call timeout, retrying with
/// exponential backoff while the error class still has attempts left.
pub async fn call_upstream<T, E, F, Fut>(
    config: &LlmReliabilityConfig,
    call: UpstreamCall,
    mut operation: F,
) -> Result<T, E>
where
    F: FnMut() -> Fut,
    Fut: Future<Output = Result<T, E>>,
    E: Retryable + From<CallTimedOut> + fmt::Display,
{
    let call_timeout = config.timeout_for(call);
    let mut attempt = 1_u32;

    loop {
        let outcome = match timeout(call_timeout, operation()).await {
            Ok(result) => result,
            Err(_) => Err(E::from(CallTimedOut {
                call,
                timeout_ms: call_timeout.as_millis() as u64,
            })),
        };

        let err = match outcome {
            Ok(value) => return Ok(value),
            Err(err) => err,
        };

        let max_attempts = config.retry.max_attempts(err.retry_class());
        if attempt >= max_attempts {
            return Err(err);
        }

        let backoff = retry_delay(
            config.retry.base_backoff_ms,
            config.retry.max_backoff_ms,
            attempt,
        );
        warn!(
            call = call.label(),
            attempt,
            max_attempts,
            backoff_ms = backoff.as_millis() as u64,
            error = %err,
            "upstream call failed; retrying"
        );
        sleep(backoff).await;
        attempt = attempt.saturating_add(1);
    }
}
