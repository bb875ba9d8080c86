use thiserror::Error;

use crate::llm::{
    CallTimedOut, LlmGatewayError, OutputValidationError, RetryClass, Retryable, UpstreamCall,
};

use super::session::SessionStoreError;

#[derive(Debug, Error)]
pub enum PipelineError {
    #[error("invalid input: {0}")]
    InvalidInput(String),
    #[error("photo analysis failed: {0}")]
    UpstreamAnalysis(String),
    #[error("postcard generation failed: {0}")]
    UpstreamGeneration(String),
    #[error("upstream {0} call timed out")]
    UpstreamTimeout(&'static str),
    #[error("session not found: {0}")]
    SessionNotFound(String),
    #[error("session store failure: {0}")]
    SessionStore(String),
}

impl PipelineError {
    pub const fn code(&self) -> &'static str {
        match self {
            Self::InvalidInput(_) => "invalid_input",
            Self::UpstreamAnalysis(_) => "upstream_analysis",
            Self::UpstreamGeneration(_) => "upstream_generation",
            Self::UpstreamTimeout(_) => "upstream_timeout",
            Self::SessionNotFound(_) => "session_not_found",
            Self::SessionStore(_) => "session_store",
        }
    }

    /// Maps a gateway error onto the stage that issued the call, keeping
    /// timeouts distinct from other provider failures.
    pub(crate) fn from_gateway(err: LlmGatewayError, call: UpstreamCall) -> Self {
        match (err, call) {
            (LlmGatewayError::Timeout, call) => Self::UpstreamTimeout(call.label()),
            (other, UpstreamCall::Analysis) => Self::UpstreamAnalysis(other.to_string()),
            (other, _) => Self::UpstreamGeneration(other.to_string()),
        }
    }

    pub(crate) fn from_validation(err: OutputValidationError, call: UpstreamCall) -> Self {
        match call {
            UpstreamCall::Analysis => Self::UpstreamAnalysis(err.to_string()),
            _ => Self::UpstreamGeneration(err.to_string()),
        }
    }
}

impl Retryable for PipelineError {
    fn retry_class(&self) -> RetryClass {
        match self {
            Self::UpstreamAnalysis(_) => RetryClass::UpstreamAnalysis,
            Self::UpstreamGeneration(_) => RetryClass::UpstreamGeneration,
            Self::UpstreamTimeout(_) => RetryClass::UpstreamTimeout,
            Self::InvalidInput(_) | Self::SessionNotFound(_) | Self::SessionStore(_) => {
                RetryClass::Permanent
            }
        }
    }
}

impl From<CallTimedOut> for PipelineError {
    fn from(value: CallTimedOut) -> Self {
        Self::UpstreamTimeout(value.call.label())
    }
}

impl From<SessionStoreError> for PipelineError {
    fn from(value: SessionStoreError) -> Self {
        match value {
            SessionStoreError::NotFound(session_id) => Self::SessionNotFound(session_id),
            SessionStoreError::Backend(message) => Self::SessionStore(message),
        }
    }
}
