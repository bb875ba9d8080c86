use std::future::Future;
use std::pin::Pin;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

use super::contracts::GenerationCapability;
use super::prompts::PromptTemplate;

pub type LlmGatewayFuture<'a> =
    Pin<Box<dyn Future<Output = Result<LlmGatewayResponse, LlmGatewayError>> + Send + 'a>>;

pub type ImageSynthesisFuture<'a> =
    Pin<Box<dyn Future<Output = Result<ImageSynthesisResponse, LlmGatewayError>> + Send + 'a>>;

/// An image handed to the model alongside the text prompt, encoded as a data URL.
#[derive(Debug, Clone)]
pub struct ImageAttachment {
    pub data_url: String,
    pub detail: &'static str,
}

#[derive(Debug, Clone)]
pub struct LlmGatewayRequest {
    pub capability: GenerationCapability,
    pub contract_version: String,
    pub system_prompt: String,
    pub context_prompt: String,
    pub output_schema: Value,
    pub context_payload: Value,
    pub temperature: f32,
    pub images: Vec<ImageAttachment>,
}

impl LlmGatewayRequest {
    pub fn from_template(template: PromptTemplate, context_payload: Value) -> Self {
        Self {
            capability: template.capability,
            contract_version: template.contract_version.to_string(),
            system_prompt: template.system_prompt.to_string(),
            context_prompt: template.context_prompt.to_string(),
            output_schema: template.output_schema,
            context_payload,
            temperature: template.temperature,
            images: Vec::new(),
        }
    }

    pub fn with_image(mut self, image: ImageAttachment) -> Self {
        self.images.push(image);
        self
    }
}

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct LlmTokenUsage {
    pub prompt_tokens: u32,
    pub completion_tokens: u32,
    pub total_tokens: u32,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct LlmGatewayResponse {
    pub model: String,
    pub provider_request_id: Option<String>,
    pub output: Value,
    pub usage: Option<LlmTokenUsage>,
}

#[derive(Debug, Clone)]
pub struct ImageSynthesisRequest {
    pub prompt: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ImageSynthesisResponse {
    pub model: String,
    /// Remote URL or `data:` URL. Remote URLs may expire; callers persist them if needed.
    pub image_url: String,
    pub revised_prompt: Option<String>,
}

#[derive(Debug, Error)]
pub enum LlmGatewayError {
    #[error("upstream model request timed out")]
    Timeout,
    #[error("upstream model request failed: {0}")]
    ProviderFailure(String),
    #[error("upstream model returned an unusable payload: {0}")]
    InvalidProviderPayload(String),
}

/// Structured JSON generation, optionally grounded on attached images.
pub trait LlmGateway: Send + Sync {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a>;
}

pub trait ImageSynthesisGateway: Send + Sync {
    fn synthesize<'a>(&'a self, request: ImageSynthesisRequest) -> ImageSynthesisFuture<'a>;
}
