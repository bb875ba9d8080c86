use std::time::Duration;

use reqwest::StatusCode;
use serde::Deserialize;
use serde_json::{Value, json};
use thiserror::Error;

use super::gateway::{
    ImageSynthesisFuture, ImageSynthesisGateway, ImageSynthesisRequest, ImageSynthesisResponse,
    LlmGateway, LlmGatewayError, LlmGatewayFuture, LlmGatewayRequest, LlmGatewayResponse,
    LlmTokenUsage,
};
use crate::config::ConfigError;
use crate::config_env::{optional_trimmed_env, parse_u64_env, require_env};

const DEFAULT_API_BASE_URL: &str = "https://api.openai.com/v1";
const DEFAULT_TIMEOUT_MS: u64 = 90_000;
const DEFAULT_MAX_COMPLETION_TOKENS: u32 = 1_000;

const DEFAULT_PRIMARY_MODEL: &str = "gpt-4o";
const DEFAULT_FALLBACK_MODEL: &str = "gpt-4o-mini";
const DEFAULT_IMAGE_MODEL: &str = "dall-e-3";
const DEFAULT_IMAGE_SIZE: &str = "1024x1024";
const DEFAULT_IMAGE_QUALITY: &str = "standard";

#[derive(Debug, Clone)]
pub struct OpenAiModelRoute {
    pub primary_model: String,
    pub fallback_model: Option<String>,
}

impl OpenAiModelRoute {
    fn candidate_models(&self) -> Vec<&str> {
        let mut candidates = Vec::new();
        if !self.primary_model.is_empty() {
            candidates.push(self.primary_model.as_str());
        }

        if let Some(fallback_model) = self.fallback_model.as_deref()
            && !fallback_model.is_empty()
            && fallback_model != self.primary_model
        {
            candidates.push(fallback_model);
        }

        candidates
    }
}

#[derive(Debug, Clone)]
pub struct OpenAiImageSettings {
    pub model: String,
    pub size: String,
    pub quality: String,
}

#[derive(Debug, Clone)]
pub struct OpenAiGatewayConfig {
    pub api_base_url: String,
    pub api_key: String,
    pub timeout_ms: u64,
    pub model_route: OpenAiModelRoute,
    pub image: OpenAiImageSettings,
}

impl OpenAiGatewayConfig {
    pub fn from_env() -> Result<Self, GatewayConfigError> {
        let api_key = require_env("OPENAI_API_KEY")?;
        let api_base_url = optional_trimmed_env("OPENAI_BASE_URL")
            .unwrap_or_else(|| DEFAULT_API_BASE_URL.to_string());
        if !api_base_url.starts_with("http://") && !api_base_url.starts_with("https://") {
            return Err(GatewayConfigError::InvalidConfiguration(
                "OPENAI_BASE_URL must start with http:// or https://".to_string(),
            ));
        }

        Ok(Self {
            api_base_url: api_base_url.trim_end_matches('/').to_string(),
            api_key,
            timeout_ms: parse_u64_env("OPENAI_TIMEOUT_MS", DEFAULT_TIMEOUT_MS)?,
            model_route: OpenAiModelRoute {
                primary_model: optional_trimmed_env("OPENAI_CHAT_MODEL")
                    .unwrap_or_else(|| DEFAULT_PRIMARY_MODEL.to_string()),
                fallback_model: optional_trimmed_env("OPENAI_CHAT_MODEL_FALLBACK")
                    .or_else(|| Some(DEFAULT_FALLBACK_MODEL.to_string())),
            },
            image: OpenAiImageSettings {
                model: optional_trimmed_env("OPENAI_IMAGE_MODEL")
                    .unwrap_or_else(|| DEFAULT_IMAGE_MODEL.to_string()),
                size: optional_trimmed_env("OPENAI_IMAGE_SIZE")
                    .unwrap_or_else(|| DEFAULT_IMAGE_SIZE.to_string()),
                quality: optional_trimmed_env("OPENAI_IMAGE_QUALITY")
                    .unwrap_or_else(|| DEFAULT_IMAGE_QUALITY.to_string()),
            },
        })
    }

    fn chat_completions_url(&self) -> String {
        format!("{}/chat/completions", self.api_base_url)
    }

    fn image_generations_url(&self) -> String {
        format!("{}/images/generations", self.api_base_url)
    }
}

#[derive(Debug, Error)]
pub enum GatewayConfigError {
    #[error(transparent)]
    Config(#[from] ConfigError),
    #[error("invalid configuration: {0}")]
    InvalidConfiguration(String),
    #[error("failed to build OpenAI http client: {0}")]
    HttpClient(String),
}

/// Client for an OpenAI-compatible API, serving both the vision/text and the
/// image-synthesis capabilities.
#[derive(Clone)]
pub struct OpenAiGateway {
    client: reqwest::Client,
    config: OpenAiGatewayConfig,
}

impl OpenAiGateway {
    pub fn new(config: OpenAiGatewayConfig) -> Result<Self, GatewayConfigError> {
        let client = reqwest::Client::builder()
            .timeout(Duration::from_millis(config.timeout_ms))
            .build()
            .map_err(|err| GatewayConfigError::HttpClient(err.to_string()))?;

        Ok(Self { client, config })
    }

    async fn send_chat_once(
        &self,
        model: &str,
        request: &LlmGatewayRequest,
    ) -> Result<LlmGatewayResponse, SendAttemptError> {
        let user_prompt = json!({
            "instruction": request.context_prompt,
            "contract_version": request.contract_version,
            "output_schema": request.output_schema,
            "context_payload": request.context_payload,
        })
        .to_string();

        let user_content = if request.images.is_empty() {
            Value::String(user_prompt)
        } else {
            let mut parts = vec![json!({ "type": "text", "text": user_prompt })];
            parts.extend(request.images.iter().map(|image| {
                json!({
                    "type": "image_url",
                    "image_url": { "url": image.data_url, "detail": image.detail }
                })
            }));
            Value::Array(parts)
        };

        let request_body = json!({
            "model": model,
            "messages": [
                { "role": "system", "content": request.system_prompt },
                { "role": "user", "content": user_content }
            ],
            "response_format": {
                "type": "json_object"
            },
            "max_tokens": DEFAULT_MAX_COMPLETION_TOKENS,
            "temperature": request.temperature
        });

        let (body, header_request_id) = self
            .post_json(&self.config.chat_completions_url(), &request_body)
            .await?;

        let parsed: ChatCompletionResponse = serde_json::from_str(&body).map_err(|_| {
            SendAttemptError::new(
                LlmGatewayError::InvalidProviderPayload("response_json_parse_failed".to_string()),
                true,
            )
        })?;

        let content = parsed
            .choices
            .first()
            .ok_or_else(|| {
                SendAttemptError::new(
                    LlmGatewayError::InvalidProviderPayload("missing_choice".to_string()),
                    true,
                )
            })?
            .message
            .content
            .clone();

        let output = match content {
            Value::String(raw) => serde_json::from_str::<Value>(strip_code_fence(&raw))
                .map_err(|_| {
                    SendAttemptError::new(
                        LlmGatewayError::InvalidProviderPayload("content_not_json".to_string()),
                        true,
                    )
                })?,
            value @ Value::Object(_) => value,
            _ => {
                return Err(SendAttemptError::new(
                    LlmGatewayError::InvalidProviderPayload(
                        "unsupported_content_shape".to_string(),
                    ),
                    true,
                ));
            }
        };

        Ok(LlmGatewayResponse {
            model: parsed.model.unwrap_or_else(|| model.to_string()),
            provider_request_id: header_request_id.or(parsed.id),
            output,
            usage: parsed.usage.map(|usage| LlmTokenUsage {
                prompt_tokens: clamp_u64_to_u32(usage.prompt_tokens.unwrap_or(0)),
                completion_tokens: clamp_u64_to_u32(usage.completion_tokens.unwrap_or(0)),
                total_tokens: clamp_u64_to_u32(usage.total_tokens.unwrap_or(0)),
            }),
        })
    }

    async fn post_json(
        &self,
        url: &str,
        request_body: &Value,
    ) -> Result<(String, Option<String>), SendAttemptError> {
        let response = self
            .client
            .post(url)
            .bearer_auth(&self.config.api_key)
            .json(request_body)
            .send()
            .await
            .map_err(|err| {
                if err.is_timeout() {
                    SendAttemptError::new(LlmGatewayError::Timeout, true)
                } else {
                    SendAttemptError::new(
                        LlmGatewayError::ProviderFailure("request_unavailable".to_string()),
                        true,
                    )
                }
            })?;

        let status = response.status();
        let header_request_id = header_request_id(response.headers());
        let body = response.text().await.map_err(|_| {
            SendAttemptError::new(
                LlmGatewayError::InvalidProviderPayload("response_body_read_failed".to_string()),
                true,
            )
        })?;

        if !status.is_success() {
            let provider_code = parse_provider_error_code(&body);
            let fallback_allowed =
                status != StatusCode::UNAUTHORIZED && status != StatusCode::FORBIDDEN;
            return Err(SendAttemptError::new(
                LlmGatewayError::ProviderFailure(format!(
                    "status={} code={provider_code}",
                    status.as_u16()
                )),
                fallback_allowed,
            ));
        }

        Ok((body, header_request_id))
    }
}

impl LlmGateway for OpenAiGateway {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            let candidate_models = self.config.model_route.candidate_models();

            for (index, model) in candidate_models.iter().enumerate() {
                match self.send_chat_once(model, &request).await {
                    Ok(response) => return Ok(response),
                    Err(attempt_err) => {
                        let has_more_candidates = index + 1 < candidate_models.len();
                        if has_more_candidates && attempt_err.fallback_allowed {
                            continue;
                        }
                        return Err(attempt_err.error);
                    }
                }
            }

            Err(LlmGatewayError::ProviderFailure(
                "no_openai_model_candidates".to_string(),
            ))
        })
    }
}

impl ImageSynthesisGateway for OpenAiGateway {
    fn synthesize<'a>(&'a self, request: ImageSynthesisRequest) -> ImageSynthesisFuture<'a> {
        Box::pin(async move {
            let settings = &self.config.image;
            let request_body = json!({
                "model": settings.model,
                "prompt": request.prompt,
                "size": settings.size,
                "quality": settings.quality,
                "n": 1
            });

            let (body, _) = self
                .post_json(&self.config.image_generations_url(), &request_body)
                .await
                .map_err(|attempt_err| attempt_err.error)?;

            let parsed: ImageGenerationResponse = serde_json::from_str(&body).map_err(|_| {
                LlmGatewayError::InvalidProviderPayload("response_json_parse_failed".to_string())
            })?;
            let image = parsed.data.into_iter().next().ok_or_else(|| {
                LlmGatewayError::InvalidProviderPayload("missing_image".to_string())
            })?;

            let image_url = match (image.url, image.b64_json) {
                (Some(url), _) if !url.trim().is_empty() => url,
                (_, Some(encoded)) if !encoded.trim().is_empty() => {
                    format!("data:image/png;base64,{encoded}")
                }
                _ => {
                    return Err(LlmGatewayError::InvalidProviderPayload(
                        "missing_image_reference".to_string(),
                    ));
                }
            };

            Ok(ImageSynthesisResponse {
                model: settings.model.clone(),
                image_url,
                revised_prompt: image.revised_prompt,
            })
        })
    }
}

#[derive(Debug)]
struct SendAttemptError {
    error: LlmGatewayError,
    fallback_allowed: bool,
}

impl SendAttemptError {
    fn new(error: LlmGatewayError, fallback_allowed: bool) -> Self {
        Self {
            error,
            fallback_allowed,
        }
    }
}

#[derive(Debug, Deserialize)]
struct ChatCompletionResponse {
    id: Option<String>,
    model: Option<String>,
    choices: Vec<ChatChoice>,
    usage: Option<ChatUsage>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatMessage,
}

#[derive(Debug, Deserialize)]
struct ChatMessage {
    content: Value,
}

#[derive(Debug, Deserialize)]
struct ChatUsage {
    prompt_tokens: Option<u64>,
    completion_tokens: Option<u64>,
    total_tokens: Option<u64>,
}

#[derive(Debug, Deserialize)]
struct ImageGenerationResponse {
    data: Vec<GeneratedImage>,
}

#[derive(Debug, Deserialize)]
struct GeneratedImage {
    url: Option<String>,
    b64_json: Option<String>,
    revised_prompt: Option<String>,
}

/// Models occasionally wrap JSON in a markdown fence even in json mode.
fn strip_code_fence(raw: &str) -> &str {
    let trimmed = raw.trim();
    let Some(inner) = trimmed.strip_prefix("```") else {
        return trimmed;
    };
    let inner = inner.strip_prefix("json").unwrap_or(inner);
    inner.strip_suffix("```").unwrap_or(inner).trim()
}

fn header_request_id(headers: &reqwest::header::HeaderMap) -> Option<String> {
    headers
        .get("x-request-id")
        .and_then(|value| value.to_str().ok())
        .map(ToString::to_string)
}

fn parse_provider_error_code(body: &str) -> String {
    #[derive(Deserialize)]
    struct ProviderErrorEnvelope {
        error: Option<ProviderErrorDetails>,
    }

    #[derive(Deserialize)]
    struct ProviderErrorDetails {
        code: Option<Value>,
    }

    let parsed = serde_json::from_str::<ProviderErrorEnvelope>(body).ok();
    let Some(provider_error_code) = parsed
        .and_then(|envelope| envelope.error)
        .and_then(|details| details.code)
    else {
        return "unknown".to_string();
    };

    match provider_error_code {
        Value::String(code) => code,
        Value::Number(code) => code.to_string(),
        _ => "unknown".to_string(),
    }
}

fn clamp_u64_to_u32(value: u64) -> u32 {
    value.min(u32::MAX as u64) as u32
}
