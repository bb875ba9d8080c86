use std::sync::Arc;

use serde_json::json;
use tracing::debug;

use crate::llm::{
    GenerationCapability, GenerationOutputContract, LlmGateway, LlmGatewayRequest,
    LlmReliabilityConfig, UpstreamCall, call_upstream, template_for_capability,
    validate_output_value,
};

use super::error::PipelineError;
use super::types::{CaptionTone, PostcardCaption, TripSummary};

pub const MAX_CAPTION_CHARS: usize = 200;

const ELLIPSIS: char = '…';
const CONTEXT_COLORS: usize = 4;
const CONTEXT_MOTIFS: usize = 5;

fn tone_instruction(tone: CaptionTone) -> &'static str {
    match tone {
        CaptionTone::Artistic => {
            "Write in an artistic, poetic tone that evokes imagery and emotion. Use metaphor and \
             sensory language. Be evocative but not pretentious."
        }
        CaptionTone::Satirical => {
            "Write in a satirical, witty tone that gently pokes fun at travel cliches while still \
             being affectionate. Use irony and self-aware humor."
        }
        CaptionTone::Dramatic => {
            "Write in a dramatic, cinematic tone that makes the ordinary feel epic. Use bold \
             statements and emotional weight."
        }
        CaptionTone::Minimalist => {
            "Write in a minimalist, understated tone. Be brief and subtle. Use few words with \
             maximum impact."
        }
    }
}

pub struct CaptionGenerator {
    gateway: Arc<dyn LlmGateway>,
    reliability: LlmReliabilityConfig,
}

impl CaptionGenerator {
    pub fn new(gateway: Arc<dyn LlmGateway>, reliability: LlmReliabilityConfig) -> Self {
        Self {
            gateway,
            reliability,
        }
    }

    pub async fn generate_caption(
        &self,
        summary: &TripSummary,
        location_label: &str,
        tone: CaptionTone,
    ) -> Result<PostcardCaption, PipelineError> {
        let location = match location_label.trim() {
            "" => summary.location_label.clone(),
            trimmed => trimmed.to_string(),
        };
        debug!(caption_tone = %tone, "requesting postcard caption");

        let raw = call_upstream(&self.reliability, UpstreamCall::Caption, || {
            self.request_caption(summary, &location, tone)
        })
        .await?;

        Ok(PostcardCaption {
            caption: finalize_caption(&raw, &location)?,
            location_label: location,
            caption_tone: tone,
        })
    }

    async fn request_caption(
        &self,
        summary: &TripSummary,
        location: &str,
        tone: CaptionTone,
    ) -> Result<String, PipelineError> {
        let template = template_for_capability(GenerationCapability::PostcardCaption);
        let request = LlmGatewayRequest::from_template(
            template,
            json!({
                "location": location,
                "tone": tone.as_str(),
                "tone_instruction": tone_instruction(tone),
                "theme": summary.overall_theme,
                "dominant_mood": summary.dominant_mood,
                "key_motifs": summary.key_motifs.iter().take(CONTEXT_MOTIFS).collect::<Vec<_>>(),
                "palette": summary.unified_palette.iter().take(CONTEXT_COLORS).collect::<Vec<_>>(),
                "user_description": summary.user_description,
            }),
        );

        let response = self
            .gateway
            .generate(request)
            .await
            .map_err(|err| PipelineError::from_gateway(err, UpstreamCall::Caption))?;

        let contract =
            validate_output_value(GenerationCapability::PostcardCaption, &response.output)
                .map_err(|err| PipelineError::from_validation(err, UpstreamCall::Caption))?;

        match contract {
            GenerationOutputContract::PostcardCaption(contract) => Ok(contract.output.caption),
            GenerationOutputContract::PhotoAnalysis(_) => Err(PipelineError::UpstreamGeneration(
                "caption returned an analysis contract".to_string(),
            )),
        }
    }
}

/// Normalizes model text into a postcard caption: single-spaced, mentioning the
/// location, and at most [`MAX_CAPTION_CHARS`] characters.
pub fn finalize_caption(raw: &str, location_label: &str) -> Result<String, PipelineError> {
    let collapsed = raw
        .split_whitespace()
        .collect::<Vec<_>>()
        .join(" ")
        .trim_matches('"')
        .trim()
        .to_string();
    if collapsed.is_empty() {
        return Err(PipelineError::UpstreamGeneration(
            "caption was empty".to_string(),
        ));
    }

    let caption = if mentions_location(&collapsed, location_label) {
        collapsed
    } else {
        format!("{}: {collapsed}", location_label.trim())
    };

    Ok(truncate_chars(caption, MAX_CAPTION_CHARS))
}

/// True when the caption names the full label or its leading place name
/// ("Rome" for "Rome, Fall 2024").
fn mentions_location(caption: &str, location_label: &str) -> bool {
    let caption = caption.to_lowercase();
    let label = location_label.trim().to_lowercase();
    if label.is_empty() || caption.contains(&label) {
        return true;
    }
    label
        .split(',')
        .next()
        .map(str::trim)
        .is_some_and(|place| !place.is_empty() && caption.contains(place))
}

fn truncate_chars(value: String, max_chars: usize) -> String {
    if value.chars().count() <= max_chars {
        return value;
    }
    let mut truncated = value
        .chars()
        .take(max_chars.saturating_sub(1))
        .collect::<String>()
        .trim_end()
        .to_string();
    truncated.push(ELLIPSIS);
    truncated
}
