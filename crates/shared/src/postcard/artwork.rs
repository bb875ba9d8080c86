use std::sync::Arc;

use tracing::debug;

use crate::llm::{
    ImageSynthesisGateway, ImageSynthesisRequest, LlmReliabilityConfig, UpstreamCall,
    call_upstream,
};

use super::aggregate::join_with_and;
use super::error::PipelineError;
use super::types::{ArtStyle, PostcardImage, TripSummary};

const PROMPT_COLORS: usize = 4;
const PROMPT_MOTIFS: usize = 4;

fn style_fragment(style: ArtStyle) -> &'static str {
    match style {
        ArtStyle::VintagePostcard => {
            "vintage postcard style, retro illustration, 1950s travel poster aesthetic, \
             slightly faded colors, nostalgic feel, classic typography-ready composition"
        }
        ArtStyle::Watercolor => {
            "watercolor illustration style, soft edges, flowing colors, artistic brushstrokes, \
             paper texture, hand-painted aesthetic"
        }
        ArtStyle::Collage => {
            "artistic collage style, layered paper cutouts, mixed media aesthetic, overlapping \
             elements, textured surfaces, creative composition"
        }
        ArtStyle::GraphicLineArt => {
            "graphic line art style, bold outlines, clean vector-like illustration, minimal \
             shading, modern graphic design aesthetic, flat colors with strong contrast"
        }
    }
}

/// Builds the synthesis prompt. Pure: the same summary, style and location always
/// give the same prompt.
pub fn build_image_prompt(summary: &TripSummary, style: ArtStyle, location_label: &str) -> String {
    let location = resolve_location(summary, location_label);
    let colors = summary
        .unified_palette
        .iter()
        .take(PROMPT_COLORS)
        .cloned()
        .collect::<Vec<_>>();
    let motifs = summary
        .key_motifs
        .iter()
        .take(PROMPT_MOTIFS)
        .cloned()
        .collect::<Vec<_>>();

    let mut parts = vec![
        format!("A stylized postcard illustration of {location}."),
        format!("Theme: {}.", summary.overall_theme),
    ];
    if !colors.is_empty() {
        parts.push(format!("Color palette features {}.", join_with_and(&colors)));
    }
    parts.push(format!("The mood is {}.", summary.dominant_mood));
    parts.push(format!(
        "Include symbolic references to {}.",
        join_with_and(&motifs)
    ));
    match (summary.lighting.as_deref(), summary.time_of_day.as_deref()) {
        (Some(lighting), Some(time_of_day)) => {
            parts.push(format!("Lighting: {lighting}, {time_of_day}."));
        }
        (Some(light), None) | (None, Some(light)) => parts.push(format!("Lighting: {light}.")),
        (None, None) => {}
    }
    if let Some(description) = summary.user_description.as_deref() {
        parts.push(format!("Trip essence: {description}."));
    }
    parts.push(format!("Art style: {}.", style_fragment(style)));
    parts.push(
        "It should read as a personal travel postcard that summarizes a journey, not a generic \
         tourist image. Symbolic and artistic, not photorealistic. No text or lettering."
            .to_string(),
    );

    parts.join(" ")
}

fn resolve_location<'a>(summary: &'a TripSummary, location_label: &'a str) -> &'a str {
    match location_label.trim() {
        "" => summary.location_label.as_str(),
        trimmed => trimmed,
    }
}

pub struct ImageGenerator {
    gateway: Arc<dyn ImageSynthesisGateway>,
    reliability: LlmReliabilityConfig,
}

impl ImageGenerator {
    pub fn new(gateway: Arc<dyn ImageSynthesisGateway>, reliability: LlmReliabilityConfig) -> Self {
        Self {
            gateway,
            reliability,
        }
    }

    pub async fn generate_image(
        &self,
        summary: &TripSummary,
        art_style: ArtStyle,
        location_label: &str,
    ) -> Result<PostcardImage, PipelineError> {
        let prompt = build_image_prompt(summary, art_style, location_label);
        debug!(art_style = %art_style, prompt_chars = prompt.len(), "requesting postcard image");

        let response = call_upstream(&self.reliability, UpstreamCall::ImageSynthesis, || async {
            self.gateway
                .synthesize(ImageSynthesisRequest {
                    prompt: prompt.clone(),
                })
                .await
                .map_err(|err| PipelineError::from_gateway(err, UpstreamCall::ImageSynthesis))
        })
        .await?;

        if response.image_url.trim().is_empty() {
            return Err(PipelineError::UpstreamGeneration(
                "image synthesis returned no image".to_string(),
            ));
        }

        Ok(PostcardImage {
            image_url: response.image_url,
            prompt_used: prompt,
            revised_prompt: response.revised_prompt,
            art_style,
        })
    }
}
