use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use super::error::PipelineError;

pub const DEFAULT_LOCATION_LABEL: &str = "my trip";
pub const MAX_LOCATION_LABEL_CHARS: usize = 200;
pub const MAX_USER_DESCRIPTION_CHARS: usize = 1000;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ArtStyle {
    VintagePostcard,
    #[serde(alias = "watercolor_illustration")]
    Watercolor,
    Collage,
    GraphicLineArt,
}

impl ArtStyle {
    pub const ALL: [Self; 4] = [
        Self::VintagePostcard,
        Self::Watercolor,
        Self::Collage,
        Self::GraphicLineArt,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::VintagePostcard => "vintage_postcard",
            Self::Watercolor => "watercolor",
            Self::Collage => "collage",
            Self::GraphicLineArt => "graphic_line_art",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::VintagePostcard => "Vintage Postcard",
            Self::Watercolor => "Watercolor Illustration",
            Self::Collage => "Collage",
            Self::GraphicLineArt => "Graphic Line Art",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::VintagePostcard => "Retro 1950s travel poster aesthetic",
            Self::Watercolor => "Soft, flowing watercolor painting style",
            Self::Collage => "Layered paper cutout mixed media style",
            Self::GraphicLineArt => "Bold outlines with flat colors",
        }
    }
}

impl FromStr for ArtStyle {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "vintage_postcard" => Ok(Self::VintagePostcard),
            "watercolor" | "watercolor_illustration" => Ok(Self::Watercolor),
            "collage" => Ok(Self::Collage),
            "graphic_line_art" => Ok(Self::GraphicLineArt),
            _ => Err(PipelineError::InvalidInput(format!(
                "Invalid art_style '{}'. Must be one of: vintage_postcard, watercolor, collage, graphic_line_art",
                raw.trim()
            ))),
        }
    }
}

impl fmt::Display for ArtStyle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptionTone {
    Artistic,
    Satirical,
    Dramatic,
    Minimalist,
}

impl CaptionTone {
    pub const ALL: [Self; 4] = [
        Self::Artistic,
        Self::Satirical,
        Self::Dramatic,
        Self::Minimalist,
    ];

    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Artistic => "artistic",
            Self::Satirical => "satirical",
            Self::Dramatic => "dramatic",
            Self::Minimalist => "minimalist",
        }
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::Artistic => "Artistic",
            Self::Satirical => "Satirical",
            Self::Dramatic => "Dramatic",
            Self::Minimalist => "Minimalist",
        }
    }

    pub const fn description(self) -> &'static str {
        match self {
            Self::Artistic => "Poetic and evocative",
            Self::Satirical => "Witty and self-aware humor",
            Self::Dramatic => "Bold and cinematic",
            Self::Minimalist => "Brief and understated",
        }
    }
}

impl FromStr for CaptionTone {
    type Err = PipelineError;

    fn from_str(raw: &str) -> Result<Self, Self::Err> {
        match raw.trim().to_ascii_lowercase().as_str() {
            "artistic" => Ok(Self::Artistic),
            "satirical" => Ok(Self::Satirical),
            "dramatic" => Ok(Self::Dramatic),
            "minimalist" => Ok(Self::Minimalist),
            _ => Err(PipelineError::InvalidInput(format!(
                "Invalid caption_tone '{}'. Must be one of: artistic, satirical, dramatic, minimalist",
                raw.trim()
            ))),
        }
    }
}

impl fmt::Display for CaptionTone {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// An uploaded photo as received from the caller.
#[derive(Debug, Clone)]
pub struct PhotoUpload {
    pub filename: Option<String>,
    pub bytes: Vec<u8>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PhotoAnalysis {
    pub scene_description: String,
    /// Insertion order is visual salience.
    pub colors: Vec<String>,
    pub mood: String,
    pub notable_elements: Vec<String>,
    pub scene_category: Option<String>,
    pub lighting: Option<String>,
    pub time_of_day: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TripSummary {
    pub overall_theme: String,
    pub unified_palette: Vec<String>,
    pub dominant_mood: String,
    pub key_motifs: Vec<String>,
    pub location_label: String,
    pub user_description: Option<String>,
    pub photo_count: usize,
    pub primary_scene: Option<String>,
    pub lighting: Option<String>,
    pub time_of_day: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct GenerationRequest {
    pub art_style: ArtStyle,
    pub caption_tone: CaptionTone,
    pub location_label: String,
    pub user_description: Option<String>,
}

impl GenerationRequest {
    /// Builds a request from raw form values. Blank locations fall back to
    /// [`DEFAULT_LOCATION_LABEL`]; unknown style or tone values and overlong
    /// free text are rejected.
    pub fn parse(
        art_style: &str,
        caption_tone: &str,
        location_label: Option<&str>,
        user_description: Option<&str>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            art_style: art_style.parse()?,
            caption_tone: caption_tone.parse()?,
            location_label: normalize_location_label(location_label)?
                .unwrap_or_else(|| DEFAULT_LOCATION_LABEL.to_string()),
            user_description: normalize_user_description(user_description)?,
        })
    }
}

/// Fields a regenerate call may change. Anything left unset falls back to the
/// request that created the session.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct RegenerationOverrides {
    pub art_style: Option<ArtStyle>,
    pub caption_tone: Option<CaptionTone>,
    pub location_label: Option<String>,
    pub user_description: Option<String>,
}

impl RegenerationOverrides {
    pub fn parse(
        art_style: Option<&str>,
        caption_tone: Option<&str>,
        location_label: Option<&str>,
        user_description: Option<&str>,
    ) -> Result<Self, PipelineError> {
        Ok(Self {
            art_style: art_style.map(str::parse).transpose()?,
            caption_tone: caption_tone.map(str::parse).transpose()?,
            location_label: normalize_location_label(location_label)?,
            user_description: normalize_user_description(user_description)?,
        })
    }

    pub fn merge_onto(self, original: &GenerationRequest) -> GenerationRequest {
        GenerationRequest {
            art_style: self.art_style.unwrap_or(original.art_style),
            caption_tone: self.caption_tone.unwrap_or(original.caption_tone),
            location_label: self
                .location_label
                .unwrap_or_else(|| original.location_label.clone()),
            user_description: self
                .user_description
                .or_else(|| original.user_description.clone()),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostcardImage {
    pub image_url: String,
    pub prompt_used: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub revised_prompt: Option<String>,
    pub art_style: ArtStyle,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct PostcardCaption {
    pub caption: String,
    pub location_label: String,
    pub caption_tone: CaptionTone,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Postcard {
    pub image: PostcardImage,
    pub caption: PostcardCaption,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Session {
    pub session_id: String,
    pub trip_summary: TripSummary,
    pub original_request: GenerationRequest,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
}

fn normalize_location_label(raw: Option<&str>) -> Result<Option<String>, PipelineError> {
    bounded_text("location_label", raw, MAX_LOCATION_LABEL_CHARS)
}

fn normalize_user_description(raw: Option<&str>) -> Result<Option<String>, PipelineError> {
    bounded_text("user_description", raw, MAX_USER_DESCRIPTION_CHARS)
}

fn bounded_text(
    field: &str,
    raw: Option<&str>,
    max_chars: usize,
) -> Result<Option<String>, PipelineError> {
    let Some(value) = raw.map(str::trim).filter(|value| !value.is_empty()) else {
        return Ok(None);
    };
    if value.chars().count() > max_chars {
        return Err(PipelineError::InvalidInput(format!(
            "{field} must be at most {max_chars} characters"
        )));
    }

    Ok(Some(value.to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_known_styles_and_legacy_watercolor_alias() {
        assert_eq!("watercolor".parse::<ArtStyle>().ok(), Some(ArtStyle::Watercolor));
        assert_eq!(
            "watercolor_illustration".parse::<ArtStyle>().ok(),
            Some(ArtStyle::Watercolor)
        );
        assert_eq!(
            " Graphic_Line_Art ".parse::<ArtStyle>().ok(),
            Some(ArtStyle::GraphicLineArt)
        );
    }

    #[test]
    fn unknown_style_and_tone_are_invalid_input() {
        assert!(matches!(
            "oil_painting".parse::<ArtStyle>(),
            Err(PipelineError::InvalidInput(_))
        ));
        assert!(matches!(
            "sarcastic".parse::<CaptionTone>(),
            Err(PipelineError::InvalidInput(_))
        ));
    }

    #[test]
    fn blank_location_defaults_to_my_trip() {
        let request = GenerationRequest::parse("collage", "artistic", Some("   "), Some(""))
            .expect("request should parse");

        assert_eq!(request.location_label, DEFAULT_LOCATION_LABEL);
        assert_eq!(request.user_description, None);
    }

    #[test]
    fn overrides_fall_back_to_original_request() {
        let original = GenerationRequest::parse(
            "watercolor",
            "dramatic",
            Some("Rome, Fall 2024"),
            Some("pasta and ruins"),
        )
        .expect("original should parse");

        let merged = RegenerationOverrides::parse(Some("collage"), None, Some(" "), None)
            .expect("overrides should parse")
            .merge_onto(&original);

        assert_eq!(merged.art_style, ArtStyle::Collage);
        assert_eq!(merged.caption_tone, CaptionTone::Dramatic);
        assert_eq!(merged.location_label, "Rome, Fall 2024");
        assert_eq!(merged.user_description.as_deref(), Some("pasta and ruins"));
    }

    #[test]
    fn overlong_free_text_is_invalid_input() {
        let long_location = "R".repeat(MAX_LOCATION_LABEL_CHARS + 1);
        assert!(matches!(
            GenerationRequest::parse("collage", "artistic", Some(&long_location), None),
            Err(PipelineError::InvalidInput(message)) if message.contains("location_label")
        ));

        let long_description = "a".repeat(MAX_USER_DESCRIPTION_CHARS + 1);
        assert!(matches!(
            RegenerationOverrides::parse(None, None, None, Some(&long_description)),
            Err(PipelineError::InvalidInput(message)) if message.contains("user_description")
        ));
    }

    #[test]
    fn length_limits_count_characters_after_trimming() {
        let accented = format!("  {}  ", "é".repeat(MAX_LOCATION_LABEL_CHARS));
        let request = GenerationRequest::parse("collage", "artistic", Some(&accented), None)
            .expect("label at the limit should parse");
        assert_eq!(
            request.location_label.chars().count(),
            MAX_LOCATION_LABEL_CHARS
        );

        let description = "b".repeat(MAX_USER_DESCRIPTION_CHARS);
        let overrides = RegenerationOverrides::parse(None, None, None, Some(&description))
            .expect("description at the limit should parse");
        assert_eq!(overrides.user_description, Some(description));
    }

    #[test]
    fn art_style_serializes_as_snake_case() {
        let value = serde_json::to_value(ArtStyle::GraphicLineArt).expect("style serializes");
        assert_eq!(value, "graphic_line_art");
        let parsed: ArtStyle =
            serde_json::from_value(serde_json::json!("watercolor_illustration"))
                .expect("alias deserializes");
        assert_eq!(parsed, ArtStyle::Watercolor);
    }
}
