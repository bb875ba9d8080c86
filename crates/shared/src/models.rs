use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::postcard::{ArtStyle, CaptionTone, Postcard};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PostcardResponse {
    pub success: bool,
    pub session_id: String,
    pub postcard: Postcard,
}

/// JSON body for `POST /api/regenerate`. Unset fields reuse the session's originals.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RegenerateRequest {
    pub session_id: String,
    #[serde(default)]
    pub location_label: Option<String>,
    #[serde(default)]
    pub art_style: Option<String>,
    #[serde(default)]
    pub caption_tone: Option<String>,
    #[serde(default)]
    pub user_description: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct HealthResponse {
    pub status: String,
    pub service: String,
    pub timestamp: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StyleOption<T> {
    pub id: T,
    pub name: String,
    pub description: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StylesResponse {
    pub art_styles: Vec<StyleOption<ArtStyle>>,
    pub caption_tones: Vec<StyleOption<CaptionTone>>,
}

impl StylesResponse {
    pub fn catalog() -> Self {
        Self {
            art_styles: ArtStyle::ALL
                .iter()
                .map(|style| StyleOption {
                    id: *style,
                    name: style.label().to_string(),
                    description: style.description().to_string(),
                })
                .collect(),
            caption_tones: CaptionTone::ALL
                .iter()
                .map(|tone| StyleOption {
                    id: *tone,
                    name: tone.label().to_string(),
                    description: tone.description().to_string(),
                })
                .collect(),
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SessionStatusResponse {
    pub success: bool,
    pub session_id: String,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub photo_count: usize,
    pub location_label: String,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct FailureResponse {
    pub success: bool,
    pub error: String,
    pub error_code: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn regenerate_request_only_requires_session_id() {
        let request: RegenerateRequest =
            serde_json::from_str(r#"{"session_id":"abc","art_style":"collage"}"#)
                .expect("request parses");

        assert_eq!(request.session_id, "abc");
        assert_eq!(request.art_style.as_deref(), Some("collage"));
        assert!(request.caption_tone.is_none());
    }

    #[test]
    fn catalog_lists_every_style_and_tone() {
        let catalog = serde_json::to_value(StylesResponse::catalog()).expect("serializes");

        assert_eq!(catalog["art_styles"].as_array().map(Vec::len), Some(4));
        assert_eq!(catalog["caption_tones"].as_array().map(Vec::len), Some(4));
        assert_eq!(catalog["art_styles"][1]["id"], "watercolor");
    }
}
