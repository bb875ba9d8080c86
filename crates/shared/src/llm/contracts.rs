use schemars::{JsonSchema, schema_for};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use thiserror::Error;

pub const OUTPUT_CONTRACT_VERSION_V1: &str = "2026-10-01";

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, JsonSchema)]
#[serde(rename_all = "snake_case")]
pub enum GenerationCapability {
    PhotoAnalysis,
    PostcardCaption,
}

impl GenerationCapability {
    pub const fn contract_version(self) -> &'static str {
        OUTPUT_CONTRACT_VERSION_V1
    }

    pub const fn label(self) -> &'static str {
        match self {
            Self::PhotoAnalysis => "photo_analysis",
            Self::PostcardCaption => "postcard_caption",
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PhotoAnalysisContract {
    pub version: String,
    pub output: PhotoAnalysisOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PhotoAnalysisOutput {
    /// One or two sentences describing what the photo shows.
    pub scene_description: String,
    /// Dominant colors, most visually salient first.
    pub dominant_colors: Vec<String>,
    /// Single-word overall mood, e.g. serene, bustling, nostalgic.
    pub mood: String,
    pub notable_elements: Vec<String>,
    #[serde(default)]
    pub scene_category: Option<String>,
    #[serde(default)]
    pub lighting: Option<String>,
    #[serde(default)]
    pub time_of_day: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostcardCaptionContract {
    pub version: String,
    pub output: PostcardCaptionOutput,
}

#[derive(Debug, Clone, Serialize, Deserialize, JsonSchema)]
pub struct PostcardCaptionOutput {
    /// One sentence for the back of a postcard.
    pub caption: String,
}

#[derive(Debug, Clone)]
pub enum GenerationOutputContract {
    PhotoAnalysis(PhotoAnalysisContract),
    PostcardCaption(PostcardCaptionContract),
}

#[derive(Debug, Error)]
pub enum ContractError {
    #[error("output does not match {capability:?} contract: {source}")]
    Decode {
        capability: GenerationCapability,
        source: serde_json::Error,
    },
    #[error("unsupported contract version {found}, expected {expected}")]
    VersionMismatch {
        expected: &'static str,
        found: String,
    },
}

pub fn output_schema(capability: GenerationCapability) -> Value {
    let schema = match capability {
        GenerationCapability::PhotoAnalysis => schema_for!(PhotoAnalysisContract),
        GenerationCapability::PostcardCaption => schema_for!(PostcardCaptionContract),
    };
    serde_json::to_value(schema).unwrap_or(Value::Null)
}

pub(crate) fn parse_contract(
    capability: GenerationCapability,
    payload: Value,
) -> Result<GenerationOutputContract, ContractError> {
    let decode_err = |source| ContractError::Decode { capability, source };

    let contract = match capability {
        GenerationCapability::PhotoAnalysis => GenerationOutputContract::PhotoAnalysis(
            serde_json::from_value(payload).map_err(decode_err)?,
        ),
        GenerationCapability::PostcardCaption => GenerationOutputContract::PostcardCaption(
            serde_json::from_value(payload).map_err(decode_err)?,
        ),
    };

    let version = match &contract {
        GenerationOutputContract::PhotoAnalysis(inner) => inner.version.as_str(),
        GenerationOutputContract::PostcardCaption(inner) => inner.version.as_str(),
    };
    let expected = capability.contract_version();
    if version != expected {
        return Err(ContractError::VersionMismatch {
            expected,
            found: version.to_string(),
        });
    }

    Ok(contract)
}
