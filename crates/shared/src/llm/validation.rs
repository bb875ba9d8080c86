use jsonschema::JSONSchema;
use serde_json::Value;
use std::sync::LazyLock;
use thiserror::Error;

use super::contracts::{
    ContractError, GenerationCapability, GenerationOutputContract, output_schema, parse_contract,
};

#[derive(Debug, Error)]
pub enum OutputValidationError {
    #[error("model output is not valid json: {0}")]
    InvalidJson(#[from] serde_json::Error),
    #[error("output schema for {capability:?} failed to compile: {message}")]
    SchemaCompile {
        capability: GenerationCapability,
        message: String,
    },
    #[error("model output failed schema validation for {capability:?}: {errors:?}")]
    SchemaViolation {
        capability: GenerationCapability,
        errors: Vec<String>,
    },
    #[error(transparent)]
    Contract(#[from] ContractError),
}

pub fn validate_output_json(
    capability: GenerationCapability,
    raw_json: &str,
) -> Result<GenerationOutputContract, OutputValidationError> {
    let payload: Value = serde_json::from_str(raw_json)?;
    validate_output_value(capability, &payload)
}

pub fn validate_output_value(
    capability: GenerationCapability,
    payload: &Value,
) -> Result<GenerationOutputContract, OutputValidationError> {
    let validator = validator_for_capability(capability)?;

    if let Err(validation_errors) = validator.validate(payload) {
        let errors = validation_errors
            .map(|err| err.to_string())
            .collect::<Vec<_>>();
        return Err(OutputValidationError::SchemaViolation { capability, errors });
    }

    parse_contract(capability, payload.clone()).map_err(OutputValidationError::from)
}

static PHOTO_ANALYSIS_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&output_schema(GenerationCapability::PhotoAnalysis))
        .map_err(|err| err.to_string())
});

static POSTCARD_CAPTION_VALIDATOR: LazyLock<Result<JSONSchema, String>> = LazyLock::new(|| {
    JSONSchema::compile(&output_schema(GenerationCapability::PostcardCaption))
        .map_err(|err| err.to_string())
});

fn validator_for_capability(
    capability: GenerationCapability,
) -> Result<&'static JSONSchema, OutputValidationError> {
    let validator_result = match capability {
        GenerationCapability::PhotoAnalysis => &*PHOTO_ANALYSIS_VALIDATOR,
        GenerationCapability::PostcardCaption => &*POSTCARD_CAPTION_VALIDATOR,
    };

    validator_result
        .as_ref()
        .map_err(|message| OutputValidationError::SchemaCompile {
            capability,
            message: message.clone(),
        })
}
