use serde_json::Value;

use super::contracts::{GenerationCapability, output_schema};

#[derive(Debug, Clone)]
pub struct PromptTemplate {
    pub capability: GenerationCapability,
    pub contract_version: &'static str,
    pub system_prompt: &'static str,
    pub context_prompt: &'static str,
    pub output_schema: Value,
    pub temperature: f32,
}

pub fn template_for_capability(capability: GenerationCapability) -> PromptTemplate {
    let (system_prompt, context_prompt, temperature) = match capability {
        GenerationCapability::PhotoAnalysis => (
            "You analyze personal travel photos for an illustrated postcard studio. Describe only what is visible.",
            "Analyze the attached photo. List dominant colors most salient first, name one overall mood, \
             and 3-5 notable elements. Return JSON only, matching output_schema, echoing contract_version as version.",
            0.2,
        ),
        GenerationCapability::PostcardCaption => (
            "You write evocative, personal travel captions that capture lived experience rather than tourist cliches.",
            "Write a single one-sentence postcard caption (at most ~20 words) in the requested tone. \
             Mention the location and reflect the trip's mood and theme. Return JSON only, matching \
             output_schema, echoing contract_version as version.",
            0.8,
        ),
    };

    PromptTemplate {
        capability,
        contract_version: capability.contract_version(),
        system_prompt,
        context_prompt,
        output_schema: output_schema(capability),
        temperature,
    }
}
