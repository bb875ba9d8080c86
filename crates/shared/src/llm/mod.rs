pub mod contracts;
pub mod gateway;
pub mod openai;
pub mod prompts;
pub mod reliability;
pub mod validation;

pub use contracts::{
    ContractError, GenerationCapability, GenerationOutputContract, PhotoAnalysisContract,
    PhotoAnalysisOutput, PostcardCaptionContract, PostcardCaptionOutput, output_schema,
};
pub use gateway::{
    ImageAttachment, ImageSynthesisGateway, ImageSynthesisRequest, ImageSynthesisResponse,
    LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmGatewayResponse,
};
pub use openai::{
    GatewayConfigError, OpenAiGateway, OpenAiGatewayConfig, OpenAiImageSettings, OpenAiModelRoute,
};
pub use prompts::{PromptTemplate, template_for_capability};
pub use reliability::{
    CallTimedOut, LlmReliabilityConfig, RetryClass, RetryPolicy, Retryable, UpstreamCall,
    call_upstream,
};
pub use validation::{OutputValidationError, validate_output_json, validate_output_value};
