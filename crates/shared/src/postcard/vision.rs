use std::path::Path;
use std::sync::Arc;

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD;
use image::{GenericImageView, ImageFormat};
use serde_json::json;
use tracing::debug;

use crate::llm::{
    GenerationCapability, GenerationOutputContract, ImageAttachment, LlmGateway,
    LlmGatewayRequest, LlmReliabilityConfig, PhotoAnalysisOutput, UpstreamCall, call_upstream,
    template_for_capability, validate_output_value,
};

use super::error::PipelineError;
use super::types::{PhotoAnalysis, PhotoUpload};

pub const ALLOWED_EXTENSIONS: [&str; 5] = ["png", "jpg", "jpeg", "gif", "webp"];

const IMAGE_DETAIL: &str = "low";

/// A photo that passed local validation and is ready to send upstream.
#[derive(Debug, Clone)]
pub struct PreparedPhoto {
    pub format: ImageFormat,
    pub width: u32,
    pub height: u32,
    data_url: String,
}

pub struct VisionAnalyzer {
    gateway: Arc<dyn LlmGateway>,
    reliability: LlmReliabilityConfig,
    max_photo_bytes: usize,
}

impl VisionAnalyzer {
    pub fn new(
        gateway: Arc<dyn LlmGateway>,
        reliability: LlmReliabilityConfig,
        max_photo_bytes: usize,
    ) -> Self {
        Self {
            gateway,
            reliability,
            max_photo_bytes,
        }
    }

    /// Checks size, extension and decodability without touching the network.
    pub fn prepare(&self, upload: &PhotoUpload) -> Result<PreparedPhoto, PipelineError> {
        let label = upload.filename.as_deref().unwrap_or("photo");

        if upload.bytes.is_empty() {
            return Err(PipelineError::InvalidInput(format!("{label} is empty")));
        }
        if upload.bytes.len() > self.max_photo_bytes {
            return Err(PipelineError::InvalidInput(format!(
                "{label} exceeds the {} byte limit",
                self.max_photo_bytes
            )));
        }
        if let Some(filename) = upload.filename.as_deref() {
            ensure_allowed_extension(filename)?;
        }

        let format = image::guess_format(&upload.bytes).map_err(|_| {
            PipelineError::InvalidInput(format!("{label} is not a supported image"))
        })?;
        if !matches!(
            format,
            ImageFormat::Png | ImageFormat::Jpeg | ImageFormat::Gif | ImageFormat::WebP
        ) {
            return Err(PipelineError::InvalidInput(format!(
                "{label} is not a supported image"
            )));
        }
        let decoded = image::load_from_memory_with_format(&upload.bytes, format).map_err(|_| {
            PipelineError::InvalidInput(format!("{label} could not be decoded"))
        })?;
        let (width, height) = decoded.dimensions();

        Ok(PreparedPhoto {
            format,
            width,
            height,
            data_url: format!(
                "data:{};base64,{}",
                format.to_mime_type(),
                STANDARD.encode(&upload.bytes)
            ),
        })
    }

    pub async fn analyze_prepared(
        &self,
        photo: &PreparedPhoto,
    ) -> Result<PhotoAnalysis, PipelineError> {
        debug!(
            width = photo.width,
            height = photo.height,
            format = photo.format.to_mime_type(),
            "requesting photo analysis"
        );

        call_upstream(&self.reliability, UpstreamCall::Analysis, || {
            self.request_analysis(photo)
        })
        .await
    }

    pub async fn analyze(&self, upload: &PhotoUpload) -> Result<PhotoAnalysis, PipelineError> {
        let photo = self.prepare(upload)?;
        self.analyze_prepared(&photo).await
    }

    async fn request_analysis(&self, photo: &PreparedPhoto) -> Result<PhotoAnalysis, PipelineError> {
        let template = template_for_capability(GenerationCapability::PhotoAnalysis);
        let request = LlmGatewayRequest::from_template(
            template,
            json!({ "width": photo.width, "height": photo.height }),
        )
        .with_image(ImageAttachment {
            data_url: photo.data_url.clone(),
            detail: IMAGE_DETAIL,
        });

        let response = self
            .gateway
            .generate(request)
            .await
            .map_err(|err| PipelineError::from_gateway(err, UpstreamCall::Analysis))?;

        let contract =
            validate_output_value(GenerationCapability::PhotoAnalysis, &response.output)
                .map_err(|err| PipelineError::from_validation(err, UpstreamCall::Analysis))?;

        match contract {
            GenerationOutputContract::PhotoAnalysis(contract) => {
                into_photo_analysis(contract.output)
            }
            GenerationOutputContract::PostcardCaption(_) => Err(PipelineError::UpstreamAnalysis(
                "analysis returned a caption contract".to_string(),
            )),
        }
    }
}

fn ensure_allowed_extension(filename: &str) -> Result<(), PipelineError> {
    let extension = Path::new(filename)
        .extension()
        .and_then(|ext| ext.to_str())
        .map(str::to_ascii_lowercase);

    match extension {
        Some(ext) if ALLOWED_EXTENSIONS.contains(&ext.as_str()) => Ok(()),
        _ => Err(PipelineError::InvalidInput(format!(
            "{filename} has an unsupported file type. Allowed: {}",
            ALLOWED_EXTENSIONS.join(", ")
        ))),
    }
}

fn into_photo_analysis(output: PhotoAnalysisOutput) -> Result<PhotoAnalysis, PipelineError> {
    let scene_description = output.scene_description.trim().to_string();
    let mood = output.mood.trim().to_string();
    let colors = clean_list(output.dominant_colors);

    if scene_description.is_empty() || mood.is_empty() || colors.is_empty() {
        return Err(PipelineError::UpstreamAnalysis(
            "analysis is missing scene, mood or colors".to_string(),
        ));
    }

    Ok(PhotoAnalysis {
        scene_description,
        colors,
        mood,
        notable_elements: clean_list(output.notable_elements),
        scene_category: clean_optional(output.scene_category),
        lighting: clean_optional(output.lighting),
        time_of_day: clean_optional(output.time_of_day),
    })
}

fn clean_list(values: Vec<String>) -> Vec<String> {
    values
        .into_iter()
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
        .collect()
}

fn clean_optional(value: Option<String>) -> Option<String> {
    value
        .map(|value| value.trim().to_string())
        .filter(|value| !value.is_empty())
}
