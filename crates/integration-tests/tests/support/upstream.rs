//! Scripted upstream standing in for both model gateways, plus request fixtures.

use std::io::Cursor;
use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use image::{ImageBuffer, ImageFormat, Rgb};
use serde_json::{Value, json};
use shared::llm::contracts::OUTPUT_CONTRACT_VERSION_V1;
use shared::llm::gateway::{ImageSynthesisFuture, LlmGatewayFuture};
use shared::llm::{
    GenerationCapability, ImageSynthesisGateway, ImageSynthesisRequest, ImageSynthesisResponse,
    LlmGateway, LlmGatewayError, LlmGatewayRequest, LlmGatewayResponse,
};
use tokio::sync::Mutex;

pub const MULTIPART_BOUNDARY: &str = "postcard-test-boundary-7d1e";

/// Canned per-photo analyses, handed out in call order.
const ANALYSES: [(&str, &[&str], &str, &[&str]); 3] = [
    (
        "Ancient columns glowing at sunset.",
        &["terracotta", "ochre"],
        "serene",
        &["ruins", "columns"],
    ),
    (
        "A crowded trattoria with checkered tablecloths.",
        &["ochre", "olive"],
        "lively",
        &["pasta", "ruins"],
    ),
    (
        "A quiet fountain in an empty piazza.",
        &["sky blue", "travertine"],
        "serene",
        &["fountain", "piazza"],
    ),
];

pub struct StubUpstream {
    analysis_calls: AtomicUsize,
    caption_calls: AtomicUsize,
    image_prompts: Mutex<Vec<String>>,
    fail_analysis: AtomicBool,
    fail_images: AtomicBool,
    caption_delay: Mutex<Option<Duration>>,
}

impl StubUpstream {
    pub fn new() -> Arc<Self> {
        Arc::new(Self {
            analysis_calls: AtomicUsize::new(0),
            caption_calls: AtomicUsize::new(0),
            image_prompts: Mutex::new(Vec::new()),
            fail_analysis: AtomicBool::new(false),
            fail_images: AtomicBool::new(false),
            caption_delay: Mutex::new(None),
        })
    }

    pub fn fail_analysis(&self) {
        self.fail_analysis.store(true, Ordering::SeqCst);
    }

    pub fn fail_images(&self) {
        self.fail_images.store(true, Ordering::SeqCst);
    }

    pub async fn delay_captions(&self, delay: Duration) {
        *self.caption_delay.lock().await = Some(delay);
    }

    pub fn analysis_calls(&self) -> usize {
        self.analysis_calls.load(Ordering::SeqCst)
    }

    pub fn caption_calls(&self) -> usize {
        self.caption_calls.load(Ordering::SeqCst)
    }

    pub async fn image_prompts(&self) -> Vec<String> {
        self.image_prompts.lock().await.clone()
    }

    pub async fn outbound_calls(&self) -> usize {
        self.analysis_calls() + self.caption_calls() + self.image_prompts.lock().await.len()
    }

    fn analysis_output(&self) -> Result<Value, LlmGatewayError> {
        let index = self.analysis_calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_analysis.load(Ordering::SeqCst) {
            return Err(LlmGatewayError::ProviderFailure("status=500".to_string()));
        }

        let (scene, colors, mood, elements) = ANALYSES[index % ANALYSES.len()];
        Ok(json!({
            "version": OUTPUT_CONTRACT_VERSION_V1,
            "output": {
                "scene_description": scene,
                "dominant_colors": colors,
                "mood": mood,
                "notable_elements": elements,
                "scene_category": "urban",
                "lighting": "golden hour"
            }
        }))
    }

    async fn caption_output(&self, context: &Value) -> Value {
        self.caption_calls.fetch_add(1, Ordering::SeqCst);
        let delay = *self.caption_delay.lock().await;
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }

        let location = context["location"].as_str().unwrap_or_default();
        let tone = context["tone"].as_str().unwrap_or_default();
        json!({
            "version": OUTPUT_CONTRACT_VERSION_V1,
            "output": {
                "caption": format!("{location}, told in a {tone} voice.")
            }
        })
    }
}

impl LlmGateway for StubUpstream {
    fn generate<'a>(&'a self, request: LlmGatewayRequest) -> LlmGatewayFuture<'a> {
        Box::pin(async move {
            let output = match request.capability {
                GenerationCapability::PhotoAnalysis => self.analysis_output()?,
                GenerationCapability::PostcardCaption => {
                    self.caption_output(&request.context_payload).await
                }
            };

            Ok(LlmGatewayResponse {
                model: "stub-vision".to_string(),
                provider_request_id: None,
                output,
                usage: None,
            })
        })
    }
}

impl ImageSynthesisGateway for StubUpstream {
    fn synthesize<'a>(&'a self, request: ImageSynthesisRequest) -> ImageSynthesisFuture<'a> {
        Box::pin(async move {
            let mut prompts = self.image_prompts.lock().await;
            prompts.push(request.prompt);
            if self.fail_images.load(Ordering::SeqCst) {
                return Err(LlmGatewayError::ProviderFailure(
                    "status=500 body=internal provider trace".to_string(),
                ));
            }

            Ok(ImageSynthesisResponse {
                model: "stub-image".to_string(),
                image_url: format!("https://images.example/postcard-{}.png", prompts.len()),
                revised_prompt: None,
            })
        })
    }
}

pub fn png_bytes() -> Vec<u8> {
    let img: ImageBuffer<Rgb<u8>, Vec<u8>> = ImageBuffer::from_pixel(6, 4, Rgb([196, 98, 45]));
    let mut bytes = Vec::new();
    img.write_to(&mut Cursor::new(&mut bytes), ImageFormat::Png)
        .expect("png fixture should encode");
    bytes
}

/// Builds a `multipart/form-data` body by hand, one part at a time.
#[derive(Default)]
pub struct MultipartBody {
    body: Vec<u8>,
}

impl MultipartBody {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn text(mut self, name: &str, value: &str) -> Self {
        self.open_part(&format!("Content-Disposition: form-data; name=\"{name}\""));
        self.body.extend_from_slice(value.as_bytes());
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn file(mut self, name: &str, filename: &str, content_type: &str, bytes: &[u8]) -> Self {
        self.open_part(&format!(
            "Content-Disposition: form-data; name=\"{name}\"; filename=\"{filename}\"\r\n\
             Content-Type: {content_type}"
        ));
        self.body.extend_from_slice(bytes);
        self.body.extend_from_slice(b"\r\n");
        self
    }

    pub fn content_type() -> String {
        format!("multipart/form-data; boundary={MULTIPART_BOUNDARY}")
    }

    pub fn finish(mut self) -> Vec<u8> {
        self.body
            .extend_from_slice(format!("--{MULTIPART_BOUNDARY}--\r\n").as_bytes());
        self.body
    }

    fn open_part(&mut self, headers: &str) {
        self.body
            .extend_from_slice(format!("--{MULTIPART_BOUNDARY}\r\n{headers}\r\n\r\n").as_bytes());
    }
}
