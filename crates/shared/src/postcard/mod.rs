pub mod aggregate;
pub mod artwork;
pub mod caption;
pub mod error;
pub mod orchestrator;
pub mod session;
pub mod types;
pub mod vision;

pub use aggregate::{MAX_MOTIFS, MAX_PALETTE_COLORS, aggregate};
pub use artwork::{ImageGenerator, build_image_prompt};
pub use caption::{CaptionGenerator, MAX_CAPTION_CHARS, finalize_caption};
pub use error::PipelineError;
pub use orchestrator::{
    MAX_PHOTOS, PipelineFailure, PipelineOutcome, PipelineStage, PostcardPipeline,
};
pub use session::{
    InMemorySessionStore, RedisSessionStore, SessionStore, SessionStoreError, build_session_store,
};
pub use types::{
    ArtStyle, CaptionTone, DEFAULT_LOCATION_LABEL, GenerationRequest, MAX_LOCATION_LABEL_CHARS,
    MAX_USER_DESCRIPTION_CHARS, PhotoAnalysis, PhotoUpload, Postcard, PostcardCaption,
    PostcardImage, RegenerationOverrides, Session, TripSummary,
};
pub use vision::{ALLOWED_EXTENSIONS, PreparedPhoto, VisionAnalyzer};
