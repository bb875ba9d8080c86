use std::fmt;
use std::sync::Arc;
use std::time::Instant;

use thiserror::Error;
use tokio::task::JoinSet;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::llm::{ImageSynthesisGateway, LlmGateway, LlmReliabilityConfig};

use super::aggregate::aggregate;
use super::artwork::ImageGenerator;
use super::caption::CaptionGenerator;
use super::error::PipelineError;
use super::session::SessionStore;
use super::types::{
    GenerationRequest, PhotoAnalysis, PhotoUpload, Postcard, RegenerationOverrides, Session,
    TripSummary,
};
use super::vision::{PreparedPhoto, VisionAnalyzer};

pub const MAX_PHOTOS: usize = 3;

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PipelineStage {
    Uploaded,
    Analyzing,
    Aggregating,
    Synthesizing,
    Complete,
    Failed,
}

impl PipelineStage {
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::Uploaded => "uploaded",
            Self::Analyzing => "analyzing",
            Self::Aggregating => "aggregating",
            Self::Synthesizing => "synthesizing",
            Self::Complete => "complete",
            Self::Failed => "failed",
        }
    }
}

impl fmt::Display for PipelineStage {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A run that ended in `Failed`, with the last stage it reached.
#[derive(Debug, Error)]
#[error("pipeline failed while {stage}: {error}")]
pub struct PipelineFailure {
    pub stage: PipelineStage,
    #[source]
    pub error: PipelineError,
}

#[derive(Debug, Clone)]
pub struct PipelineOutcome {
    pub session_id: String,
    pub postcard: Postcard,
}

struct StageTracker {
    run_id: Uuid,
    stage: PipelineStage,
    started: Instant,
}

impl StageTracker {
    fn start(kind: &'static str) -> Self {
        let tracker = Self {
            run_id: Uuid::new_v4(),
            stage: PipelineStage::Uploaded,
            started: Instant::now(),
        };
        info!(run_id = %tracker.run_id, kind, stage = %tracker.stage, "pipeline run started");
        tracker
    }

    fn advance(&mut self, next: PipelineStage) {
        debug!(
            run_id = %self.run_id,
            from = %self.stage,
            to = %next,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "pipeline stage transition"
        );
        self.stage = next;
    }

    fn fail(&self, error: impl Into<PipelineError>) -> PipelineFailure {
        let error = error.into();
        warn!(
            run_id = %self.run_id,
            stage = %self.stage,
            error_code = error.code(),
            error = %error,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "pipeline run failed"
        );
        PipelineFailure {
            stage: self.stage,
            error,
        }
    }

    fn complete(&mut self, session_id: &str) {
        self.advance(PipelineStage::Complete);
        info!(
            run_id = %self.run_id,
            session_id,
            elapsed_ms = self.started.elapsed().as_millis() as u64,
            "pipeline run complete"
        );
    }
}

/// Drives photos through analysis, aggregation and synthesis, and serves
/// regeneration from stored sessions.
pub struct PostcardPipeline {
    analyzer: Arc<VisionAnalyzer>,
    image_generator: ImageGenerator,
    caption_generator: CaptionGenerator,
    sessions: Arc<dyn SessionStore>,
}

impl PostcardPipeline {
    pub fn new(
        llm: Arc<dyn LlmGateway>,
        images: Arc<dyn ImageSynthesisGateway>,
        sessions: Arc<dyn SessionStore>,
        reliability: LlmReliabilityConfig,
        max_photo_bytes: usize,
    ) -> Self {
        Self {
            analyzer: Arc::new(VisionAnalyzer::new(
                Arc::clone(&llm),
                reliability.clone(),
                max_photo_bytes,
            )),
            image_generator: ImageGenerator::new(images, reliability.clone()),
            caption_generator: CaptionGenerator::new(llm, reliability),
            sessions,
        }
    }

    pub async fn run(
        &self,
        photos: Vec<PhotoUpload>,
        request: GenerationRequest,
    ) -> Result<PipelineOutcome, PipelineFailure> {
        let mut tracker = StageTracker::start("initial");

        if photos.is_empty() || photos.len() > MAX_PHOTOS {
            return Err(tracker.fail(PipelineError::InvalidInput(format!(
                "Please upload between 1 and {MAX_PHOTOS} photos"
            ))));
        }
        let prepared = photos
            .iter()
            .map(|photo| self.analyzer.prepare(photo))
            .collect::<Result<Vec<_>, _>>()
            .map_err(|err| tracker.fail(err))?;
        drop(photos);

        tracker.advance(PipelineStage::Analyzing);
        let analyses = self
            .analyze_all(prepared)
            .await
            .map_err(|err| tracker.fail(err))?;

        tracker.advance(PipelineStage::Aggregating);
        let summary = aggregate(
            &analyses,
            &request.location_label,
            request.user_description.as_deref(),
        )
        .map_err(|err| tracker.fail(err))?;
        let session = self
            .sessions
            .create(summary, request.clone())
            .await
            .map_err(|err| tracker.fail(err))?;
        info!(
            run_id = %tracker.run_id,
            session_id = %session.session_id,
            photo_count = session.trip_summary.photo_count,
            "session created"
        );

        tracker.advance(PipelineStage::Synthesizing);
        let postcard = self
            .synthesize(&session.trip_summary, &request)
            .await
            .map_err(|err| tracker.fail(err))?;

        tracker.complete(&session.session_id);
        Ok(PipelineOutcome {
            session_id: session.session_id,
            postcard,
        })
    }

    /// Re-runs only image and caption synthesis against a stored summary.
    pub async fn regenerate(
        &self,
        session_id: &str,
        overrides: RegenerationOverrides,
    ) -> Result<PipelineOutcome, PipelineFailure> {
        let mut tracker = StageTracker::start("regenerate");

        let session = self
            .sessions
            .get(session_id)
            .await
            .map_err(|err| tracker.fail(err))?;
        let request = overrides.merge_onto(&session.original_request);

        // The stored summary stays untouched; a new description only shapes this run.
        let summary = if request.user_description != session.trip_summary.user_description {
            TripSummary {
                user_description: request.user_description.clone(),
                ..session.trip_summary.clone()
            }
        } else {
            session.trip_summary.clone()
        };

        tracker.advance(PipelineStage::Synthesizing);
        let postcard = self
            .synthesize(&summary, &request)
            .await
            .map_err(|err| tracker.fail(err))?;

        tracker.complete(&session.session_id);
        Ok(PipelineOutcome {
            session_id: session.session_id,
            postcard,
        })
    }

    pub async fn session(&self, session_id: &str) -> Result<Session, PipelineError> {
        Ok(self.sessions.get(session_id).await?)
    }

    /// Fans analyses out on a join set, cancelling the rest on the first failure,
    /// and returns them in upload order.
    async fn analyze_all(
        &self,
        prepared: Vec<PreparedPhoto>,
    ) -> Result<Vec<PhotoAnalysis>, PipelineError> {
        let mut slots: Vec<Option<PhotoAnalysis>> = vec![None; prepared.len()];
        let mut tasks = JoinSet::new();

        for (index, photo) in prepared.into_iter().enumerate() {
            let analyzer = Arc::clone(&self.analyzer);
            tasks.spawn(async move { (index, analyzer.analyze_prepared(&photo).await) });
        }

        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, Ok(analysis))) => slots[index] = Some(analysis),
                Ok((index, Err(err))) => {
                    tasks.abort_all();
                    debug!(photo_index = index, "photo analysis failed; cancelled siblings");
                    return Err(err);
                }
                Err(join_err) => {
                    tasks.abort_all();
                    return Err(PipelineError::UpstreamAnalysis(format!(
                        "analysis task did not complete: {join_err}"
                    )));
                }
            }
        }

        slots.into_iter().collect::<Option<Vec<_>>>().ok_or_else(|| {
            PipelineError::UpstreamAnalysis("an analysis result went missing".to_string())
        })
    }

    async fn synthesize(
        &self,
        summary: &TripSummary,
        request: &GenerationRequest,
    ) -> Result<Postcard, PipelineError> {
        let (image, caption) = tokio::try_join!(
            self.image_generator
                .generate_image(summary, request.art_style, &request.location_label),
            self.caption_generator.generate_caption(
                summary,
                &request.location_label,
                request.caption_tone
            ),
        )?;

        Ok(Postcard { image, caption })
    }
}
