use axum::Json;
use axum::extract::rejection::JsonRejection;
use axum::extract::{Extension, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::{PostcardResponse, RegenerateRequest};
use shared::postcard::RegenerationOverrides;
use tracing::{info, warn};

use super::AppState;
use super::errors::{bad_request_response, pipeline_error_response, pipeline_failure_response};
use super::observability::RequestContext;

pub(super) async fn regenerate(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    body: Result<Json<RegenerateRequest>, JsonRejection>,
) -> Response {
    let Json(req) = match body {
        Ok(body) => body,
        Err(rejection) => return bad_request_response(&rejection.body_text()),
    };

    let session_id = req.session_id.trim();
    if session_id.is_empty() {
        return bad_request_response("session_id is required");
    }

    let overrides = match RegenerationOverrides::parse(
        req.art_style.as_deref(),
        req.caption_tone.as_deref(),
        req.location_label.as_deref(),
        req.user_description.as_deref(),
    ) {
        Ok(overrides) => overrides,
        Err(err) => return pipeline_error_response(&err),
    };

    info!(
        request_id = %context.request_id,
        session_id,
        art_style = ?overrides.art_style,
        caption_tone = ?overrides.caption_tone,
        "postcard regeneration requested"
    );

    match state.pipeline.regenerate(session_id, overrides).await {
        Ok(outcome) => (
            StatusCode::OK,
            Json(PostcardResponse {
                success: true,
                session_id: outcome.session_id,
                postcard: outcome.postcard,
            }),
        )
            .into_response(),
        Err(failure) => {
            warn!(
                request_id = %context.request_id,
                session_id,
                stage = %failure.stage,
                error_code = failure.error.code(),
                "postcard regeneration failed"
            );
            pipeline_failure_response(&failure)
        }
    }
}
