use axum::Json;
use axum::extract::{Path, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::SessionStatusResponse;

use super::AppState;
use super::errors::pipeline_error_response;

pub(super) async fn session_status(
    State(state): State<AppState>,
    Path(session_id): Path<String>,
) -> Response {
    match state.pipeline.session(&session_id).await {
        Ok(session) => (
            StatusCode::OK,
            Json(SessionStatusResponse {
                success: true,
                session_id: session.session_id,
                created_at: session.created_at,
                expires_at: session.expires_at,
                photo_count: session.trip_summary.photo_count,
                location_label: session.original_request.location_label,
            }),
        )
            .into_response(),
        Err(err) => pipeline_error_response(&err),
    }
}
