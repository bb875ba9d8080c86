use std::sync::Arc;

use axum::extract::DefaultBodyLimit;
use axum::routing::{get, post};
use axum::{Router, middleware};
use shared::postcard::PostcardPipeline;

mod errors;
mod health;
mod observability;
mod pipeline;
mod regenerate;
mod session;
mod styles;

#[derive(Clone)]
pub struct AppState {
    pub pipeline: Arc<PostcardPipeline>,
    /// Upper bound on a whole request body, multipart uploads included.
    pub max_request_bytes: usize,
}

pub fn build_router(app_state: AppState) -> Router {
    let body_limit = app_state.max_request_bytes;

    Router::new()
        .route("/health", get(health::health))
        .route("/api/styles", get(styles::list_styles))
        .route("/api/pipeline", post(pipeline::run_pipeline))
        .route("/api/regenerate", post(regenerate::regenerate))
        .route(
            "/api/session/{session_id}/status",
            get(session::session_status),
        )
        .layer(DefaultBodyLimit::max(body_limit))
        .layer(middleware::from_fn(
            observability::request_observability_middleware,
        ))
        .with_state(app_state)
}
