use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::FailureResponse;
use shared::postcard::{PipelineError, PipelineFailure};
use tracing::error;

const GENERATION_FAILED_MESSAGE: &str = "Failed to generate postcard, please try again.";
const INTERNAL_ERROR_MESSAGE: &str = "Unexpected server error";

fn failure_response(status: StatusCode, code: &str, message: &str) -> Response {
    (
        status,
        Json(FailureResponse {
            success: false,
            error: message.to_string(),
            error_code: code.to_string(),
        }),
    )
        .into_response()
}

pub(super) fn bad_request_response(message: &str) -> Response {
    failure_response(StatusCode::BAD_REQUEST, "invalid_input", message)
}

pub(super) fn payload_too_large_response(message: &str) -> Response {
    failure_response(StatusCode::PAYLOAD_TOO_LARGE, "invalid_input", message)
}

/// Maps a pipeline error to its HTTP envelope. Upstream details stay in the logs.
pub(super) fn pipeline_error_response(err: &PipelineError) -> Response {
    match err {
        PipelineError::InvalidInput(message) => bad_request_response(message),
        PipelineError::SessionNotFound(_) => failure_response(
            StatusCode::NOT_FOUND,
            err.code(),
            "Session not found or expired",
        ),
        PipelineError::UpstreamTimeout(_) => failure_response(
            StatusCode::GATEWAY_TIMEOUT,
            err.code(),
            GENERATION_FAILED_MESSAGE,
        ),
        PipelineError::UpstreamAnalysis(_) | PipelineError::UpstreamGeneration(_) => {
            failure_response(StatusCode::BAD_GATEWAY, err.code(), GENERATION_FAILED_MESSAGE)
        }
        PipelineError::SessionStore(_) => {
            error!(error = %err, "session store operation failed");
            failure_response(
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal_error",
                INTERNAL_ERROR_MESSAGE,
            )
        }
    }
}

pub(super) fn pipeline_failure_response(failure: &PipelineFailure) -> Response {
    pipeline_error_response(&failure.error)
}

#[cfg(test)]
mod tests {
    use axum::body::to_bytes;
    use serde_json::Value;

    use super::*;

    async fn envelope(response: Response) -> (StatusCode, Value) {
        let status = response.status();
        let body = to_bytes(response.into_body(), usize::MAX)
            .await
            .expect("body should be readable");
        (
            status,
            serde_json::from_slice(&body).expect("body should be json"),
        )
    }

    #[tokio::test]
    async fn upstream_errors_hide_provider_details() {
        let (status, body) = envelope(pipeline_error_response(
            &PipelineError::UpstreamGeneration("status=500 body=sk-secret".to_string()),
        ))
        .await;

        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["success"], false);
        assert_eq!(body["error"], GENERATION_FAILED_MESSAGE);
        assert_eq!(body["error_code"], "upstream_generation");
    }

    #[tokio::test]
    async fn timeouts_map_to_gateway_timeout() {
        let (status, body) =
            envelope(pipeline_error_response(&PipelineError::UpstreamTimeout("caption"))).await;

        assert_eq!(status, StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(body["error_code"], "upstream_timeout");
    }

    #[tokio::test]
    async fn invalid_input_keeps_its_message() {
        let (status, body) = envelope(pipeline_error_response(&PipelineError::InvalidInput(
            "Please upload between 1 and 3 photos".to_string(),
        )))
        .await;

        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["error"], "Please upload between 1 and 3 photos");
        assert_eq!(body["error_code"], "invalid_input");
    }

    #[tokio::test]
    async fn store_failures_are_internal_errors() {
        let (status, body) = envelope(pipeline_error_response(&PipelineError::SessionStore(
            "connection reset".to_string(),
        )))
        .await;

        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body["error_code"], "internal_error");
    }
}
