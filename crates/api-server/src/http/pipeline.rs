use axum::Json;
use axum::extract::multipart::{Field, MultipartError, MultipartRejection};
use axum::extract::{Extension, Multipart, State};
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use shared::models::PostcardResponse;
use shared::postcard::{GenerationRequest, PhotoUpload};
use tracing::{info, warn};

use super::AppState;
use super::errors::{
    bad_request_response, payload_too_large_response, pipeline_error_response,
    pipeline_failure_response,
};
use super::observability::RequestContext;

const FILES_FIELD: &str = "files";

#[derive(Debug, Default)]
struct PipelineForm {
    photos: Vec<PhotoUpload>,
    location_label: Option<String>,
    art_style: Option<String>,
    caption_tone: Option<String>,
    user_description: Option<String>,
}

pub(super) async fn run_pipeline(
    State(state): State<AppState>,
    Extension(context): Extension<RequestContext>,
    multipart: Result<Multipart, MultipartRejection>,
) -> Response {
    let multipart = match multipart {
        Ok(multipart) => multipart,
        Err(rejection) => return bad_request_response(&rejection.body_text()),
    };
    let form = match read_form(multipart).await {
        Ok(form) => form,
        Err(response) => return response,
    };

    let Some(art_style) = form.art_style.as_deref() else {
        return bad_request_response("art_style is required");
    };
    let Some(caption_tone) = form.caption_tone.as_deref() else {
        return bad_request_response("caption_tone is required");
    };
    let request = match GenerationRequest::parse(
        art_style,
        caption_tone,
        form.location_label.as_deref(),
        form.user_description.as_deref(),
    ) {
        Ok(request) => request,
        Err(err) => return pipeline_error_response(&err),
    };

    info!(
        request_id = %context.request_id,
        photo_count = form.photos.len(),
        art_style = %request.art_style,
        caption_tone = %request.caption_tone,
        "postcard pipeline requested"
    );

    match state.pipeline.run(form.photos, request).await {
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
                stage = %failure.stage,
                error_code = failure.error.code(),
                "postcard pipeline request failed"
            );
            pipeline_failure_response(&failure)
        }
    }
}

async fn read_form(mut multipart: Multipart) -> Result<PipelineForm, Response> {
    let mut form = PipelineForm::default();

    while let Some(field) = multipart.next_field().await.map_err(multipart_error_response)? {
        let Some(name) = field.name().map(str::to_string) else {
            continue;
        };

        match name.as_str() {
            FILES_FIELD => {
                if let Some(photo) = read_photo(field).await? {
                    form.photos.push(photo);
                }
            }
            "location_label" => form.location_label = Some(read_text(field).await?),
            "art_style" => form.art_style = Some(read_text(field).await?),
            "caption_tone" => form.caption_tone = Some(read_text(field).await?),
            "user_description" => form.user_description = Some(read_text(field).await?),
            _ => {}
        }
    }

    Ok(form)
}

/// Empty file parts without a name are what browsers send for an untouched
/// file input; those are skipped rather than rejected.
async fn read_photo(field: Field<'_>) -> Result<Option<PhotoUpload>, Response> {
    let filename = field
        .file_name()
        .map(str::trim)
        .filter(|name| !name.is_empty())
        .map(str::to_string);
    let bytes = field.bytes().await.map_err(multipart_error_response)?;

    if filename.is_none() && bytes.is_empty() {
        return Ok(None);
    }

    Ok(Some(PhotoUpload {
        filename,
        bytes: bytes.to_vec(),
    }))
}

async fn read_text(field: Field<'_>) -> Result<String, Response> {
    field.text().await.map_err(multipart_error_response)
}

fn multipart_error_response(err: MultipartError) -> Response {
    if err.status() == StatusCode::PAYLOAD_TOO_LARGE {
        payload_too_large_response("Upload exceeds the request size limit")
    } else {
        bad_request_response(&err.body_text())
    }
}
