use axum::Json;
use axum::http::StatusCode;
use axum::response::IntoResponse;
use shared::models::StylesResponse;

pub(super) async fn list_styles() -> impl IntoResponse {
    (StatusCode::OK, Json(StylesResponse::catalog()))
}
