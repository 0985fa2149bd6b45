use axum::{Json, http::StatusCode, response::IntoResponse};
use tracing::info;

use crate::axum_http::error_responses::ErrorResponse;

pub async fn not_found() -> impl IntoResponse {
    info!("backend router: not_found handler invoked");
    (
        StatusCode::NOT_FOUND,
        Json(ErrorResponse {
            code: StatusCode::NOT_FOUND.as_u16(),
            error: "route_not_found",
            message: "no such route".to_string(),
            retryable: false,
        }),
    )
}

pub async fn health_check() -> impl IntoResponse {
    (StatusCode::OK, "OK").into_response()
}
