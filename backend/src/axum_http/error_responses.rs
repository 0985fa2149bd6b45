use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

use crate::usecases::escrow::EscrowError;

#[derive(Debug, Serialize)]
pub struct ErrorResponse {
    pub code: u16,
    pub error: &'static str,
    pub message: String,
    pub retryable: bool,
}

#[derive(Debug, Error)]
pub enum AppError {
    #[error(transparent)]
    Escrow(#[from] EscrowError),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let AppError::Escrow(err) = self;
        let status = err.status_code();
        let message = match &err {
            EscrowError::Internal(cause) => {
                // Don't leak internal error detail to client
                error!(error = ?cause, "backend: internal error");
                "Internal server error".to_string()
            }
            _ => err.to_string(),
        };

        let body = Json(ErrorResponse {
            code: status.as_u16(),
            error: err.kind(),
            message,
            retryable: err.is_retryable(),
        });

        (status, body).into_response()
    }
}
