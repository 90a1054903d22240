use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde_json::json;

use creneau_core::ReserveError;

#[derive(Debug)]
pub enum AppError {
    Reserve(ReserveError),
    BadRequest(String),
    Anyhow(anyhow::Error),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            AppError::Reserve(ReserveError::Conflict(slot_id)) => (
                StatusCode::CONFLICT,
                format!("slot {slot_id} was taken by another client"),
            ),
            AppError::Reserve(ReserveError::Expired(id)) => {
                (StatusCode::GONE, format!("expired: {id}"))
            }
            AppError::Reserve(ReserveError::Validation(msg)) => (StatusCode::BAD_REQUEST, msg),
            AppError::Reserve(ReserveError::NotFound(msg)) => (StatusCode::NOT_FOUND, msg),
            AppError::Reserve(ReserveError::Transient(msg)) => {
                tracing::warn!("transient store failure surfaced to client: {}", msg);
                (
                    StatusCode::SERVICE_UNAVAILABLE,
                    "temporarily unavailable, please retry".to_string(),
                )
            }
            AppError::Reserve(ReserveError::Internal(msg)) => {
                tracing::error!("Internal Server Error: {}", msg);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Anyhow(err) => {
                tracing::error!("Internal Server Error: {}", err);
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal Server Error".to_string())
            }
        };

        let body = Json(json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

impl From<ReserveError> for AppError {
    fn from(err: ReserveError) -> Self {
        Self::Reserve(err)
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Anyhow(err)
    }
}
