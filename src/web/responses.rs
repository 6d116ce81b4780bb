use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use serde::Serialize;
use uuid::Uuid;

use crate::models::OrchestrationFailure;
use crate::utils::AppError;

/// JSON error body shared by every endpoint: `{"error": ..., "message": ...}`.
#[derive(Debug, Serialize)]
pub struct ErrorBody {
    pub error: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
}

/// Body of a failed price fetch; keeps the session id for log correlation.
#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct FetchFailureBody {
    pub error: &'static str,
    pub message: String,
    pub session_id: Uuid,
    pub duration: u64,
}

#[derive(Debug)]
pub enum ApiError {
    BadRequest(String),
    NotFound(String),
    InternalServerError(String),
    ServiceUnavailable(String),
    FetchFailed(OrchestrationFailure),
}

impl ApiError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::NotFound(_) => StatusCode::NOT_FOUND,
            ApiError::InternalServerError(_) | ApiError::FetchFailed(_) => StatusCode::INTERNAL_SERVER_ERROR,
            ApiError::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    pub fn message(&self) -> String {
        match self {
            ApiError::BadRequest(msg)
            | ApiError::NotFound(msg)
            | ApiError::InternalServerError(msg)
            | ApiError::ServiceUnavailable(msg) => msg.clone(),
            ApiError::FetchFailed(failure) => failure.message.clone(),
        }
    }
}

impl From<AppError> for ApiError {
    fn from(err: AppError) -> Self {
        match err {
            AppError::Validation(msg) => ApiError::BadRequest(msg),
            AppError::NotFound { resource } => ApiError::NotFound(format!("{} not found", resource)),
            other => {
                tracing::error!(error = %other, "Request failed");
                ApiError::InternalServerError(other.to_string())
            }
        }
    }
}

impl From<OrchestrationFailure> for ApiError {
    fn from(failure: OrchestrationFailure) -> Self {
        ApiError::FetchFailed(failure)
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        match self {
            ApiError::FetchFailed(failure) => (
                status,
                Json(FetchFailureBody {
                    error: "Internal server error",
                    message: failure.message,
                    session_id: failure.session_id,
                    duration: failure.duration,
                }),
            )
                .into_response(),
            other => (
                status,
                Json(ErrorBody {
                    error: other.message(),
                    message: None,
                }),
            )
                .into_response(),
        }
    }
}

pub type ApiResult<T> = Result<T, ApiError>;
