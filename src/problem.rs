use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde::Serialize;
use tracing::error;

use crate::{models::ConflictBody, service::ServiceError};

pub type ApiResult<T> = Result<T, ApiError>;

#[derive(Debug)]
pub enum ApiError {
    Unauthorized,
    Validation(String),
    NotFound(String),
    Conflict(ConflictBody),
    Internal,
}

#[derive(Debug, Serialize)]
struct ErrorBody {
    error: String,
}

impl From<ServiceError> for ApiError {
    fn from(err: ServiceError) -> Self {
        match err {
            ServiceError::Validation(message) => Self::Validation(message),
            ServiceError::NotFound(message) => Self::NotFound(message),
            ServiceError::Conflict(body) => Self::Conflict(body),
            ServiceError::Infrastructure(err) => {
                error!(error = %err, source = ?std::error::Error::source(&err), "storage failure");
                Self::Internal
            }
        }
    }
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            Self::Unauthorized => return (StatusCode::UNAUTHORIZED, "UNAUTHORIZED").into_response(),
            Self::Conflict(body) => return (StatusCode::CONFLICT, Json(body)).into_response(),
            Self::Validation(message) => (StatusCode::BAD_REQUEST, message),
            Self::NotFound(message) => (StatusCode::NOT_FOUND, message),
            Self::Internal => (
                StatusCode::INTERNAL_SERVER_ERROR,
                "internal server error".to_string(),
            ),
        };

        (status, Json(ErrorBody { error: message })).into_response()
    }
}
