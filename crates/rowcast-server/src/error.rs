//! Error handling for the HTTP API.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rowcast_proto::ApiResult;

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// Internal server error.
    Internal(String),
    /// Bad request.
    BadRequest(String),
    /// Not found.
    NotFound(String),
    /// Conflicts with an existing subscription.
    Conflict(String),
}

impl AppError {
    fn status(&self) -> StatusCode {
        match self {
            AppError::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
            AppError::BadRequest(_) => StatusCode::BAD_REQUEST,
            AppError::NotFound(_) => StatusCode::NOT_FOUND,
            AppError::Conflict(_) => StatusCode::CONFLICT,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status();
        let message = match self {
            AppError::Internal(msg)
            | AppError::BadRequest(msg)
            | AppError::NotFound(msg)
            | AppError::Conflict(msg) => msg,
        };

        // Same envelope as successful responses, with the error text set
        let body: ApiResult<()> = ApiResult::err(message);
        (status, Json(body)).into_response()
    }
}

impl From<rowcast_core::Error> for AppError {
    fn from(err: rowcast_core::Error) -> Self {
        use rowcast_core::Error;

        match err {
            Error::DuplicateName(_) => AppError::Conflict(err.to_string()),
            Error::NotFound => AppError::NotFound(err.to_string()),
            Error::InvalidSubscription(_) => AppError::BadRequest(err.to_string()),
            other => AppError::Internal(other.to_string()),
        }
    }
}
