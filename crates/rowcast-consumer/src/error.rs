//! Error handling for the consumer.

use axum::{
    http::StatusCode,
    response::{IntoResponse, Response},
    Json,
};
use rowcast_proto::ApiResult;

/// Application error type.
#[derive(Debug)]
pub enum AppError {
    /// The consumer is not in a state to serve the request.
    BadRequest(String),
    /// The rowcast service failed or rejected the request.
    Service(String),
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let (status, message) = match self {
            AppError::BadRequest(msg) => (StatusCode::BAD_REQUEST, msg),
            AppError::Service(msg) => (StatusCode::BAD_GATEWAY, msg),
        };

        let body: ApiResult<()> = ApiResult::err(message);
        (status, Json(body)).into_response()
    }
}

impl From<reqwest::Error> for AppError {
    fn from(err: reqwest::Error) -> Self {
        AppError::Service(err.to_string())
    }
}
