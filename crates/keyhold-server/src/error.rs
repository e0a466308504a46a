//! HTTP error type for the Keyhold server.
//!
//! Workspace routes do not distinguish failure causes on the wire: any error
//! becomes a 400 with the endpoint's fixed message, after the underlying
//! error has been handed to the [`ErrorReporter`](crate::reporting::ErrorReporter).
//! Authentication failures are 401.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

/// Error returned from HTTP handlers and middleware.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// The request failed; the message is the endpoint's fixed description.
    #[error("{0}")]
    BadRequest(&'static str),
    /// Missing or unknown API key.
    #[error("{0}")]
    Unauthorized(String),
    /// The server could not process the request at all.
    #[error("{0}")]
    Internal(String),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        };
        let body = ErrorBody {
            message: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}
