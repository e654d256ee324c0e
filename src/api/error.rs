//! Mapping of gateway errors to HTTP responses.

use crate::chain::ChainError;
use axum::Json;
use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;
use thiserror::Error;
use tracing::error;

/// Errors returned by request handlers
#[derive(Debug, Error)]
pub enum ApiError {
    /// Invalid input, rejected before the chain is contacted
    #[error("{0}")]
    BadRequest(String),

    /// Any failure reported by the chain layer
    #[error(transparent)]
    Chain(#[from] ChainError),
}

/// JSON error response body.
#[derive(Serialize)]
struct ErrorBody {
    message: String,
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        let status = match &self {
            ApiError::BadRequest(_) => StatusCode::BAD_REQUEST,
            ApiError::Chain(err) => {
                error!("Chain call failed: {}", err);
                StatusCode::INTERNAL_SERVER_ERROR
            }
        };

        let body = ErrorBody {
            message: self.to_string(),
        };

        (status, Json(body)).into_response()
    }
}
