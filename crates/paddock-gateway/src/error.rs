//! Error types for the gateway API.
//!
//! [`ApiError`] converts into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use paddock_core::session::SessionError;

/// Errors that can occur in the gateway API layer.
#[derive(Debug, thiserror::Error)]
pub enum ApiError {
    /// An admin parameter failed validation.
    #[error(transparent)]
    Validation(#[from] SessionError),
}

impl IntoResponse for ApiError {
    fn into_response(self) -> Response {
        match self {
            // Plain text body, e.g. "Invalid rate provided".
            Self::Validation(e) => (StatusCode::BAD_REQUEST, e.to_string()).into_response(),
        }
    }
}
