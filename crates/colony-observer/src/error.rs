//! Error types for the Observer API server.
//!
//! [`ObserverError`] unifies all failure modes into a single enum that
//! can be converted into an Axum HTTP response via its
//! [`IntoResponse`](axum::response::IntoResponse) implementation.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};

/// Errors that can occur in the Observer API layer.
#[derive(Debug, thiserror::Error)]
pub enum ObserverError {
    /// A serialization or deserialization error.
    #[error("serialization error: {0}")]
    Serialization(#[from] serde_json::Error),

    /// A UUID in the query string could not be parsed.
    #[error("invalid UUID: {0}")]
    InvalidUuid(String),
}

impl IntoResponse for ObserverError {
    fn into_response(self) -> Response {
        let (status, message) = match &self {
            Self::Serialization(e) => {
                (StatusCode::INTERNAL_SERVER_ERROR, format!("JSON error: {e}"))
            }
            Self::InvalidUuid(msg) => (StatusCode::BAD_REQUEST, msg.clone()),
        };

        let body = serde_json::json!({
            "error": message,
            "status": status.as_u16(),
        });

        (status, axum::Json(body)).into_response()
    }
}
