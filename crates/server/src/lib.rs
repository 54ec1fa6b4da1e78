//! NLLB API Server
//!
//! HTTP endpoints for translation, streaming translation, token counting,
//! model load/unload and language detection.

pub mod http;
pub mod state;

pub use http::create_router;
pub use state::AppState;

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use nllb_core::Error;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    #[error(transparent)]
    Core(#[from] Error),

    #[error("Invalid request: {0}")]
    InvalidRequest(String),

    #[error("Startup failed: {0}")]
    Startup(String),
}

impl ServerError {
    pub fn status(&self) -> StatusCode {
        match self {
            ServerError::Core(Error::InvalidInput(_)) | ServerError::InvalidRequest(_) => {
                StatusCode::BAD_REQUEST
            },
            ServerError::Core(Error::ModelUnloaded) => StatusCode::SERVICE_UNAVAILABLE,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status();
        match &self {
            ServerError::Core(Error::InvariantViolation(_)) => {
                tracing::error!(error = %self, "Engine pool invariant violated");
            },
            _ if status.is_server_error() => {
                tracing::warn!(error = %self, status = status.as_u16(), "Request failed");
            },
            _ => {},
        }

        (
            status,
            Json(serde_json::json!({
                "status_code": status.as_u16(),
                "detail": self.to_string(),
            })),
        )
            .into_response()
    }
}
