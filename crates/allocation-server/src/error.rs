use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use axum::Json;
use chat_allocation_core::AllocationError;
use thiserror::Error;

/// Server errors
#[derive(Error, Debug)]
pub enum ServerError {
    /// Error from the allocation core
    #[error(transparent)]
    Allocation(#[from] AllocationError),

    /// Webhook payload missing required fields or otherwise unusable
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// HTTP client construction or transport failure
    #[error("HTTP client error: {0}")]
    Http(#[from] reqwest::Error),

    /// Configuration file or environment could not be loaded
    #[error("Configuration error: {0}")]
    ConfigLoad(#[from] config::ConfigError),

    /// Configuration values are invalid
    #[error("Configuration error: {0}")]
    Config(String),

    /// I/O errors
    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

impl ServerError {
    /// Create a new BadRequest error
    pub fn bad_request<S: Into<String>>(msg: S) -> Self {
        Self::BadRequest(msg.into())
    }

    /// Create a new Config error
    pub fn config<S: Into<String>>(msg: S) -> Self {
        Self::Config(msg.into())
    }

    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::BadRequest(_) => StatusCode::BAD_REQUEST,
            _ => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for ServerError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        if status.is_server_error() {
            tracing::error!(error = %self, "request failed");
        } else {
            tracing::debug!(error = %self, "request rejected");
        }

        let body = Json(serde_json::json!({
            "status": "error",
            "error": self.to_string(),
        }));
        (status, body).into_response()
    }
}

/// Result type for server operations
pub type Result<T> = std::result::Result<T, ServerError>;
