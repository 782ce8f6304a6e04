use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use loginlimit::LoginLimitError;
use serde_json::json;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum LimitError {
    /// The client IP address has an active ban
    #[error("Too many failed login attempts")]
    Banned,

    #[error("Internal server error: {0}")]
    InternalError(String),
}

impl From<LoginLimitError> for LimitError {
    fn from(err: LoginLimitError) -> Self {
        match err {
            // Validation failures here come from stored rows, not the request
            LoginLimitError::InvalidInput(msg)
            | LoginLimitError::ConfigError(msg)
            | LoginLimitError::StorageError(msg) => LimitError::InternalError(msg),
        }
    }
}

impl IntoResponse for LimitError {
    fn into_response(self) -> Response {
        let (status, error_message) = match self {
            LimitError::Banned => (StatusCode::FORBIDDEN, "Too many failed login attempts"),
            LimitError::InternalError(ref msg) => {
                tracing::error!(error = %msg, "Login limiter failed");
                (StatusCode::INTERNAL_SERVER_ERROR, "Internal server error")
            }
        };

        let body = Json(json!({
            "error": error_message,
            "code": status.as_u16()
        }));

        (status, body).into_response()
    }
}

pub type Result<T> = std::result::Result<T, LimitError>;
