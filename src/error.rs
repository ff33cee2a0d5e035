use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use serde::Serialize;

use crate::identity::IdentityError;

/// Unified error type for the HTTP surface.
///
/// Every variant renders as `{"error": "<message>"}`; the variant only picks
/// the status code.
#[derive(Debug, thiserror::Error)]
pub enum AppError {
    /// Missing or empty required fields, or a request the provider refused.
    #[error("{0}")]
    Validation(String),

    /// Bad credentials, or a missing/invalid/expired bearer token.
    #[error("{0}")]
    Unauthorized(String),

    #[error("{0}")]
    NotFound(String),

    /// The identity operation succeeded but the dependent profile operation
    /// did not.
    #[error("{0}")]
    UpstreamInconsistency(String),

    /// The identity provider failed in a way that is not the caller's fault.
    #[error("{0}")]
    Provider(String),

    #[error("{0}")]
    Database(String),

    #[error("{0}")]
    Internal(String),
}

#[derive(Debug, Serialize)]
struct ErrorResponse {
    error: String,
}

impl AppError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::Validation(_) => StatusCode::BAD_REQUEST,
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::UpstreamInconsistency(_)
            | Self::Provider(_)
            | Self::Database(_)
            | Self::Internal(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let body = ErrorResponse {
            error: self.to_string(),
        };
        (status, axum::Json(body)).into_response()
    }
}

impl From<rusqlite::Error> for AppError {
    fn from(err: rusqlite::Error) -> Self {
        tracing::error!(error = %err, "Database error");
        Self::Database(err.to_string())
    }
}

impl From<anyhow::Error> for AppError {
    fn from(err: anyhow::Error) -> Self {
        Self::Internal(err.to_string())
    }
}

impl From<IdentityError> for AppError {
    fn from(err: IdentityError) -> Self {
        match err {
            // Provider refusals carry a message meant for the end user.
            IdentityError::Rejected(message) => Self::Validation(message),
            IdentityError::InvalidCredentials(message) | IdentityError::InvalidToken(message) => {
                Self::Unauthorized(message)
            }
            IdentityError::Transport(_) | IdentityError::Upstream { .. } => {
                tracing::error!(error = %err, "Identity provider error");
                Self::Provider(err.to_string())
            }
        }
    }
}
