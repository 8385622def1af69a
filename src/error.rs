//! Error types for socnet
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` for proper HTTP error responses.

use axum::http::StatusCode;
use axum::response::{IntoResponse, Response};
use thiserror::Error;

/// Application-wide error type
///
/// Domain variants are recognized by the services and mapped to
/// specific status codes. Infrastructure variants are logged and
/// surfaced to clients as a generic 500.
#[derive(Debug, Error)]
pub enum AppError {
    // -------------------------------------------------------------------------
    // Validation (422)
    // -------------------------------------------------------------------------
    #[error("invalid email")]
    InvalidEmail,

    #[error("invalid username")]
    InvalidUsername,

    #[error("invalid content")]
    InvalidContent,

    #[error("invalid spoiler")]
    InvalidSpoiler,

    #[error("only png and jpeg allowed as avatar")]
    UnsupportedAvatarFormat,

    #[error("avatar too large")]
    AvatarTooLarge,

    // -------------------------------------------------------------------------
    // Not found (404)
    // -------------------------------------------------------------------------
    #[error("user not found")]
    UserNotFound,

    #[error("post not found")]
    PostNotFound,

    #[error("comment not found")]
    CommentNotFound,

    #[error("notification not found")]
    NotificationNotFound,

    // -------------------------------------------------------------------------
    // Conflicts
    // -------------------------------------------------------------------------
    /// Unique constraint on users.email (409)
    #[error("email is taken")]
    EmailTaken,

    /// Unique constraint on users.username (409)
    #[error("username is taken")]
    UsernameTaken,

    /// Self-follow attempt (403)
    #[error("cannot follow yourself")]
    ForbiddenFollow,

    /// Authentication required (401)
    #[error("unauthenticated")]
    Unauthenticated,

    // -------------------------------------------------------------------------
    // Infrastructure (500)
    // -------------------------------------------------------------------------
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("storage error: {0}")]
    Storage(String),

    #[error("configuration error: {0}")]
    Config(String),

    #[error("internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl From<std::io::Error> for AppError {
    fn from(err: std::io::Error) -> Self {
        AppError::Storage(err.to_string())
    }
}

impl AppError {
    /// Status code and short machine-readable tag for this error
    pub fn status_and_kind(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidEmail
            | AppError::InvalidUsername
            | AppError::InvalidContent
            | AppError::InvalidSpoiler
            | AppError::UnsupportedAvatarFormat
            | AppError::AvatarTooLarge => (StatusCode::UNPROCESSABLE_ENTITY, "validation"),
            AppError::UserNotFound
            | AppError::PostNotFound
            | AppError::CommentNotFound
            | AppError::NotificationNotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::EmailTaken | AppError::UsernameTaken => (StatusCode::CONFLICT, "conflict"),
            AppError::ForbiddenFollow => (StatusCode::FORBIDDEN, "forbidden"),
            AppError::Unauthenticated => (StatusCode::UNAUTHORIZED, "unauthenticated"),
            AppError::Database(_) => (StatusCode::INTERNAL_SERVER_ERROR, "database"),
            AppError::Storage(_) => (StatusCode::INTERNAL_SERVER_ERROR, "storage"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Infrastructure failures never expose their detail to the client;
    /// the detail goes to the server log instead.
    fn into_response(self) -> Response {
        use axum::Json;

        let (status, error_type) = self.status_and_kind();

        let error_message = if status == StatusCode::INTERNAL_SERVER_ERROR {
            tracing::error!(error = %self, kind = error_type, "request failed");
            "internal server error".to_string()
        } else {
            self.to_string()
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        let body = Json(serde_json::json!({
            "error": error_message,
        }));

        (status, body).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
