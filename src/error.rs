//! Error types for questauth
//!
//! All errors in the application are converted to `AppError`,
//! which implements `IntoResponse` and renders the HTML error page.

use axum::http::StatusCode;
use axum::response::{Html, IntoResponse, Response};
use thiserror::Error;

use crate::web::pages;

/// Application-wide error type
///
/// Every failure of the login flow is terminal for the request that hit it.
/// None of them are retried; the user starts over at `/login`.
#[derive(Debug, Error)]
pub enum AppError {
    /// Missing or invalid startup configuration (fatal)
    #[error("Configuration error: {0}")]
    Config(String),

    /// Callback `state` does not match the one stored in the session (401)
    #[error("Invalid session state.")]
    InvalidState,

    /// Authorization code could not be exchanged for a token (400)
    #[error("Token exchange failed: {0}")]
    Exchange(String),

    /// Userinfo endpoint call failed (400)
    #[error("Userinfo request failed: {0}")]
    UserInfo(String),

    /// Identity payload could not be parsed (400)
    #[error("Malformed identity payload: {0}")]
    Parse(String),

    /// Session cookie could not be written (400)
    #[error("Session could not be saved: {0}")]
    SessionSave(String),

    /// Session cipher failure (500)
    #[error("Encryption error: {0}")]
    Encryption(String),

    /// Resource not found (404)
    #[error("Resource not found")]
    NotFound,

    /// Internal server error (500)
    #[error("Internal error: {0}")]
    Internal(#[from] anyhow::Error),
}

impl From<config::ConfigError> for AppError {
    fn from(err: config::ConfigError) -> Self {
        AppError::Config(err.to_string())
    }
}

impl AppError {
    /// HTTP status and metric label for this error
    pub fn status(&self) -> (StatusCode, &'static str) {
        match self {
            AppError::InvalidState => (StatusCode::UNAUTHORIZED, "invalid_state"),
            AppError::Exchange(_) => (StatusCode::BAD_REQUEST, "exchange"),
            AppError::UserInfo(_) => (StatusCode::BAD_REQUEST, "userinfo"),
            AppError::Parse(_) => (StatusCode::BAD_REQUEST, "parse"),
            AppError::SessionSave(_) => (StatusCode::BAD_REQUEST, "session_save"),
            AppError::NotFound => (StatusCode::NOT_FOUND, "not_found"),
            AppError::Config(_) => (StatusCode::INTERNAL_SERVER_ERROR, "config"),
            AppError::Encryption(_) => (StatusCode::INTERNAL_SERVER_ERROR, "encryption"),
            AppError::Internal(_) => (StatusCode::INTERNAL_SERVER_ERROR, "internal"),
        }
    }
}

impl IntoResponse for AppError {
    /// Convert error to HTTP response
    ///
    /// Maps each error variant to its status code and renders
    /// the error page. Internal details are not shown to the user.
    fn into_response(self) -> Response {
        let (status, error_type) = self.status();

        let message = match &self {
            AppError::Config(_) | AppError::Encryption(_) | AppError::Internal(_) => {
                "Internal server error".to_string()
            }
            _ => self.to_string(),
        };

        crate::metrics::ERRORS_TOTAL
            .with_label_values(&[error_type])
            .inc();

        (status, Html(pages::error_page(&message))).into_response()
    }
}

/// Result type alias using AppError
pub type Result<T> = std::result::Result<T, AppError>;
