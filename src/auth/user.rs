//! Identity claims returned by the userinfo endpoint

use serde::Deserialize;

use crate::error::AppError;

/// Authenticated user as reported by the provider
///
/// Only `email` is required; it becomes the session's `user-id`.
/// Unknown claims are ignored.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct AuthorizedUser {
    /// Subject identifier
    #[serde(default)]
    pub sub: Option<String>,
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub given_name: Option<String>,
    #[serde(default)]
    pub family_name: Option<String>,
    /// Profile page URL
    #[serde(default)]
    pub profile: Option<String>,
    /// Avatar URL
    #[serde(default)]
    pub picture: Option<String>,
    pub email: String,
    #[serde(default)]
    pub email_verified: bool,
    #[serde(default)]
    pub gender: Option<String>,
}

impl AuthorizedUser {
    /// Parse a userinfo response body
    ///
    /// # Errors
    /// Returns `AppError::Parse` for malformed JSON or a missing/empty email.
    pub fn from_slice(body: &[u8]) -> Result<Self, AppError> {
        let user: Self =
            serde_json::from_slice(body).map_err(|e| AppError::Parse(e.to_string()))?;

        if user.email.trim().is_empty() {
            return Err(AppError::Parse("email claim is empty".to_string()));
        }

        Ok(user)
    }
}
