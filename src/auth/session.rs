//! Session management
//!
//! Sessions are small string maps stored entirely in an encrypted cookie.
//! The server holds only the key; no server-side session storage needed.

use std::collections::BTreeMap;
use std::fmt;

use aes_gcm::aead::{Aead, KeyInit};
use aes_gcm::{Aes256Gcm, Nonce};
use axum_extra::extract::CookieJar;
use axum_extra::extract::cookie::{Cookie, SameSite};
use base64::{Engine as _, engine::general_purpose};
use chrono::{DateTime, Duration, Utc};
use rand::RngCore;
use serde::{Deserialize, Serialize};
use sha2::{Digest, Sha256};

use crate::config::AppConfig;
use crate::error::AppError;

/// Session key holding the pending CSRF state
pub const STATE_KEY: &str = "state";

/// Session key holding the authenticated user's email
pub const USER_ID_KEY: &str = "user-id";

/// Browsers drop cookies larger than this
pub const MAX_COOKIE_BYTES: usize = 4096;

const NONCE_LEN: usize = 12;

/// Per-request view of the session map
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Session {
    values: BTreeMap<String, String>,
}

impl Session {
    pub fn get(&self, key: &str) -> Option<&str> {
        self.values.get(key).map(String::as_str)
    }

    pub fn set(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.values.insert(key.into(), value.into());
    }

    pub fn remove(&mut self, key: &str) -> Option<String> {
        self.values.remove(key)
    }

    pub fn is_empty(&self) -> bool {
        self.values.is_empty()
    }
}

/// Encrypted cookie payload
#[derive(Debug, Serialize, Deserialize)]
struct SessionPayload {
    values: BTreeMap<String, String>,
    expires_at: DateTime<Utc>,
}

/// Cookie-backed session store
///
/// Cookie value format: base64url(nonce || aes_256_gcm(json payload)).
/// The key is fixed for the lifetime of the process; regenerating it
/// would invalidate every outstanding session.
#[derive(Clone)]
pub struct SessionStore {
    key: [u8; 32],
    cookie_name: String,
    max_age_seconds: i64,
    secure: bool,
}

impl fmt::Debug for SessionStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionStore")
            .field("cookie_name", &self.cookie_name)
            .field("max_age_seconds", &self.max_age_seconds)
            .field("secure", &self.secure)
            .finish_non_exhaustive()
    }
}

impl SessionStore {
    /// Create a store whose cipher key is derived from `secret`
    pub fn new(
        secret: &[u8],
        cookie_name: impl Into<String>,
        max_age_seconds: i64,
        secure: bool,
    ) -> Self {
        let mut key = [0u8; 32];
        key.copy_from_slice(&Sha256::digest(secret));
        Self {
            key,
            cookie_name: cookie_name.into(),
            max_age_seconds,
            secure,
        }
    }

    /// Build the store from configuration
    ///
    /// Uses `session.secret` when configured, otherwise a fresh random secret.
    ///
    /// # Errors
    /// Fails if no secret is configured and the secure random source is unavailable.
    pub fn from_config(config: &AppConfig) -> Result<Self, AppError> {
        let secret = match &config.session.secret {
            Some(secret) => secret.clone(),
            None => {
                tracing::info!("No session.secret configured; sessions will not survive restart");
                super::token::random_token(super::token::SESSION_SECRET_BYTES)?
            }
        };

        Ok(Self::new(
            secret.as_bytes(),
            config.session.cookie_name.clone(),
            config.session.max_age_seconds,
            config.should_use_secure_cookies(),
        ))
    }

    pub fn cookie_name(&self) -> &str {
        &self.cookie_name
    }

    /// Load the session carried by the request
    ///
    /// A missing, tampered or expired cookie yields an empty session.
    pub fn load(&self, jar: &CookieJar) -> Session {
        let Some(cookie) = jar.get(&self.cookie_name) else {
            return Session::default();
        };

        match self.decode(cookie.value()) {
            Ok(session) => session,
            Err(error) => {
                tracing::debug!(%error, "Discarding unreadable session cookie");
                Session::default()
            }
        }
    }

    /// Write the session into the response cookie jar
    ///
    /// # Errors
    /// Returns `AppError::SessionSave` if the cookie would exceed the
    /// browser size limit or encryption fails. The jar is left untouched.
    pub fn save(&self, jar: CookieJar, session: &Session) -> Result<CookieJar, AppError> {
        let value = self
            .encode(session)
            .map_err(|e| AppError::SessionSave(e.to_string()))?;

        let cookie = Cookie::build((self.cookie_name.clone(), value))
            .http_only(true)
            .secure(self.secure)
            .same_site(SameSite::Lax)
            .path("/")
            .max_age(time::Duration::seconds(self.max_age_seconds))
            .build();

        let size = cookie.to_string().len();
        if size > MAX_COOKIE_BYTES {
            return Err(AppError::SessionSave(format!(
                "session cookie is {size} bytes, limit is {MAX_COOKIE_BYTES}"
            )));
        }

        Ok(jar.add(cookie))
    }

    /// Encrypt a session into a cookie value
    pub fn encode(&self, session: &Session) -> Result<String, AppError> {
        let payload = SessionPayload {
            values: session.values.clone(),
            expires_at: Utc::now() + Duration::seconds(self.max_age_seconds),
        };
        let plaintext =
            serde_json::to_vec(&payload).map_err(|e| AppError::Internal(e.into()))?;

        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| AppError::Encryption("invalid session key length".to_string()))?;
        let mut nonce = [0u8; NONCE_LEN];
        rand::thread_rng().fill_bytes(&mut nonce);
        let ciphertext = cipher
            .encrypt(Nonce::from_slice(&nonce), plaintext.as_slice())
            .map_err(|_| AppError::Encryption("session encryption failed".to_string()))?;

        let mut output = Vec::with_capacity(NONCE_LEN + ciphertext.len());
        output.extend_from_slice(&nonce);
        output.extend_from_slice(&ciphertext);
        Ok(general_purpose::URL_SAFE_NO_PAD.encode(output))
    }

    /// Decrypt and verify a cookie value
    ///
    /// # Errors
    /// Returns `AppError::Encryption` if the value was not produced by this
    /// store or has expired.
    pub fn decode(&self, value: &str) -> Result<Session, AppError> {
        let data = general_purpose::URL_SAFE_NO_PAD
            .decode(value)
            .map_err(|_| AppError::Encryption("session cookie is not base64".to_string()))?;
        if data.len() <= NONCE_LEN {
            return Err(AppError::Encryption(
                "session cookie is too short".to_string(),
            ));
        }

        let (nonce, ciphertext) = data.split_at(NONCE_LEN);
        let cipher = Aes256Gcm::new_from_slice(&self.key)
            .map_err(|_| AppError::Encryption("invalid session key length".to_string()))?;
        let plaintext = cipher
            .decrypt(Nonce::from_slice(nonce), ciphertext)
            .map_err(|_| AppError::Encryption("session decryption failed".to_string()))?;

        let payload: SessionPayload = serde_json::from_slice(&plaintext)
            .map_err(|_| AppError::Encryption("session payload is malformed".to_string()))?;

        if payload.expires_at < Utc::now() {
            return Err(AppError::Encryption("session has expired".to_string()));
        }

        Ok(Session {
            values: payload.values,
        })
    }
}
