//! Random token generation
//!
//! Tokens back the per-login CSRF state and the process-wide session secret.

use base64::{Engine as _, engine::general_purpose};
use rand::RngCore;
use rand::rngs::OsRng;

use crate::error::AppError;

/// Length in bytes of CSRF state tokens
pub const STATE_TOKEN_BYTES: usize = 32;

/// Length in bytes of the generated session secret
pub const SESSION_SECRET_BYTES: usize = 64;

/// Generate `n` bytes from the OS random source, encoded URL-safe base64 (no padding).
///
/// # Errors
/// Returns `AppError::Encryption` if the OS random source is unavailable.
/// Callers at startup propagate it so the process never runs with a weak key.
pub fn random_token(n: usize) -> Result<String, AppError> {
    let mut bytes = vec![0u8; n];
    OsRng
        .try_fill_bytes(&mut bytes)
        .map_err(|e| AppError::Encryption(format!("secure random source unavailable: {e}")))?;
    Ok(general_purpose::URL_SAFE_NO_PAD.encode(&bytes))
}
