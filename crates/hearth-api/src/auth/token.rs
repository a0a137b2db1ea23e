//! Refresh token values
//!
//! A refresh token is 64 bytes from the OS CSPRNG, carried as URL-safe base64
//! without padding. The text form is opaque to clients; the server only checks
//! that it decodes to the right length before touching the store.

use base64::{engine::general_purpose::URL_SAFE_NO_PAD, Engine};
use rand::{rngs::OsRng, RngCore};
use sha2::{Digest, Sha256};
use thiserror::Error;

/// Decoded refresh token length in bytes
pub const REFRESH_TOKEN_BYTES: usize = 64;

/// Hex digits kept by `fingerprint`
pub const FINGERPRINT_LEN: usize = 12;

/// Why a presented refresh token was rejected before lookup
#[derive(Debug, Error, PartialEq, Eq)]
pub enum TokenFormatError {
    #[error("Refresh token is empty")]
    Empty,

    #[error("Refresh token is not valid base64")]
    NotBase64,

    #[error("Refresh token decodes to {0} bytes")]
    WrongLength(usize),
}

/// Generate a new refresh token value
pub fn generate_refresh_token() -> String {
    let mut bytes = [0u8; REFRESH_TOKEN_BYTES];
    OsRng.fill_bytes(&mut bytes);
    URL_SAFE_NO_PAD.encode(bytes)
}

/// Check that a presented value is a well-formed refresh token
///
/// Surrounding whitespace is not stripped: a stored value never contains it,
/// so such input is malformed.
pub fn validate_refresh_token(presented: &str) -> Result<(), TokenFormatError> {
    if presented.trim().is_empty() {
        return Err(TokenFormatError::Empty);
    }

    let decoded = URL_SAFE_NO_PAD
        .decode(presented)
        .map_err(|_| TokenFormatError::NotBase64)?;

    if decoded.len() != REFRESH_TOKEN_BYTES {
        return Err(TokenFormatError::WrongLength(decoded.len()));
    }

    Ok(())
}

/// Short label for log lines: the first 12 hex digits of the value's SHA-256.
/// Correlates log entries without exposing any part of the token.
pub fn fingerprint(value: &str) -> String {
    let mut hasher = Sha256::new();
    hasher.update(value.as_bytes());
    let mut digest = format!("{:x}", hasher.finalize());
    digest.truncate(FINGERPRINT_LEN);
    digest
}
