//! JWT access token issuance and validation
//!
//! Implements stateless access tokens with HMAC-SHA256 signing.
//! Tokens are never stored and cannot be revoked; their lifetime is short.

use super::models::Account;
use chrono::{DateTime, Duration, TimeZone, Utc};
use hearth_core::AuthConfig;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use thiserror::Error;
use uuid::Uuid;

/// JWT Claims structure containing account identity
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct AccessClaims {
    /// Token issuer
    pub iss: String,
    /// Intended audience
    pub aud: String,
    /// Subject - account ID
    pub sub: String,
    /// JWT ID - unique per token
    pub jti: String,
    /// Issued at timestamp (Unix epoch)
    pub iat: i64,
    /// Expiration timestamp (Unix epoch)
    pub exp: i64,
    /// Account email (login identifier)
    pub email: String,
    /// Display name
    pub name: String,
    /// Opaque capability labels, evaluated by callers
    #[serde(default)]
    pub roles: Vec<String>,
}

/// JWT token generation and validation errors
#[derive(Debug, Error)]
pub enum JwtError {
    #[error("Failed to encode JWT: {0}")]
    EncodingError(#[from] jsonwebtoken::errors::Error),

    #[error("Invalid token format")]
    InvalidToken,

    #[error("Token has expired")]
    ExpiredToken,

    #[error("Invalid token signature")]
    InvalidSignature,
}

/// A freshly signed access token
#[derive(Debug, Clone)]
pub struct IssuedAccessToken {
    pub token: String,
    pub expires_at: DateTime<Utc>,
}

/// Signs and verifies access tokens with the process-wide key
///
/// Built once at startup from `AuthConfig` and shared behind an `Arc`.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    issuer: String,
    audience: String,
    lifetime: Duration,
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("lifetime", &self.lifetime)
            .finish()
    }
}

impl TokenIssuer {
    pub fn new(config: &AuthConfig) -> Self {
        Self {
            encoding_key: EncodingKey::from_secret(config.jwt_secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(config.jwt_secret.as_bytes()),
            issuer: config.issuer.clone(),
            audience: config.audience.clone(),
            lifetime: Duration::minutes(config.access_token_minutes),
        }
    }

    /// Issue an access token for an account, expiring `lifetime` after `now`
    pub fn issue(
        &self,
        account: &Account,
        now: DateTime<Utc>,
    ) -> Result<IssuedAccessToken, JwtError> {
        let expires_at = now + self.lifetime;

        let claims = AccessClaims {
            iss: self.issuer.clone(),
            aud: self.audience.clone(),
            sub: account.id.to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: now.timestamp(),
            exp: expires_at.timestamp(),
            email: account.email.clone(),
            name: account.display_name.clone(),
            roles: account.roles.clone(),
        };

        let token = encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key)?;

        Ok(IssuedAccessToken {
            token,
            // Second precision, matching what the token itself carries
            expires_at: Utc
                .timestamp_opt(claims.exp, 0)
                .single()
                .unwrap_or(expires_at),
        })
    }

    /// Validate an access token and extract its claims
    ///
    /// Pure function of the token and the signing key: signature, issuer,
    /// audience and expiry. No store is consulted. A token is valid only
    /// while `now < exp`.
    pub fn verify(&self, token: &str) -> Result<AccessClaims, JwtError> {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.set_issuer(&[&self.issuer]);
        validation.set_audience(&[&self.audience]);
        validation.set_required_spec_claims(&["exp", "iss", "aud", "sub"]);
        validation.leeway = 0;

        let token_data =
            decode::<AccessClaims>(token, &self.decoding_key, &validation).map_err(|e| {
                match e.kind() {
                    jsonwebtoken::errors::ErrorKind::ExpiredSignature => JwtError::ExpiredToken,
                    jsonwebtoken::errors::ErrorKind::InvalidSignature => {
                        JwtError::InvalidSignature
                    }
                    _ => JwtError::InvalidToken,
                }
            })?;

        // jsonwebtoken still accepts `exp == now`; access ends strictly at `exp`
        if token_data.claims.exp <= Utc::now().timestamp() {
            return Err(JwtError::ExpiredToken);
        }

        Ok(token_data.claims)
    }
}
