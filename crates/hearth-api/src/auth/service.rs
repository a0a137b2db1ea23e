//! Session service
//!
//! Business logic for login, refresh-token rotation and logout. Every
//! authentication failure carries its precise cause for the audit log, while
//! the HTTP layer collapses all of them into one uniform response.

use super::jwt::{JwtError, TokenIssuer};
use super::models::{Account, AccountSummary, RefreshToken};
use super::password::PasswordHasher;
use super::repository::{AccountStore, RefreshTokenStore, RepositoryError};
use super::token::{fingerprint, generate_refresh_token, validate_refresh_token, TokenFormatError};
use crate::audit::{audit_log, AuditEvent};
use chrono::{DateTime, Duration, Utc};
use hearth_core::AuthConfig;
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Tokens and account summary returned by login and refresh
#[derive(Debug, Clone)]
pub struct SessionBundle {
    pub access_token: String,
    pub access_expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub account: AccountSummary,
}

/// Why a login was refused. Logged, never returned to the client.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CredentialFailure {
    UnknownIdentifier,
    NoStoredCredential,
    PasswordMismatch,
    AccountUnavailable,
}

impl std::fmt::Display for CredentialFailure {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let reason = match self {
            CredentialFailure::UnknownIdentifier => "unknown identifier",
            CredentialFailure::NoStoredCredential => "no stored credential",
            CredentialFailure::PasswordMismatch => "password mismatch",
            CredentialFailure::AccountUnavailable => "account no longer exists",
        };
        f.write_str(reason)
    }
}

/// Session lifecycle errors
#[derive(Debug, Error)]
pub enum SessionError {
    #[error("Invalid credentials: {0}")]
    InvalidCredentials(CredentialFailure),

    #[error("Malformed refresh token: {0}")]
    TokenMalformed(#[from] TokenFormatError),

    #[error("Refresh token not found")]
    TokenNotFound,

    #[error("Refresh token expired or revoked")]
    TokenExpiredOrRevoked,

    #[error("Credential store failure: {0}")]
    Repository(#[from] RepositoryError),

    #[error("Access token issuance failed: {0}")]
    Token(#[from] JwtError),

    #[error("Password verification task failed: {0}")]
    Worker(String),
}

impl SessionError {
    /// True for the failures a client may cause; these all look the same
    /// from outside. Everything else is an internal fault.
    pub fn is_authentication_failure(&self) -> bool {
        matches!(
            self,
            SessionError::InvalidCredentials(_)
                | SessionError::TokenMalformed(_)
                | SessionError::TokenNotFound
                | SessionError::TokenExpiredOrRevoked
        )
    }
}

/// Session service
///
/// Stores, hasher and issuer are injected at construction and shared
/// read-only across requests.
#[derive(Clone)]
pub struct SessionService {
    accounts: Arc<dyn AccountStore>,
    tokens: Arc<dyn RefreshTokenStore>,
    hasher: Arc<PasswordHasher>,
    issuer: Arc<TokenIssuer>,
    refresh_lifetime: Duration,
}

impl SessionService {
    /// Create a new session service
    pub fn new(
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        hasher: Arc<PasswordHasher>,
        issuer: Arc<TokenIssuer>,
        config: &AuthConfig,
    ) -> Self {
        Self {
            accounts,
            tokens,
            hasher,
            issuer,
            refresh_lifetime: Duration::days(config.refresh_token_days),
        }
    }

    /// Access token issuer shared with the request middleware
    pub fn issuer(&self) -> &Arc<TokenIssuer> {
        &self.issuer
    }

    /// Login with identifier and password
    ///
    /// Unknown identifier, missing credential and wrong password all fail
    /// with `InvalidCredentials`.
    pub async fn login(
        &self,
        identifier: &str,
        secret: &str,
        client_ip: &str,
    ) -> Result<SessionBundle, SessionError> {
        let result = self.try_login(identifier, secret, client_ip).await;

        match &result {
            Ok(bundle) => audit_log(&AuditEvent::LoginSuccess {
                account_id: bundle.account.id,
                email: bundle.account.email.clone(),
                ip_address: client_ip.to_string(),
            }),
            Err(e) if e.is_authentication_failure() => audit_log(&AuditEvent::LoginFailure {
                email: identifier.to_string(),
                reason: e.to_string(),
                ip_address: client_ip.to_string(),
            }),
            Err(e) => tracing::error!(error = %e, "Login aborted by internal failure"),
        }

        result
    }

    async fn try_login(
        &self,
        identifier: &str,
        secret: &str,
        client_ip: &str,
    ) -> Result<SessionBundle, SessionError> {
        let Some(account) = self.accounts.find_by_identifier(identifier).await? else {
            // Pay the same Argon2 cost as a wrong password so response time
            // does not reveal whether the account exists
            self.verify_password(secret, self.hasher.decoy().to_owned())
                .await?;
            return Err(SessionError::InvalidCredentials(
                CredentialFailure::UnknownIdentifier,
            ));
        };

        // Never hash against an absent credential
        let stored = account
            .password_hash
            .clone()
            .ok_or(SessionError::InvalidCredentials(
                CredentialFailure::NoStoredCredential,
            ))?;

        if !self.verify_password(secret, stored).await? {
            return Err(SessionError::InvalidCredentials(
                CredentialFailure::PasswordMismatch,
            ));
        }

        let now = Utc::now();
        let access = self.issuer.issue(&account, now)?;

        let refresh = RefreshToken::new(
            generate_refresh_token(),
            account.id,
            now,
            self.refresh_lifetime,
            client_ip,
        );
        self.tokens.insert(&refresh).await?;

        Ok(Self::bundle(&account, access.token, access.expires_at, refresh))
    }

    /// Exchange an active refresh token for a new one and a new access token
    ///
    /// The presented token is revoked with a compare-and-set, so when two
    /// requests race on the same token exactly one of them succeeds.
    pub async fn refresh(
        &self,
        presented: &str,
        client_ip: &str,
    ) -> Result<SessionBundle, SessionError> {
        let result = self.try_refresh(presented, client_ip).await;

        match &result {
            Ok(bundle) => audit_log(&AuditEvent::TokenRefresh {
                account_id: bundle.account.id,
                token: fingerprint(presented),
                replaced_by: fingerprint(&bundle.refresh_token),
                ip_address: client_ip.to_string(),
            }),
            Err(e) if e.is_authentication_failure() => {
                audit_log(&AuditEvent::TokenRefreshFailure {
                    token: fingerprint(presented),
                    reason: e.to_string(),
                    ip_address: client_ip.to_string(),
                })
            }
            Err(e) => tracing::error!(error = %e, "Refresh aborted by internal failure"),
        }

        result
    }

    async fn try_refresh(
        &self,
        presented: &str,
        client_ip: &str,
    ) -> Result<SessionBundle, SessionError> {
        // Fast reject before any store access
        validate_refresh_token(presented)?;

        let now = Utc::now();
        let current = self
            .tokens
            .find_by_value(presented)
            .await?
            .ok_or(SessionError::TokenNotFound)?;

        if !current.is_active(now) {
            return Err(SessionError::TokenExpiredOrRevoked);
        }

        let account = self
            .accounts
            .find_by_id(current.owner_id)
            .await?
            .ok_or(SessionError::InvalidCredentials(
                CredentialFailure::AccountUnavailable,
            ))?;

        let access = self.issuer.issue(&account, now)?;

        let replacement = RefreshToken::new(
            generate_refresh_token(),
            account.id,
            now,
            self.refresh_lifetime,
            client_ip,
        );
        let rotated = current.revoked(now, client_ip, Some(replacement.value.clone()));

        if !self.tokens.save(&rotated).await? {
            // Lost the race against a concurrent refresh or logout
            return Err(SessionError::TokenExpiredOrRevoked);
        }
        self.tokens.insert(&replacement).await?;

        Ok(Self::bundle(
            &account,
            access.token,
            access.expires_at,
            replacement,
        ))
    }

    /// Revoke a refresh token
    ///
    /// Returns `true` only for the call that performed the revocation.
    /// Malformed, unknown, expired and already revoked tokens return `false`
    /// without side effects.
    pub async fn logout(&self, presented: &str, client_ip: &str) -> Result<bool, SessionError> {
        if let Err(e) = validate_refresh_token(presented) {
            tracing::debug!(reason = %e, "Logout with malformed refresh token");
            return Ok(false);
        }

        let now = Utc::now();
        let Some(current) = self.tokens.find_by_value(presented).await? else {
            tracing::debug!(token = %fingerprint(presented), "Logout with unknown refresh token");
            return Ok(false);
        };

        if !current.is_active(now) {
            tracing::debug!(token = %fingerprint(presented), "Logout with inactive refresh token");
            return Ok(false);
        }

        let revoked = self.tokens.save(&current.revoked(now, client_ip, None)).await?;

        if revoked {
            audit_log(&AuditEvent::Logout {
                account_id: current.owner_id,
                token: fingerprint(presented),
                ip_address: client_ip.to_string(),
            });
        }

        Ok(revoked)
    }

    /// Revoke every active refresh token of an account
    pub async fn logout_all(&self, account_id: Uuid, client_ip: &str) -> Result<u64, SessionError> {
        let revoked = self
            .tokens
            .revoke_all_for_owner(account_id, Utc::now(), client_ip)
            .await?;

        audit_log(&AuditEvent::LogoutAll {
            account_id,
            revoked,
            ip_address: client_ip.to_string(),
        });

        Ok(revoked)
    }

    /// Argon2 is CPU and memory bound, so it runs on the blocking pool
    async fn verify_password(&self, secret: &str, stored: String) -> Result<bool, SessionError> {
        let hasher = Arc::clone(&self.hasher);
        let secret = secret.to_owned();

        tokio::task::spawn_blocking(move || hasher.verify(&secret, &stored))
            .await
            .map_err(|e| SessionError::Worker(e.to_string()))
    }

    fn bundle(
        account: &Account,
        access_token: String,
        access_expires_at: DateTime<Utc>,
        refresh: RefreshToken,
    ) -> SessionBundle {
        SessionBundle {
            access_token,
            access_expires_at,
            refresh_token: refresh.value,
            refresh_expires_at: refresh.expires_at,
            account: account.to_summary(),
        }
    }
}
