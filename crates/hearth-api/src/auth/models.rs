//! Data models for authentication and session management
//!
//! This module defines the core data structures for the auth system:
//! - Account: the identity record as seen by this subsystem
//! - RefreshToken: one issued long-lived credential, with its audit fields
//!
//! These map to the `accounts` and `refresh_tokens` tables.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use utoipa::ToSchema;
use uuid::Uuid;

/// Account record as consumed by the session service
///
/// The identity record itself is owned elsewhere; this is the subset needed
/// to authenticate and to build access token claims.
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct Account {
    /// Unique account identifier
    pub id: Uuid,

    /// Login identifier (unique)
    pub email: String,

    /// Display name
    pub display_name: String,

    /// Encoded `salt || digest` credential, absent when no password is set.
    /// This field is never serialized in API responses.
    #[serde(skip_serializing)]
    pub password_hash: Option<String>,

    /// Opaque capability labels
    #[serde(default)]
    pub roles: Vec<String>,
}

impl Account {
    /// Public representation (without the credential)
    pub fn to_summary(&self) -> AccountSummary {
        AccountSummary {
            id: self.id,
            email: self.email.clone(),
            display_name: self.display_name.clone(),
            roles: self.roles.clone(),
        }
    }
}

/// Public account representation (safe for API responses)
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, ToSchema)]
pub struct AccountSummary {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

/// Refresh token record
///
/// Append-only: a record is created at login or rotation, and afterwards only
/// its revocation fields are written, exactly once.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq, sqlx::FromRow)]
pub struct RefreshToken {
    /// Opaque token value (primary key)
    pub value: String,

    /// Account this token authenticates
    pub owner_id: Uuid,

    /// Issue time
    pub issued_at: DateTime<Utc>,

    /// Expiration time
    pub expires_at: DateTime<Utc>,

    /// Client address of the issuing request
    pub created_by_ip: String,

    /// Revocation time (if revoked)
    pub revoked_at: Option<DateTime<Utc>>,

    /// Client address of the revoking request
    pub revoked_by_ip: Option<String>,

    /// Token that superseded this one; only set by rotation
    pub replaced_by_value: Option<String>,
}

impl RefreshToken {
    /// Create a new, active refresh token
    pub fn new(
        value: String,
        owner_id: Uuid,
        issued_at: DateTime<Utc>,
        lifetime: chrono::Duration,
        created_by_ip: impl Into<String>,
    ) -> Self {
        Self {
            value,
            owner_id,
            issued_at,
            expires_at: issued_at + lifetime,
            created_by_ip: created_by_ip.into(),
            revoked_at: None,
            revoked_by_ip: None,
            replaced_by_value: None,
        }
    }

    /// Check if the token is expired at `now`
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    /// Check if the token is revoked
    pub fn is_revoked(&self) -> bool {
        self.revoked_at.is_some()
    }

    /// Check if the token is active (not expired and not revoked)
    pub fn is_active(&self, now: DateTime<Utc>) -> bool {
        !self.is_revoked() && !self.is_expired(now)
    }

    /// Copy of this record with its revocation fields set
    ///
    /// `replaced_by` is `Some` for rotation and `None` for logout.
    pub fn revoked(
        &self,
        at: DateTime<Utc>,
        by_ip: impl Into<String>,
        replaced_by: Option<String>,
    ) -> Self {
        Self {
            revoked_at: Some(at),
            revoked_by_ip: Some(by_ip.into()),
            replaced_by_value: replaced_by,
            ..self.clone()
        }
    }
}
