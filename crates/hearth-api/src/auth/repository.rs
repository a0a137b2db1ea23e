//! Credential store contracts and the PostgreSQL implementation
//!
//! This module provides the persistence seams of the auth subsystem:
//! - `AccountStore`: account lookup by login identifier or id
//! - `RefreshTokenStore`: insert/find/conditional-save of refresh tokens
//!
//! `PgCredentialStore` implements both over SQLx. The in-memory
//! implementation lives in `auth::memory`.

use super::models::{Account, RefreshToken};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::{PgPool, PgPoolOptions};
use thiserror::Error;
use uuid::Uuid;

/// Repository errors
#[derive(Debug, Error)]
pub enum RepositoryError {
    #[error("Database error: {0}")]
    DatabaseError(String),

    #[error("Duplicate refresh token value")]
    DuplicateToken,

    #[error("Migration failed: {0}")]
    MigrationError(String),
}

impl From<sqlx::Error> for RepositoryError {
    fn from(err: sqlx::Error) -> Self {
        if let sqlx::Error::Database(db_err) = &err {
            if db_err.is_unique_violation() {
                return RepositoryError::DuplicateToken;
            }
        }
        RepositoryError::DatabaseError(err.to_string())
    }
}

/// Account lookups
#[async_trait]
pub trait AccountStore: Send + Sync {
    /// Find an account by its login identifier (email)
    async fn find_by_identifier(&self, identifier: &str)
        -> Result<Option<Account>, RepositoryError>;

    /// Find an account by id
    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError>;
}

/// Refresh token persistence
///
/// Only single-record atomicity is assumed. `save` is a compare-and-set on
/// `revoked_at IS NULL`, which is what makes rotation safe under concurrent
/// refreshes of the same token.
#[async_trait]
pub trait RefreshTokenStore: Send + Sync {
    /// Insert a new token
    async fn insert(&self, token: &RefreshToken) -> Result<(), RepositoryError>;

    /// Find a token by its exact value
    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, RepositoryError>;

    /// Persist the revocation fields of `token`
    ///
    /// The write only applies if the stored record is still unrevoked.
    /// Returns `true` when this call performed the revocation.
    async fn save(&self, token: &RefreshToken) -> Result<bool, RepositoryError>;

    /// Revoke every unrevoked token of an account; returns how many
    async fn revoke_all_for_owner(
        &self,
        owner_id: Uuid,
        at: DateTime<Utc>,
        by_ip: &str,
    ) -> Result<u64, RepositoryError>;
}

/// PostgreSQL credential store
#[derive(Clone)]
pub struct PgCredentialStore {
    pool: PgPool,
}

impl PgCredentialStore {
    /// Connect a new pool
    pub async fn connect(database_url: &str, max_connections: u32) -> Result<Self, RepositoryError> {
        let pool = PgPoolOptions::new()
            .max_connections(max_connections)
            .connect(database_url)
            .await
            .map_err(|e| {
                RepositoryError::DatabaseError(format!("PostgreSQL connection failed: {e}"))
            })?;

        Ok(Self { pool })
    }

    /// Apply the embedded schema migrations
    pub async fn migrate(&self) -> Result<(), RepositoryError> {
        sqlx::migrate!("./migrations")
            .run(&self.pool)
            .await
            .map_err(|e| RepositoryError::MigrationError(e.to_string()))
    }

    /// Check connectivity
    pub async fn ping(&self) -> bool {
        sqlx::query("SELECT 1").execute(&self.pool).await.is_ok()
    }
}

const ACCOUNT_COLUMNS: &str = "id, email, display_name, password_hash, roles";

const TOKEN_COLUMNS: &str = "value, owner_id, issued_at, expires_at, created_by_ip, \
                             revoked_at, revoked_by_ip, replaced_by_value";

#[async_trait]
impl AccountStore for PgCredentialStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE lower(email) = lower($1)"
        ))
        .bind(identifier.trim())
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        let account = sqlx::query_as::<_, Account>(&format!(
            "SELECT {ACCOUNT_COLUMNS} FROM accounts WHERE id = $1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(account)
    }
}

#[async_trait]
impl RefreshTokenStore for PgCredentialStore {
    async fn insert(&self, token: &RefreshToken) -> Result<(), RepositoryError> {
        sqlx::query(&format!(
            "INSERT INTO refresh_tokens ({TOKEN_COLUMNS}) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)"
        ))
        .bind(&token.value)
        .bind(token.owner_id)
        .bind(token.issued_at)
        .bind(token.expires_at)
        .bind(&token.created_by_ip)
        .bind(token.revoked_at)
        .bind(&token.revoked_by_ip)
        .bind(&token.replaced_by_value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, RepositoryError> {
        let token = sqlx::query_as::<_, RefreshToken>(&format!(
            "SELECT {TOKEN_COLUMNS} FROM refresh_tokens WHERE value = $1"
        ))
        .bind(value)
        .fetch_optional(&self.pool)
        .await?;

        Ok(token)
    }

    async fn save(&self, token: &RefreshToken) -> Result<bool, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = $2, revoked_by_ip = $3, replaced_by_value = $4 \
             WHERE value = $1 AND revoked_at IS NULL",
        )
        .bind(&token.value)
        .bind(token.revoked_at)
        .bind(&token.revoked_by_ip)
        .bind(&token.replaced_by_value)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected() == 1)
    }

    async fn revoke_all_for_owner(
        &self,
        owner_id: Uuid,
        at: DateTime<Utc>,
        by_ip: &str,
    ) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            "UPDATE refresh_tokens \
             SET revoked_at = $2, revoked_by_ip = $3 \
             WHERE owner_id = $1 AND revoked_at IS NULL",
        )
        .bind(owner_id)
        .bind(at)
        .bind(by_ip)
        .execute(&self.pool)
        .await?;

        Ok(result.rows_affected())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_repository_error_display() {
        let err = RepositoryError::DatabaseError("connection reset".to_string());
        assert_eq!(err.to_string(), "Database error: connection reset");
        assert_eq!(
            RepositoryError::DuplicateToken.to_string(),
            "Duplicate refresh token value"
        );
    }

    #[test]
    fn test_row_not_found_maps_to_database_error() {
        let err: RepositoryError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, RepositoryError::DatabaseError(_)));
    }

    #[tokio::test]
    #[ignore = "requires database"]
    async fn test_conditional_save_against_postgres() {
        let url = std::env::var("DATABASE_URL").expect("DATABASE_URL must be set");
        let store = PgCredentialStore::connect(&url, 2).await.unwrap();
        store.migrate().await.unwrap();

        let owner = Uuid::new_v4();
        sqlx::query("INSERT INTO accounts (id, email, display_name) VALUES ($1, $2, 'Pg Test')")
            .bind(owner)
            .bind(format!("{owner}@example.com"))
            .execute(&store.pool)
            .await
            .unwrap();

        let now = Utc::now();
        let token = RefreshToken::new(
            crate::auth::token::generate_refresh_token(),
            owner,
            now,
            chrono::Duration::days(7),
            "127.0.0.1",
        );
        store.insert(&token).await.unwrap();

        let revoked = token.revoked(now, "127.0.0.1", None);
        assert!(store.save(&revoked).await.unwrap());
        assert!(!store.save(&revoked).await.unwrap());
    }
}
