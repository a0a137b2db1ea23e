//! In-memory credential store
//!
//! Used by tests and when the server runs without `DATABASE_URL`. All
//! refresh token writes happen under one write lock, so `save` is a true
//! compare-and-set.

use super::models::{Account, RefreshToken};
use super::repository::{AccountStore, RefreshTokenStore, RepositoryError};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use tokio::sync::RwLock;
use uuid::Uuid;

/// Accounts and refresh tokens held in process memory
#[derive(Default)]
pub struct InMemoryCredentialStore {
    accounts: RwLock<HashMap<Uuid, Account>>,
    tokens: RwLock<HashMap<String, RefreshToken>>,
    token_operations: AtomicU64,
}

impl InMemoryCredentialStore {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add or replace an account
    pub async fn upsert_account(&self, account: Account) {
        self.accounts.write().await.insert(account.id, account);
    }

    /// Number of refresh token operations served so far
    pub fn token_operations(&self) -> u64 {
        self.token_operations.load(Ordering::SeqCst)
    }

    /// All tokens owned by an account, oldest first
    pub async fn tokens_for_owner(&self, owner_id: Uuid) -> Vec<RefreshToken> {
        let mut tokens: Vec<RefreshToken> = self
            .tokens
            .read()
            .await
            .values()
            .filter(|t| t.owner_id == owner_id)
            .cloned()
            .collect();
        tokens.sort_by_key(|t| t.issued_at);
        tokens
    }

    fn count_operation(&self) {
        self.token_operations.fetch_add(1, Ordering::SeqCst);
    }
}

#[async_trait]
impl AccountStore for InMemoryCredentialStore {
    async fn find_by_identifier(
        &self,
        identifier: &str,
    ) -> Result<Option<Account>, RepositoryError> {
        // Full Unicode lowercase, like PostgreSQL `lower()`
        let identifier = identifier.trim().to_lowercase();
        Ok(self
            .accounts
            .read()
            .await
            .values()
            .find(|a| a.email.to_lowercase() == identifier)
            .cloned())
    }

    async fn find_by_id(&self, id: Uuid) -> Result<Option<Account>, RepositoryError> {
        Ok(self.accounts.read().await.get(&id).cloned())
    }
}

#[async_trait]
impl RefreshTokenStore for InMemoryCredentialStore {
    async fn insert(&self, token: &RefreshToken) -> Result<(), RepositoryError> {
        self.count_operation();
        let mut tokens = self.tokens.write().await;
        if tokens.contains_key(&token.value) {
            return Err(RepositoryError::DuplicateToken);
        }
        tokens.insert(token.value.clone(), token.clone());
        Ok(())
    }

    async fn find_by_value(&self, value: &str) -> Result<Option<RefreshToken>, RepositoryError> {
        self.count_operation();
        Ok(self.tokens.read().await.get(value).cloned())
    }

    async fn save(&self, token: &RefreshToken) -> Result<bool, RepositoryError> {
        self.count_operation();
        let mut tokens = self.tokens.write().await;
        match tokens.get_mut(&token.value) {
            Some(stored) if stored.revoked_at.is_none() => {
                stored.revoked_at = token.revoked_at;
                stored.revoked_by_ip = token.revoked_by_ip.clone();
                stored.replaced_by_value = token.replaced_by_value.clone();
                Ok(true)
            }
            _ => Ok(false),
        }
    }

    async fn revoke_all_for_owner(
        &self,
        owner_id: Uuid,
        at: DateTime<Utc>,
        by_ip: &str,
    ) -> Result<u64, RepositoryError> {
        self.count_operation();
        let mut tokens = self.tokens.write().await;
        let mut revoked = 0;
        for token in tokens
            .values_mut()
            .filter(|t| t.owner_id == owner_id && t.revoked_at.is_none())
        {
            token.revoked_at = Some(at);
            token.revoked_by_ip = Some(by_ip.to_string());
            revoked += 1;
        }
        Ok(revoked)
    }
}
