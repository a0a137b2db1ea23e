//! Application state management

use crate::auth::{
    AccountStore, PasswordError, PasswordHasher, PgCredentialStore, RefreshTokenStore,
    SessionService, TokenIssuer,
};
use hearth_core::config::{AppConfig, ConfigError};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;
use thiserror::Error;

/// Reasons the application state cannot be built
#[derive(Debug, Error)]
pub enum StateError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error(transparent)]
    Password(#[from] PasswordError),
}

/// Application state shared across handlers
pub struct AppState {
    /// Application configuration
    pub config: AppConfig,
    /// Session lifecycle service
    pub sessions: Arc<SessionService>,
    /// Database handle, absent when running on the in-memory store
    pub database: Option<PgCredentialStore>,
    /// Server start time
    pub start_time: Instant,
    /// Ready status
    pub is_ready: AtomicBool,
}

impl AppState {
    /// Wire the session service over the given stores
    ///
    /// `config` is validated here, so token lifetimes reaching the service
    /// are always within bounds.
    pub fn new(
        config: AppConfig,
        accounts: Arc<dyn AccountStore>,
        tokens: Arc<dyn RefreshTokenStore>,
        database: Option<PgCredentialStore>,
    ) -> Result<Self, StateError> {
        config.validate()?;

        let hasher = Arc::new(PasswordHasher::new(&config.password)?);
        let issuer = Arc::new(TokenIssuer::new(&config.auth));
        let sessions = SessionService::new(accounts, tokens, hasher, issuer, &config.auth);

        Ok(Self {
            config,
            sessions: Arc::new(sessions),
            database,
            start_time: Instant::now(),
            is_ready: AtomicBool::new(true),
        })
    }

    /// Get uptime in seconds
    pub fn uptime_secs(&self) -> u64 {
        self.start_time.elapsed().as_secs()
    }

    /// Check if service is ready
    pub fn is_ready(&self) -> bool {
        self.is_ready.load(Ordering::SeqCst)
    }

    /// Set ready status
    pub fn set_ready(&self, ready: bool) {
        self.is_ready.store(ready, Ordering::SeqCst);
    }

    /// Whether the credential store answers; always true in memory
    pub async fn store_reachable(&self) -> bool {
        match &self.database {
            Some(db) => db.ping().await,
            None => true,
        }
    }
}
