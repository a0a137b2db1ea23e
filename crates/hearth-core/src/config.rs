//! Hearth Configuration Management
//!
//! Handles configuration from environment variables and TOML config files
//! with sensible defaults for development. Everything here is loaded once at
//! startup and shared read-only afterwards.

use serde::{Deserialize, Serialize};
use std::path::PathBuf;

/// Development-only signing secret. `AuthConfig::validate` accepts it, but the
/// server logs a warning when it is still in use.
pub const DEVELOPMENT_JWT_SECRET: &str = "development-secret-key-change-in-production-0000";

/// Minimum HMAC secret length in bytes (256 bits)
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Longest accepted access token lifetime (one day)
pub const MAX_ACCESS_TOKEN_MINUTES: i64 = 24 * 60;

/// Longest accepted refresh token lifetime (one year)
pub const MAX_REFRESH_TOKEN_DAYS: i64 = 365;

/// Main application configuration
#[derive(Debug, Clone, Serialize, Deserialize, Default)]
#[serde(default)]
pub struct AppConfig {
    /// Server configuration
    pub server: ServerConfig,

    /// Database connection
    pub database: DatabaseConfig,

    /// Token signing and lifetimes
    pub auth: AuthConfig,

    /// Password hashing cost
    pub password: PasswordHashConfig,

    /// Logging configuration
    pub logging: LoggingConfig,
}

impl AppConfig {
    /// Load configuration from environment variables
    pub fn from_env() -> Result<Self, ConfigError> {
        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Load configuration from an arbitrary key lookup
    ///
    /// `from_env` is this function over `std::env::var`; tests pass a map.
    pub fn from_lookup<F>(lookup: F) -> Result<Self, ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let mut config = Self::default();
        config.apply_lookup(&lookup)?;
        Ok(config)
    }

    /// Load from a TOML file
    pub fn from_file(path: impl Into<PathBuf>) -> Result<Self, ConfigError> {
        let path = path.into();
        let content = std::fs::read_to_string(&path).map_err(|e| ConfigError::FileReadError {
            path: path.clone(),
            source: e,
        })?;

        toml::from_str(&content).map_err(|e| ConfigError::ParseError {
            path,
            message: e.to_string(),
        })
    }

    /// Merge with environment variables (env takes precedence)
    pub fn with_env_override(mut self) -> Result<Self, ConfigError> {
        self.apply_lookup(&|key: &str| std::env::var(key).ok())?;
        Ok(self)
    }

    /// Validate the whole configuration
    pub fn validate(&self) -> Result<(), ConfigError> {
        self.auth.validate()?;
        self.password.validate()?;
        Ok(())
    }

    fn apply_lookup<F>(&mut self, lookup: &F) -> Result<(), ConfigError>
    where
        F: Fn(&str) -> Option<String>,
    {
        // Server
        if let Some(host) = lookup("API_HOST") {
            self.server.host = host;
        }
        if let Some(port) = lookup("API_PORT") {
            self.server.port = parse_value("API_PORT", port)?;
        }
        if let Some(trust) = lookup("TRUST_PROXY_HEADERS") {
            self.server.trust_proxy_headers = parse_value("TRUST_PROXY_HEADERS", trust)?;
        }

        // PostgreSQL
        if let Some(url) = lookup("DATABASE_URL") {
            self.database.url = Some(url).filter(|u| !u.trim().is_empty());
        }
        if let Some(max) = lookup("DATABASE_MAX_CONNECTIONS") {
            self.database.max_connections = parse_value("DATABASE_MAX_CONNECTIONS", max)?;
        }

        // Tokens
        if let Some(secret) = lookup("JWT_SECRET") {
            self.auth.jwt_secret = secret;
        }
        if let Some(issuer) = lookup("JWT_ISSUER") {
            self.auth.issuer = issuer;
        }
        if let Some(audience) = lookup("JWT_AUDIENCE") {
            self.auth.audience = audience;
        }
        if let Some(minutes) = lookup("JWT_ACCESS_TOKEN_MINUTES") {
            self.auth.access_token_minutes = parse_value("JWT_ACCESS_TOKEN_MINUTES", minutes)?;
        }
        if let Some(days) = lookup("JWT_REFRESH_TOKEN_DAYS") {
            self.auth.refresh_token_days = parse_value("JWT_REFRESH_TOKEN_DAYS", days)?;
        }

        // Password hashing
        if let Some(memory) = lookup("PASSWORD_MEMORY_KIB") {
            self.password.memory_kib = parse_value("PASSWORD_MEMORY_KIB", memory)?;
        }
        if let Some(iterations) = lookup("PASSWORD_ITERATIONS") {
            self.password.iterations = parse_value("PASSWORD_ITERATIONS", iterations)?;
        }
        if let Some(parallelism) = lookup("PASSWORD_PARALLELISM") {
            self.password.parallelism = parse_value("PASSWORD_PARALLELISM", parallelism)?;
        }

        // Logging
        if let Some(level) = lookup("LOG_LEVEL") {
            self.logging.level = level;
        }
        if let Some(json) = lookup("LOG_JSON") {
            self.logging.json_format = parse_value("LOG_JSON", json)?;
        }

        Ok(())
    }
}

fn parse_value<T: std::str::FromStr>(key: &str, value: String) -> Result<T, ConfigError> {
    value.trim().parse().map_err(|_| ConfigError::InvalidValue {
        key: key.to_string(),
        value,
    })
}

/// Server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Host to bind to
    pub host: String,

    /// Port to listen on
    pub port: u16,

    /// Allowed origins for CORS
    pub cors_origins: Vec<String>,

    /// Take the client address from `X-Forwarded-For` / `X-Real-IP`.
    /// Only enable behind a proxy that overwrites these headers.
    pub trust_proxy_headers: bool,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: "0.0.0.0".to_string(),
            port: 8080,
            cors_origins: vec![],
            trust_proxy_headers: false,
        }
    }
}

/// Database connection configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL. `None` runs against the in-memory store.
    pub url: Option<String>,

    /// PostgreSQL connection pool size
    pub max_connections: u32,
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            url: None,
            max_connections: 10,
        }
    }
}

/// Access and refresh token configuration
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct AuthConfig {
    /// HMAC signing secret for access tokens
    pub jwt_secret: String,

    /// `iss` claim
    pub issuer: String,

    /// `aud` claim
    pub audience: String,

    /// Access token lifetime in minutes
    pub access_token_minutes: i64,

    /// Refresh token lifetime in days
    pub refresh_token_days: i64,
}

impl Default for AuthConfig {
    fn default() -> Self {
        Self {
            jwt_secret: DEVELOPMENT_JWT_SECRET.to_string(),
            issuer: "hearth-api".to_string(),
            audience: "hearth".to_string(),
            access_token_minutes: 15,
            refresh_token_days: 7,
        }
    }
}

impl std::fmt::Debug for AuthConfig {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthConfig")
            .field("jwt_secret", &"<redacted>")
            .field("issuer", &self.issuer)
            .field("audience", &self.audience)
            .field("access_token_minutes", &self.access_token_minutes)
            .field("refresh_token_days", &self.refresh_token_days)
            .finish()
    }
}

impl AuthConfig {
    /// Reject secrets and lifetimes that cannot produce a safe token
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.jwt_secret.len() < MIN_JWT_SECRET_LEN {
            return Err(ConfigError::InvalidValue {
                key: "JWT_SECRET".to_string(),
                value: format!(
                    "<{} bytes, at least {MIN_JWT_SECRET_LEN} required>",
                    self.jwt_secret.len()
                ),
            });
        }
        if self.issuer.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_ISSUER".to_string()));
        }
        if self.audience.trim().is_empty() {
            return Err(ConfigError::MissingRequired("JWT_AUDIENCE".to_string()));
        }
        if !(1..=MAX_ACCESS_TOKEN_MINUTES).contains(&self.access_token_minutes) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_ACCESS_TOKEN_MINUTES".to_string(),
                value: self.access_token_minutes.to_string(),
            });
        }
        if !(1..=MAX_REFRESH_TOKEN_DAYS).contains(&self.refresh_token_days) {
            return Err(ConfigError::InvalidValue {
                key: "JWT_REFRESH_TOKEN_DAYS".to_string(),
                value: self.refresh_token_days.to_string(),
            });
        }
        Ok(())
    }

    /// True while the built-in development secret is still configured
    pub fn uses_development_secret(&self) -> bool {
        self.jwt_secret == DEVELOPMENT_JWT_SECRET
    }
}

/// Argon2id cost parameters
///
/// The stored hash carries only salt and digest, so these values must stay
/// fixed for the lifetime of the stored credentials.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
#[serde(default)]
pub struct PasswordHashConfig {
    /// Memory cost in KiB (default: 131072 = 128 MiB)
    pub memory_kib: u32,
    /// Passes over memory (default: 4)
    pub iterations: u32,
    /// Lanes (default: 8)
    pub parallelism: u32,
}

impl Default for PasswordHashConfig {
    fn default() -> Self {
        Self {
            memory_kib: 128 * 1024,
            iterations: 4,
            parallelism: 8,
        }
    }
}

impl PasswordHashConfig {
    /// Argon2 needs at least 8 KiB of memory per lane and one pass
    pub fn validate(&self) -> Result<(), ConfigError> {
        if self.parallelism == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_PARALLELISM".to_string(),
                value: self.parallelism.to_string(),
            });
        }
        if self.iterations == 0 {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_ITERATIONS".to_string(),
                value: self.iterations.to_string(),
            });
        }
        if self.memory_kib < self.parallelism.saturating_mul(8) {
            return Err(ConfigError::InvalidValue {
                key: "PASSWORD_MEMORY_KIB".to_string(),
                value: self.memory_kib.to_string(),
            });
        }
        Ok(())
    }
}

/// Logging configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error)
    pub level: String,

    /// JSON format for logs
    pub json_format: bool,
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".to_string(),
            json_format: false,
        }
    }
}

/// Configuration errors
#[derive(Debug, thiserror::Error)]
pub enum ConfigError {
    #[error("Failed to read config file {path}: {source}")]
    FileReadError {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("Failed to parse config file {path}: {message}")]
    ParseError { path: PathBuf, message: String },

    #[error("Invalid value for {key}: {value}")]
    InvalidValue { key: String, value: String },

    #[error("Missing required configuration: {0}")]
    MissingRequired(String),
}
