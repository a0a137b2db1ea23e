//! Hearth Core - configuration shared by every Hearth binary
//!
//! Application configuration is read from environment variables and TOML
//! files before any request is served, then validated once.

pub mod config;

pub use config::{
    AppConfig, AuthConfig, ConfigError, DatabaseConfig, LoggingConfig, PasswordHashConfig,
    ServerConfig,
};
