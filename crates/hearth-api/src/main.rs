//! Hearth API Server
//!
//! Session lifecycle endpoints over PostgreSQL, or over process memory when
//! no `DATABASE_URL` is configured.

use anyhow::Context;
use hearth_api::auth::{AccountStore, InMemoryCredentialStore, PgCredentialStore, RefreshTokenStore};
use hearth_api::{create_router, state::AppState};
use hearth_core::config::{AppConfig, LoggingConfig};
use std::net::SocketAddr;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = load_config()?;
    init_tracing(&config.logging);

    config.validate().context("invalid configuration")?;

    if config.auth.uses_development_secret() {
        tracing::warn!("JWT_SECRET is not set; using the built-in development signing key");
    }

    let (accounts, tokens, database) = match &config.database.url {
        Some(url) => {
            let store = PgCredentialStore::connect(url, config.database.max_connections).await?;
            store.migrate().await?;
            tracing::info!("Connected to PostgreSQL credential store");

            let shared = Arc::new(store.clone());
            let accounts: Arc<dyn AccountStore> = shared.clone();
            let tokens: Arc<dyn RefreshTokenStore> = shared;
            (accounts, tokens, Some(store))
        }
        None => {
            tracing::warn!("DATABASE_URL is not set; using an empty in-memory credential store");
            let store = Arc::new(InMemoryCredentialStore::new());
            let accounts: Arc<dyn AccountStore> = store.clone();
            let tokens: Arc<dyn RefreshTokenStore> = store;
            (accounts, tokens, None)
        }
    };

    let addr = format!("{}:{}", config.server.host, config.server.port);

    let state = Arc::new(AppState::new(config, accounts, tokens, database)?);
    let app = create_router(state);

    let listener = tokio::net::TcpListener::bind(&addr).await?;
    tracing::info!("Hearth API Server starting on http://{}", addr);
    tracing::info!("OpenAPI spec at http://{}/api-docs/openapi.json", addr);

    axum::serve(
        listener,
        app.into_make_service_with_connect_info::<SocketAddr>(),
    )
    .await?;

    Ok(())
}

/// `HEARTH_CONFIG` names a TOML file; the environment overrides it
fn load_config() -> anyhow::Result<AppConfig> {
    let config = match std::env::var("HEARTH_CONFIG") {
        Ok(path) => AppConfig::from_file(&path)?.with_env_override()?,
        Err(_) => AppConfig::from_env()?,
    };
    Ok(config)
}

fn init_tracing(logging: &LoggingConfig) {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| {
        format!("hearth_api={},audit=info,tower_http=debug", logging.level).into()
    });

    let builder = tracing_subscriber::fmt().with_env_filter(filter);
    if logging.json_format {
        builder.json().init();
    } else {
        builder.init();
    }
}
