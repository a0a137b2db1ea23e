//! Hearth API - authentication and session lifecycle server
//!
//! Provides HTTP endpoints for password login, refresh-token rotation and
//! logout on top of the `auth` module.

pub mod audit;
pub mod auth;
pub mod error;
pub mod extract;
pub mod handlers;
pub mod middleware;
pub mod routes;
pub mod state;

use axum::http::{header, HeaderValue, Method};
use axum::Router;
use state::AppState;
use std::sync::Arc;
use tower_http::cors::{AllowOrigin, CorsLayer};
use tower_http::trace::TraceLayer;

/// Build the full application router
pub fn create_router(state: Arc<AppState>) -> Router {
    let cors = cors_layer(&state.config.server.cors_origins);

    Router::new()
        .merge(routes::system_routes())
        .nest("/api/v1", routes::api_routes(state.clone()))
        .layer(axum::middleware::from_fn(
            middleware::security_headers_middleware,
        ))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Cross-origin access is off unless origins are configured
fn cors_layer(origins: &[String]) -> CorsLayer {
    let allowed: Vec<HeaderValue> = origins
        .iter()
        .filter_map(|origin| match HeaderValue::from_str(origin) {
            Ok(value) => Some(value),
            Err(_) => {
                tracing::warn!(origin = %origin, "Ignoring invalid CORS origin");
                None
            }
        })
        .collect();

    CorsLayer::new()
        .allow_origin(AllowOrigin::list(allowed))
        .allow_methods([Method::GET, Method::POST])
        .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
}

/// Fixtures for router-level tests
#[cfg(any(test, feature = "test-utils"))]
pub mod testing {
    use crate::auth::{Account, InMemoryCredentialStore, PasswordHasher};
    use crate::state::AppState;
    use hearth_core::{AppConfig, PasswordHashConfig};
    use std::sync::Arc;
    use uuid::Uuid;

    pub const TEST_EMAIL: &str = "parent@example.com";
    pub const TEST_PASSWORD: &str = "password123";

    /// Configuration with a cheap hash cost and a fixed signing key
    ///
    /// Proxy headers are trusted so requests can carry a client address
    /// without a socket peer.
    pub fn test_config() -> AppConfig {
        let mut config = AppConfig::default();
        config.server.trust_proxy_headers = true;
        config.auth.jwt_secret = "integration-test-secret-at-least-32-bytes".to_string();
        config.password = PasswordHashConfig {
            memory_kib: 1024,
            iterations: 1,
            parallelism: 1,
        };
        config
    }

    /// State over an in-memory store holding one account with a password
    pub async fn test_state() -> (Arc<AppState>, Arc<InMemoryCredentialStore>, Account) {
        test_state_with(test_config()).await
    }

    /// `test_state` over a caller-adjusted configuration
    pub async fn test_state_with(
        config: AppConfig,
    ) -> (Arc<AppState>, Arc<InMemoryCredentialStore>, Account) {
        let hasher = PasswordHasher::new(&config.password).expect("test hash cost is valid");

        let account = Account {
            id: Uuid::new_v4(),
            email: TEST_EMAIL.to_string(),
            display_name: "Test Parent".to_string(),
            password_hash: Some(hasher.hash(TEST_PASSWORD).expect("hashing succeeds")),
            roles: vec!["member".to_string()],
        };

        let store = Arc::new(InMemoryCredentialStore::new());
        store.upsert_account(account.clone()).await;

        let state = AppState::new(config, store.clone(), store.clone(), None)
            .expect("test state builds");

        (Arc::new(state), store, account)
    }
}

/// Router over a seeded in-memory store
#[cfg(any(test, feature = "test-utils"))]
pub async fn create_router_for_testing() -> Router {
    let (state, _, _) = testing::test_state().await;
    create_router(state)
}
