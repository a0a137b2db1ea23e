//! API route definitions

use crate::auth::middleware::auth_middleware;
use crate::handlers::{auth, health};
use crate::state::AppState;
use axum::{
    middleware,
    routing::{get, post},
    Json, Router,
};
use std::sync::Arc;
use utoipa::openapi::security::{HttpAuthScheme, HttpBuilder, SecurityScheme};
use utoipa::{Modify, OpenApi};

/// Create API v1 routes
pub fn api_routes(state: Arc<AppState>) -> Router<Arc<AppState>> {
    // Public routes (the refresh token is the credential here)
    let public_routes = Router::new()
        .route("/auth/login", post(auth::login_handler))
        .route("/auth/refresh", post(auth::refresh_handler))
        .route("/auth/logout", post(auth::logout_handler));

    // Protected routes (access token required)
    let protected_routes = Router::new()
        .route("/auth/logout-all", post(auth::logout_all_handler))
        .route("/auth/me", get(auth::me_handler))
        .route_layer(middleware::from_fn_with_state(state, auth_middleware));

    Router::new().merge(public_routes).merge(protected_routes)
}

/// Probes and API documentation
pub fn system_routes() -> Router<Arc<AppState>> {
    Router::new()
        .route("/health", get(health::health_check))
        .route("/ready", get(health::readiness_check))
        .route(
            "/api-docs/openapi.json",
            get(|| async { Json(ApiDoc::openapi()) }),
        )
}

/// OpenAPI document for the session endpoints
#[derive(OpenApi)]
#[openapi(
    paths(
        health::health_check,
        health::readiness_check,
        auth::login_handler,
        auth::refresh_handler,
        auth::logout_handler,
        auth::logout_all_handler,
        auth::me_handler,
    ),
    components(schemas(
        health::HealthResponse,
        health::ReadinessResponse,
        health::ReadinessChecks,
        auth::LoginRequest,
        auth::RefreshRequest,
        auth::LogoutRequest,
        auth::SessionResponse,
        auth::LogoutResponse,
        auth::LogoutAllResponse,
        auth::CurrentAccount,
        crate::auth::AccountSummary,
        crate::error::ApiError,
    )),
    modifiers(&BearerAuth),
    tags(
        (name = "auth", description = "Login, token rotation and logout"),
        (name = "health", description = "Liveness and readiness probes"),
    )
)]
pub struct ApiDoc;

struct BearerAuth;

impl Modify for BearerAuth {
    fn modify(&self, openapi: &mut utoipa::openapi::OpenApi) {
        if let Some(components) = openapi.components.as_mut() {
            components.add_security_scheme(
                "bearer_auth",
                SecurityScheme::Http(
                    HttpBuilder::new()
                        .scheme(HttpAuthScheme::Bearer)
                        .bearer_format("JWT")
                        .build(),
                ),
            );
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_openapi_lists_session_paths() {
        let doc = ApiDoc::openapi();
        let paths: Vec<&String> = doc.paths.paths.keys().collect();

        for expected in [
            "/api/v1/auth/login",
            "/api/v1/auth/refresh",
            "/api/v1/auth/logout",
            "/api/v1/auth/logout-all",
            "/api/v1/auth/me",
            "/health",
        ] {
            assert!(
                paths.iter().any(|p| p.as_str() == expected),
                "missing {expected}"
            );
        }

        let components = doc.components.expect("components present");
        assert!(components.security_schemes.contains_key("bearer_auth"));
    }
}
