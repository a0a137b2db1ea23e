//! API Integration Tests
//!
//! Drive the full router against the in-memory credential store.

use axum::{
    body::Body,
    http::{header, Request, StatusCode},
    response::Response,
    Router,
};
use hearth_api::auth::RefreshTokenStore;
use hearth_api::create_router;
use hearth_api::create_router_for_testing;
use hearth_api::testing::{test_config, test_state, test_state_with, TEST_EMAIL, TEST_PASSWORD};
use serde_json::{json, Value};
use tower::ServiceExt;

/// Helper to create a test request
fn create_json_request(method: &str, uri: &str, body: Option<Value>) -> Request<Body> {
    let builder = Request::builder()
        .method(method)
        .uri(uri)
        .header("Content-Type", "application/json")
        .header("X-Forwarded-For", "203.0.113.7");

    match body {
        Some(json_body) => builder
            .body(Body::from(serde_json::to_string(&json_body).unwrap()))
            .unwrap(),
        None => builder.body(Body::empty()).unwrap(),
    }
}

fn bearer_request(method: &str, uri: &str, access_token: &str) -> Request<Body> {
    Request::builder()
        .method(method)
        .uri(uri)
        .header(header::AUTHORIZATION, format!("Bearer {access_token}"))
        .body(Body::empty())
        .unwrap()
}

async fn body_json(response: Response) -> Value {
    let body = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    serde_json::from_slice(&body).unwrap()
}

async fn login(app: &Router) -> Value {
    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

async fn refresh(app: &Router, refresh_token: &str) -> Response {
    app.clone()
        .oneshot(create_json_request(
            "POST",
            "/api/v1/auth/refresh",
            Some(json!({ "refresh_token": refresh_token })),
        ))
        .await
        .unwrap()
}

async fn logout(app: &Router, refresh_token: &str) -> Value {
    let response = app
        .clone()
        .oneshot(create_json_request(
            "POST",
            "/api/v1/auth/logout",
            Some(json!({ "refresh_token": refresh_token })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    body_json(response).await
}

// =============================================================================
// Health Check Tests
// =============================================================================

#[tokio::test]
async fn test_health_check() {
    let app = create_router_for_testing().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/health")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["status"], "ok");
    assert!(json["version"].is_string());
}

#[tokio::test]
async fn test_readiness_check() {
    let app = create_router_for_testing().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/ready")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["ready"], true);
    assert_eq!(json["checks"]["credential_store"], true);
    assert_eq!(json["checks"]["production_secret"], true);
}

#[tokio::test]
async fn test_openapi_document() {
    let app = create_router_for_testing().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api-docs/openapi.json")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert!(json["paths"]["/api/v1/auth/login"].is_object());
    assert!(json["paths"]["/api/v1/auth/refresh"].is_object());
}

// =============================================================================
// Login Tests
// =============================================================================

#[tokio::test]
async fn test_login_success() {
    let app = create_router_for_testing().await;
    let json = login(&app).await;

    assert_eq!(json["token_type"], "Bearer");
    assert!(json["access_token"].is_string());
    assert!(json["refresh_token"].as_str().unwrap().len() == 86);
    assert!(json["expires_in"].as_i64().unwrap() > 0);
    assert!(json["expires_at"].is_string());
    assert!(json["refresh_expires_at"].is_string());
    assert_eq!(json["account"]["email"], TEST_EMAIL);
    assert!(json["account"].get("password_hash").is_none());
}

#[tokio::test]
async fn test_login_responses_are_not_cacheable() {
    let app = create_router_for_testing().await;

    let response = app
        .oneshot(create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": TEST_EMAIL, "password": TEST_PASSWORD })),
        ))
        .await
        .unwrap();

    assert_eq!(
        response.headers().get(header::CACHE_CONTROL).unwrap(),
        "no-store"
    );
}

#[tokio::test]
async fn test_login_failures_are_indistinguishable() {
    let app = create_router_for_testing().await;

    let mut bodies = Vec::new();
    for (email, password) in [
        (TEST_EMAIL, "wrongpassword"),
        ("nobody@example.com", TEST_PASSWORD),
        ("nobody@example.com", ""),
    ] {
        let response = app
            .clone()
            .oneshot(create_json_request(
                "POST",
                "/api/v1/auth/login",
                Some(json!({ "email": email, "password": password })),
            ))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
        bodies.push(body_json(response).await);
    }

    assert_eq!(bodies[0]["code"], "AUTHENTICATION_FAILED");
    assert!(bodies.iter().all(|b| b == &bodies[0]));
}

#[tokio::test]
async fn test_login_with_malformed_body() {
    let app = create_router_for_testing().await;

    let response = app
        .oneshot(create_json_request(
            "POST",
            "/api/v1/auth/login",
            Some(json!({ "email": TEST_EMAIL })),
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::BAD_REQUEST);

    let json = body_json(response).await;
    assert_eq!(json["code"], "BAD_REQUEST");
    assert!(json["details"].as_str().unwrap().contains("password"));
}

#[tokio::test]
async fn test_unparsable_bodies_get_json_errors() {
    let app = create_router_for_testing().await;

    for uri in ["/api/v1/auth/login", "/api/v1/auth/refresh", "/api/v1/auth/logout"] {
        let request = Request::builder()
            .method("POST")
            .uri(uri)
            .header("Content-Type", "application/json")
            .body(Body::from("{not json"))
            .unwrap();

        let response = app.clone().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::BAD_REQUEST, "{uri}");
        assert_eq!(body_json(response).await["code"], "BAD_REQUEST");
    }
}

#[tokio::test]
async fn test_forwarded_address_ignored_without_proxy_trust() {
    let mut config = test_config();
    config.server.trust_proxy_headers = false;
    let (state, store, _) = test_state_with(config).await;
    let app = create_router(state);

    let token = login(&app).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    // No socket peer under oneshot, and the forged header is not believed
    let stored = store.find_by_value(&token).await.unwrap().unwrap();
    assert_eq!(stored.created_by_ip, hearth_api::audit::UNKNOWN_IP);
}

// =============================================================================
// Refresh Tests
// =============================================================================

#[tokio::test]
async fn test_refresh_rotates_token() {
    let (state, store, _) = test_state().await;
    let app = create_router(state);

    let t0 = login(&app).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = refresh(&app, &t0).await;
    assert_eq!(response.status(), StatusCode::OK);
    let t1 = body_json(response).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();
    assert_ne!(t0, t1);

    // Old token is revoked and points at its replacement
    let old = store.find_by_value(&t0).await.unwrap().unwrap();
    assert_eq!(old.replaced_by_value.as_deref(), Some(t1.as_str()));
    assert_eq!(old.revoked_by_ip.as_deref(), Some("203.0.113.7"));

    // Reusing T0 fails with the same body as any other failure
    let response = refresh(&app, &t0).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    assert_eq!(body_json(response).await["code"], "AUTHENTICATION_FAILED");

    // T1 keeps working
    assert_eq!(refresh(&app, &t1).await.status(), StatusCode::OK);
}

#[tokio::test]
async fn test_refresh_with_malformed_token() {
    let (state, store, _) = test_state().await;
    let app = create_router(state);

    for token in ["", "   ", "not base64 at all", "c2hvcnQ"] {
        let response = refresh(&app, token).await;
        assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
    }

    assert_eq!(store.token_operations(), 0);
}

#[tokio::test]
async fn test_refresh_with_unknown_token() {
    let app = create_router_for_testing().await;
    let unknown = hearth_api::auth::generate_refresh_token();

    let response = refresh(&app, &unknown).await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

// =============================================================================
// Logout Tests
// =============================================================================

#[tokio::test]
async fn test_logout_is_idempotent() {
    let app = create_router_for_testing().await;
    let token = login(&app).await["refresh_token"]
        .as_str()
        .unwrap()
        .to_string();

    assert_eq!(logout(&app, &token).await["revoked"], true);
    assert_eq!(logout(&app, &token).await["revoked"], false);

    assert_eq!(refresh(&app, &token).await.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_logout_unknown_or_malformed_token() {
    let app = create_router_for_testing().await;
    let unknown = hearth_api::auth::generate_refresh_token();

    assert_eq!(logout(&app, &unknown).await["revoked"], false);
    assert_eq!(logout(&app, "garbage").await["revoked"], false);
}

// =============================================================================
// Protected Route Tests
// =============================================================================

#[tokio::test]
async fn test_me_requires_access_token() {
    let app = create_router_for_testing().await;

    let response = app
        .oneshot(
            Request::builder()
                .uri("/api/v1/auth/me")
                .body(Body::empty())
                .unwrap(),
        )
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_rejects_invalid_access_token() {
    let app = create_router_for_testing().await;

    let response = app
        .oneshot(bearer_request("GET", "/api/v1/auth/me", "not.a.token"))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_me_returns_current_account() {
    let (state, _, account) = test_state().await;
    let app = create_router(state);
    let access_token = login(&app).await["access_token"]
        .as_str()
        .unwrap()
        .to_string();

    let response = app
        .oneshot(bearer_request("GET", "/api/v1/auth/me", &access_token))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);

    let json = body_json(response).await;
    assert_eq!(json["id"], account.id.to_string());
    assert_eq!(json["email"], TEST_EMAIL);
    assert_eq!(json["roles"], json!(["member"]));
}

#[tokio::test]
async fn test_logout_all_revokes_every_session() {
    let app = create_router_for_testing().await;

    let first = login(&app).await;
    let second = login(&app).await;
    let access_token = second["access_token"].as_str().unwrap();

    let response = app
        .clone()
        .oneshot(bearer_request(
            "POST",
            "/api/v1/auth/logout-all",
            access_token,
        ))
        .await
        .unwrap();

    assert_eq!(response.status(), StatusCode::OK);
    assert_eq!(body_json(response).await["revoked"], 2);

    for session in [&first, &second] {
        let token = session["refresh_token"].as_str().unwrap();
        assert_eq!(refresh(&app, token).await.status(), StatusCode::UNAUTHORIZED);
    }
}
