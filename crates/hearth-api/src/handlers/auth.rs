//! Authentication API handlers
//!
//! Login, refresh, logout and profile endpoints. Every authentication
//! failure leaves these handlers as the same 401 body.

use crate::audit::ClientIp;
use crate::auth::{AccountSummary, AuthenticatedUser, SessionBundle};
use crate::error::AppError;
use crate::extract::JsonBody;
use crate::state::AppState;
use axum::{extract::State, response::IntoResponse, Extension, Json};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use utoipa::ToSchema;
use uuid::Uuid;

/// Login request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LoginRequest {
    /// Login identifier
    pub email: String,
    pub password: String,
}

/// Refresh request
#[derive(Debug, Deserialize, ToSchema)]
pub struct RefreshRequest {
    pub refresh_token: String,
}

/// Logout request
#[derive(Debug, Deserialize, ToSchema)]
pub struct LogoutRequest {
    pub refresh_token: String,
}

/// Tokens issued by login and refresh
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct SessionResponse {
    pub access_token: String,
    /// Always "Bearer"
    pub token_type: String,
    /// Access token lifetime in seconds
    pub expires_in: i64,
    pub expires_at: DateTime<Utc>,
    pub refresh_token: String,
    pub refresh_expires_at: DateTime<Utc>,
    pub account: AccountSummary,
}

impl SessionResponse {
    fn from_bundle(bundle: SessionBundle, now: DateTime<Utc>) -> Self {
        Self {
            access_token: bundle.access_token,
            token_type: "Bearer".to_string(),
            expires_in: (bundle.access_expires_at - now).num_seconds().max(0),
            expires_at: bundle.access_expires_at,
            refresh_token: bundle.refresh_token,
            refresh_expires_at: bundle.refresh_expires_at,
            account: bundle.account,
        }
    }
}

/// Logout response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutResponse {
    /// True only for the call that revoked the token
    pub revoked: bool,
}

/// Logout-all response
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct LogoutAllResponse {
    /// Number of refresh tokens revoked
    pub revoked: u64,
}

/// Identity carried by the presented access token
#[derive(Debug, Serialize, Deserialize, ToSchema)]
pub struct CurrentAccount {
    pub id: Uuid,
    pub email: String,
    pub display_name: String,
    pub roles: Vec<String>,
}

impl From<AuthenticatedUser> for CurrentAccount {
    fn from(user: AuthenticatedUser) -> Self {
        Self {
            id: user.account_id,
            email: user.email,
            display_name: user.name,
            roles: user.roles,
        }
    }
}

/// Login with email and password
///
/// Returns an access token and a refresh token. Unknown accounts, accounts
/// without a password and wrong passwords are indistinguishable.
#[utoipa::path(
    post,
    path = "/api/v1/auth/login",
    tag = "auth",
    request_body = LoginRequest,
    responses(
        (status = 200, description = "Login successful", body = SessionResponse),
        (status = 400, description = "Malformed request body", body = crate::error::ApiError),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn login_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    JsonBody(request): JsonBody<LoginRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bundle = state
        .sessions
        .login(&request.email, &request.password, &client_ip)
        .await?;

    Ok(Json(SessionResponse::from_bundle(bundle, Utc::now())))
}

/// Rotate a refresh token
///
/// The presented token is revoked and replaced. Presenting it again fails.
#[utoipa::path(
    post,
    path = "/api/v1/auth/refresh",
    tag = "auth",
    request_body = RefreshRequest,
    responses(
        (status = 200, description = "Token rotated", body = SessionResponse),
        (status = 400, description = "Malformed request body", body = crate::error::ApiError),
        (status = 401, description = "Authentication failed", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn refresh_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    JsonBody(request): JsonBody<RefreshRequest>,
) -> Result<impl IntoResponse, AppError> {
    let bundle = state
        .sessions
        .refresh(&request.refresh_token, &client_ip)
        .await?;

    Ok(Json(SessionResponse::from_bundle(bundle, Utc::now())))
}

/// Revoke a refresh token
///
/// Always answers 200; `revoked` tells whether this call did the revoking.
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout",
    tag = "auth",
    request_body = LogoutRequest,
    responses(
        (status = 200, description = "Logout processed", body = LogoutResponse),
        (status = 400, description = "Malformed request body", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    )
)]
pub async fn logout_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    JsonBody(request): JsonBody<LogoutRequest>,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state
        .sessions
        .logout(&request.refresh_token, &client_ip)
        .await?;

    Ok(Json(LogoutResponse { revoked }))
}

/// Revoke every refresh token of the authenticated account
#[utoipa::path(
    post,
    path = "/api/v1/auth/logout-all",
    tag = "auth",
    responses(
        (status = 200, description = "All sessions revoked", body = LogoutAllResponse),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
        (status = 500, description = "Internal server error", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn logout_all_handler(
    State(state): State<Arc<AppState>>,
    ClientIp(client_ip): ClientIp,
    Extension(user): Extension<AuthenticatedUser>,
) -> Result<impl IntoResponse, AppError> {
    let revoked = state
        .sessions
        .logout_all(user.account_id, &client_ip)
        .await?;

    Ok(Json(LogoutAllResponse { revoked }))
}

/// Get the current account
///
/// Answered from the access token claims alone.
#[utoipa::path(
    get,
    path = "/api/v1/auth/me",
    tag = "auth",
    responses(
        (status = 200, description = "Current account", body = CurrentAccount),
        (status = 401, description = "Unauthorized", body = crate::error::ApiError),
    ),
    security(
        ("bearer_auth" = [])
    )
)]
pub async fn me_handler(Extension(user): Extension<AuthenticatedUser>) -> impl IntoResponse {
    Json(CurrentAccount::from(user))
}
