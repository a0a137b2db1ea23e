//! Authentication middleware for protecting routes
//!
//! Extracts and validates access tokens from the Authorization header.
//! On success, adds authenticated account information to request extensions.

use super::jwt::{AccessClaims, JwtError, TokenIssuer};
use crate::audit::{audit_log, extract_ip_address, peer_address, AuditEvent};
use crate::state::AppState;
use axum::{
    body::Body,
    extract::{Request, State},
    http::{header, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use thiserror::Error;
use uuid::Uuid;

/// Authenticated account extracted from an access token
///
/// This is added to request extensions by the auth middleware
/// and can be extracted in handlers using `Extension<AuthenticatedUser>`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthenticatedUser {
    pub account_id: Uuid,
    pub email: String,
    pub name: String,
    pub roles: Vec<String>,
    /// Token ID, for log correlation
    pub jti: String,
}

impl AuthenticatedUser {
    /// Check if the account carries a capability label
    pub fn has_role(&self, role: &str) -> bool {
        self.roles.iter().any(|r| r == role)
    }
}

impl TryFrom<AccessClaims> for AuthenticatedUser {
    type Error = JwtError;

    fn try_from(claims: AccessClaims) -> Result<Self, Self::Error> {
        let account_id = Uuid::parse_str(&claims.sub).map_err(|_| JwtError::InvalidToken)?;

        Ok(Self {
            account_id,
            email: claims.email,
            name: claims.name,
            roles: claims.roles,
            jti: claims.jti,
        })
    }
}

/// Authentication middleware errors
#[derive(Debug, Error)]
pub enum AuthError {
    #[error("Missing Authorization header")]
    MissingAuthHeader,

    #[error("Invalid Authorization header format")]
    InvalidAuthHeader,

    #[error("Invalid token: {0}")]
    InvalidToken(#[from] JwtError),
}

impl IntoResponse for AuthError {
    fn into_response(self) -> Response {
        let message = match self {
            AuthError::MissingAuthHeader => "Missing Authorization header",
            AuthError::InvalidAuthHeader => "Invalid Authorization header format",
            AuthError::InvalidToken(_) => "Invalid or expired token",
        };

        let body = crate::error::ApiError::new("UNAUTHORIZED", message);

        (StatusCode::UNAUTHORIZED, axum::Json(body)).into_response()
    }
}

/// Authentication middleware that requires a valid access token
///
/// This middleware:
/// 1. Extracts the Authorization header
/// 2. Validates the Bearer token format
/// 3. Verifies the signature, issuer, audience and expiry
/// 4. Adds AuthenticatedUser to request extensions
///
/// # Usage
///
/// ```ignore
/// use axum::{Router, routing::get, middleware};
/// use hearth_api::auth::middleware::auth_middleware;
///
/// let app = Router::new()
///     .route("/protected", get(protected_handler))
///     .route_layer(middleware::from_fn_with_state(state.clone(), auth_middleware));
/// ```
pub async fn auth_middleware(
    State(state): State<Arc<AppState>>,
    mut request: Request<Body>,
    next: Next,
) -> Result<Response, AuthError> {
    let ip_address = extract_ip_address(
        request.headers(),
        peer_address(request.extensions()),
        state.config.server.trust_proxy_headers,
    );

    let user = match authenticate(state.sessions.issuer(), request.headers()) {
        Ok(user) => user,
        Err(e) => {
            audit_log(&AuditEvent::InvalidToken {
                ip_address,
                reason: e.to_string(),
            });
            return Err(e);
        }
    };

    request.extensions_mut().insert(user);

    Ok(next.run(request).await)
}

fn authenticate(
    issuer: &TokenIssuer,
    headers: &axum::http::HeaderMap,
) -> Result<AuthenticatedUser, AuthError> {
    let auth_header = headers
        .get(header::AUTHORIZATION)
        .ok_or(AuthError::MissingAuthHeader)?
        .to_str()
        .map_err(|_| AuthError::InvalidAuthHeader)?;

    let token = auth_header
        .strip_prefix("Bearer ")
        .ok_or(AuthError::InvalidAuthHeader)?;

    let claims = issuer.verify(token)?;
    Ok(AuthenticatedUser::try_from(claims)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::auth::models::Account;
    use axum::http::HeaderMap;
    use chrono::Utc;
    use hearth_core::AuthConfig;

    fn issuer() -> TokenIssuer {
        TokenIssuer::new(&AuthConfig {
            jwt_secret: "middleware-test-secret-with-32-bytes-plus".to_string(),
            ..Default::default()
        })
    }

    fn account() -> Account {
        Account {
            id: Uuid::new_v4(),
            email: "test@example.com".to_string(),
            display_name: "Test User".to_string(),
            password_hash: None,
            roles: vec!["member".to_string()],
        }
    }

    fn bearer(token: &str) -> HeaderMap {
        let mut headers = HeaderMap::new();
        headers.insert(
            header::AUTHORIZATION,
            format!("Bearer {token}").parse().unwrap(),
        );
        headers
    }

    #[test]
    fn test_authenticate_valid_token() {
        let issuer = issuer();
        let account = account();
        let issued = issuer.issue(&account, Utc::now()).unwrap();

        let user = authenticate(&issuer, &bearer(&issued.token)).unwrap();

        assert_eq!(user.account_id, account.id);
        assert_eq!(user.email, "test@example.com");
        assert_eq!(user.name, "Test User");
        assert!(user.has_role("member"));
        assert!(!user.has_role("admin"));
    }

    #[test]
    fn test_authenticate_missing_header() {
        let result = authenticate(&issuer(), &HeaderMap::new());
        assert!(matches!(result, Err(AuthError::MissingAuthHeader)));
    }

    #[test]
    fn test_authenticate_wrong_scheme() {
        let mut headers = HeaderMap::new();
        headers.insert(header::AUTHORIZATION, "Basic dXNlcjpwYXNz".parse().unwrap());

        let result = authenticate(&issuer(), &headers);
        assert!(matches!(result, Err(AuthError::InvalidAuthHeader)));
    }

    #[test]
    fn test_authenticate_garbage_token() {
        let result = authenticate(&issuer(), &bearer("not.a.jwt"));
        assert!(matches!(result, Err(AuthError::InvalidToken(_))));
    }

    #[test]
    fn test_claims_with_non_uuid_subject_rejected() {
        let claims = AccessClaims {
            iss: "hearth-api".to_string(),
            aud: "hearth".to_string(),
            sub: "not-a-uuid".to_string(),
            jti: Uuid::new_v4().to_string(),
            iat: 1000,
            exp: 2000,
            email: "test@example.com".to_string(),
            name: "Test".to_string(),
            roles: vec![],
        };

        assert!(AuthenticatedUser::try_from(claims).is_err());
    }

    #[test]
    fn test_auth_error_is_unauthorized() {
        for err in [
            AuthError::MissingAuthHeader,
            AuthError::InvalidAuthHeader,
            AuthError::InvalidToken(JwtError::ExpiredToken),
        ] {
            assert_eq!(err.into_response().status(), StatusCode::UNAUTHORIZED);
        }
    }
}
