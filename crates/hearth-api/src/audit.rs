//! Security audit logging for session events
//!
//! Every authentication decision is logged here with its precise cause, even
//! though callers only ever see a uniform "authentication failed". Events are
//! logged at INFO level with the "audit" target so they can be routed apart
//! from application logs.
//!
//! Secrets never reach this module; refresh tokens appear only as a short
//! fingerprint.
//!
//! # Example
//!
//! ```ignore
//! use hearth_api::audit::{AuditEvent, audit_log};
//!
//! audit_log(&AuditEvent::LoginSuccess {
//!     account_id: account.id,
//!     email: account.email.clone(),
//!     ip_address: "192.168.1.1".to_string(),
//! });
//! ```

use async_trait::async_trait;
use axum::extract::{ConnectInfo, FromRequestParts};
use axum::http::request::Parts;
use crate::state::AppState;
use chrono::Utc;
use serde::{Deserialize, Serialize};
use std::convert::Infallible;
use std::net::SocketAddr;
use std::sync::Arc;
use tracing::info;
use uuid::Uuid;

/// Security audit events for the session lifecycle
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "event_type", rename_all = "snake_case")]
pub enum AuditEvent {
    /// Successful login
    LoginSuccess {
        account_id: Uuid,
        email: String,
        ip_address: String,
    },

    /// Failed login attempt
    LoginFailure {
        email: String,
        reason: String,
        ip_address: String,
    },

    /// Refresh token rotated
    TokenRefresh {
        account_id: Uuid,
        token: String,
        replaced_by: String,
        ip_address: String,
    },

    /// Refresh attempt rejected
    TokenRefreshFailure {
        token: String,
        reason: String,
        ip_address: String,
    },

    /// Single refresh token revoked by logout
    Logout {
        account_id: Uuid,
        token: String,
        ip_address: String,
    },

    /// All refresh tokens of an account revoked
    LogoutAll {
        account_id: Uuid,
        revoked: u64,
        ip_address: String,
    },

    /// Invalid or expired access token presented
    InvalidToken { ip_address: String, reason: String },
}

/// Log a security audit event with structured fields
///
/// The event is also serialized to JSON for log aggregators:
///
/// ```json
/// {
///   "event_type": "token_refresh",
///   "account_id": "550e8400-e29b-41d4-a716-446655440000",
///   "token": "3f9a1c07be42",
///   "replaced_by": "d81e6b2a94c0",
///   "ip_address": "192.168.1.1"
/// }
/// ```
pub fn audit_log(event: &AuditEvent) {
    let timestamp = Utc::now();

    let event_json = serde_json::to_string(event)
        .unwrap_or_else(|e| format!("{{\"error\":\"Failed to serialize audit event: {e}\"}}"));

    match event {
        AuditEvent::LoginSuccess {
            account_id,
            email,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                email = %email,
                ip_address = %ip_address,
                "Login successful"
            );
        }
        AuditEvent::LoginFailure {
            email,
            reason,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                email = %email,
                reason = %reason,
                ip_address = %ip_address,
                "Login failed"
            );
        }
        AuditEvent::TokenRefresh {
            account_id,
            token,
            replaced_by,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                token = %token,
                replaced_by = %replaced_by,
                ip_address = %ip_address,
                "Refresh token rotated"
            );
        }
        AuditEvent::TokenRefreshFailure {
            token,
            reason,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                token = %token,
                reason = %reason,
                ip_address = %ip_address,
                "Refresh rejected"
            );
        }
        AuditEvent::Logout {
            account_id,
            token,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                token = %token,
                ip_address = %ip_address,
                "Refresh token revoked"
            );
        }
        AuditEvent::LogoutAll {
            account_id,
            revoked,
            ip_address,
        } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                account_id = %account_id,
                revoked = %revoked,
                ip_address = %ip_address,
                "All refresh tokens revoked"
            );
        }
        AuditEvent::InvalidToken { ip_address, reason } => {
            info!(
                target: "audit",
                timestamp = %timestamp,
                event = %event_json,
                ip_address = %ip_address,
                reason = %reason,
                "Invalid access token"
            );
        }
    }
}

/// Client address recorded when nothing better is known
pub const UNKNOWN_IP: &str = "unknown";

/// Extract the client IP address
///
/// With `trust_proxy` set, checks X-Forwarded-For (first hop), then
/// X-Real-IP. Otherwise only the socket peer counts, since any client can
/// send those headers.
pub fn extract_ip_address(
    headers: &axum::http::HeaderMap,
    peer: Option<SocketAddr>,
    trust_proxy: bool,
) -> String {
    if trust_proxy {
        if let Some(forwarded) = forwarded_ip(headers) {
            return forwarded;
        }
    }

    peer.map(|addr| addr.ip().to_string())
        .unwrap_or_else(|| UNKNOWN_IP.to_string())
}

fn forwarded_ip(headers: &axum::http::HeaderMap) -> Option<String> {
    // Check X-Forwarded-For (proxy/load balancer)
    let first_hop = headers
        .get("x-forwarded-for")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(str::trim)
        .filter(|ip| !ip.is_empty());

    // Check X-Real-IP (nginx proxy)
    let real_ip = || {
        headers
            .get("x-real-ip")
            .and_then(|v| v.to_str().ok())
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
    };

    first_hop.or_else(real_ip).map(str::to_string)
}

/// Socket peer recorded by `into_make_service_with_connect_info`
pub fn peer_address(extensions: &axum::http::Extensions) -> Option<SocketAddr> {
    extensions
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| *addr)
}

/// Extractor yielding the client address as resolved by `extract_ip_address`
/// under the server's proxy trust setting
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ClientIp(pub String);

#[async_trait]
impl FromRequestParts<Arc<AppState>> for ClientIp {
    type Rejection = Infallible;

    async fn from_request_parts(
        parts: &mut Parts,
        state: &Arc<AppState>,
    ) -> Result<Self, Self::Rejection> {
        Ok(ClientIp(extract_ip_address(
            &parts.headers,
            peer_address(&parts.extensions),
            state.config.server.trust_proxy_headers,
        )))
    }
}
