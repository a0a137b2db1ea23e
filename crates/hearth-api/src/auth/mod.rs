//! Authentication and session lifecycle module
//!
//! This module provides the credential and session machinery:
//! - Password hashing with Argon2id
//! - Access token issuance and validation
//! - Opaque refresh tokens with single-use rotation
//! - Store contracts with PostgreSQL and in-memory implementations
//! - Middleware for request authentication

pub mod jwt;
pub mod memory;
pub mod middleware;
pub mod models;
pub mod password;
pub mod repository;
pub mod service;
pub mod token;

pub use jwt::{AccessClaims, IssuedAccessToken, JwtError, TokenIssuer};
pub use memory::InMemoryCredentialStore;
pub use middleware::{auth_middleware, AuthError, AuthenticatedUser};
pub use models::{Account, AccountSummary, RefreshToken};
pub use password::{PasswordError, PasswordHasher};
pub use repository::{AccountStore, PgCredentialStore, RefreshTokenStore, RepositoryError};
pub use service::{CredentialFailure, SessionBundle, SessionError, SessionService};
pub use token::{generate_refresh_token, validate_refresh_token, TokenFormatError};
