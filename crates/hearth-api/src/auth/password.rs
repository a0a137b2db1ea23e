/// Password hashing and verification using Argon2id
///
/// Stored credentials are `base64(salt || digest)`:
/// - Algorithm: Argon2id (memory-hard, resistant to GPU attacks)
/// - Memory: 128 MiB
/// - Iterations: 4
/// - Parallelism: 8 lanes
/// - Salt: 16 bytes random
/// - Output: 32 bytes digest
///
/// The cost parameters are not embedded in the stored value, so they are
/// process-wide configuration and must not change under existing credentials.
use argon2::{Algorithm, Argon2, Params, Version};
use base64::{engine::general_purpose::STANDARD, Engine};
use hearth_core::PasswordHashConfig;
use rand::{rngs::OsRng, RngCore};
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use subtle::ConstantTimeEq;
use thiserror::Error;

/// Salt length in bytes
pub const SALT_LEN: usize = 16;

/// Digest length in bytes
pub const DIGEST_LEN: usize = 32;

/// Password hashing errors
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid Argon2 parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),
}

/// Argon2id hasher with fixed cost parameters
///
/// Clones share the derivation counter.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    /// Well-formed `salt || digest` of random bytes that no password matches
    decoy: String,
    derivations: Arc<AtomicU64>,
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .field("derivations", &self.derivations())
            .finish()
    }
}

impl PasswordHasher {
    /// Create a hasher, validating the cost parameters once
    pub fn new(config: &PasswordHashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            Some(DIGEST_LEN),
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        let mut decoy = [0u8; SALT_LEN + DIGEST_LEN];
        OsRng.fill_bytes(&mut decoy);

        Ok(Self {
            params,
            decoy: STANDARD.encode(decoy),
            derivations: Arc::new(AtomicU64::new(0)),
        })
    }

    /// Stored-credential stand-in for identifiers that match no account
    ///
    /// Verifying against it costs one full derivation, the same as a wrong
    /// password for a real account.
    pub fn decoy(&self) -> &str {
        &self.decoy
    }

    /// Argon2 derivations performed so far by this hasher and its clones
    pub fn derivations(&self) -> u64 {
        self.derivations.load(Ordering::Relaxed)
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    fn derive(&self, secret: &str, salt: &[u8]) -> Result<[u8; DIGEST_LEN], argon2::Error> {
        let mut digest = [0u8; DIGEST_LEN];
        self.derivations.fetch_add(1, Ordering::Relaxed);
        self.argon2()
            .hash_password_into(secret.as_bytes(), salt, &mut digest)?;
        Ok(digest)
    }

    /// Hash a plaintext secret with a fresh random salt
    ///
    /// Two calls with the same secret never produce the same output.
    ///
    /// # Example
    ///
    /// ```no_run
    /// use hearth_api::auth::password::PasswordHasher;
    /// use hearth_core::PasswordHashConfig;
    ///
    /// let hasher = PasswordHasher::new(&PasswordHashConfig::default()).unwrap();
    /// let encoded = hasher.hash("password123").unwrap();
    /// assert!(hasher.verify("password123", &encoded));
    /// ```
    pub fn hash(&self, secret: &str) -> Result<String, PasswordError> {
        let mut salt = [0u8; SALT_LEN];
        OsRng.fill_bytes(&mut salt);

        let digest = self
            .derive(secret, &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        let mut combined = Vec::with_capacity(SALT_LEN + DIGEST_LEN);
        combined.extend_from_slice(&salt);
        combined.extend_from_slice(&digest);

        Ok(STANDARD.encode(combined))
    }

    /// Verify a plaintext secret against a stored `salt || digest` value
    ///
    /// Returns `false` for malformed, truncated or empty input instead of
    /// failing. The digest comparison is constant-time.
    pub fn verify(&self, secret: &str, encoded: &str) -> bool {
        let Ok(decoded) = STANDARD.decode(encoded.trim()) else {
            return false;
        };
        if decoded.len() != SALT_LEN + DIGEST_LEN {
            return false;
        }

        let (salt, expected) = decoded.split_at(SALT_LEN);
        match self.derive(secret, salt) {
            Ok(actual) => actual[..].ct_eq(expected).into(),
            Err(e) => {
                tracing::warn!(error = %e, "Password derivation failed during verification");
                false
            }
        }
    }
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(&PasswordHashConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("light test parameters are valid")
}
