//! Password hashing and verification using Argon2id
//!
//! Hashes are PHC strings (`$argon2id$v=19$m=...,t=...,p=...$salt$digest`),
//! so algorithm, cost parameters and salt travel with the digest and
//! verification needs no external state.
//!
//! - Salt: 16 random bytes per call from the OS RNG
//! - Output: 32 bytes
//! - Cost: configurable, see [`PasswordHashConfig`]

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Argon2, Params,
};
use chess_core::PasswordHashConfig;
use std::sync::OnceLock;
use thiserror::Error;

/// Password hashing errors
///
/// Verification never fails with an error; only hashing can.
#[derive(Debug, Error)]
pub enum PasswordError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    HashingFailed(String),

    #[error("Password task panicked: {0}")]
    TaskFailed(String),
}

/// Minimum accepted password length
pub const MIN_PASSWORD_LENGTH: usize = 8;

/// One-way salted password hasher
#[derive(Clone)]
pub struct PasswordHasher {
    argon2: Argon2<'static>,
    dummy_hash: std::sync::Arc<OnceLock<Option<String>>>,
}

impl PasswordHasher {
    /// Create a hasher with the given cost parameters
    pub fn new(config: &PasswordHashConfig) -> Result<Self, PasswordError> {
        let params = Params::new(
            config.memory_cost_kib,
            config.iterations,
            config.parallelism,
            Some(32),
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(argon2::Algorithm::Argon2id, argon2::Version::V0x13, params),
            dummy_hash: Default::default(),
        })
    }

    /// Hash a plaintext password
    ///
    /// Two calls with the same input yield different strings (fresh salt),
    /// both of which verify.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let salt = SaltString::generate(&mut OsRng);

        let password_hash = self
            .argon2
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashingFailed(e.to_string()))?;

        Ok(password_hash.to_string())
    }

    /// Verify a plaintext password against a stored hash
    ///
    /// The digest comparison is constant-time. A malformed hash returns
    /// `false`; the hash itself is never logged.
    pub fn verify(&self, password: &str, hash: &str) -> bool {
        let parsed_hash = match PasswordHash::new(hash) {
            Ok(parsed) => parsed,
            Err(_) => {
                tracing::warn!("Stored password hash is not a valid PHC string");
                return false;
            }
        };

        // Parameters come from the PHC string, not from this hasher
        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => true,
            Err(argon2::password_hash::Error::Password) => false,
            Err(e) => {
                tracing::warn!(error = %e, "Password verification failed");
                false
            }
        }
    }

    /// Spend the same work as a real verification and return `false`
    ///
    /// Used when no account matches a login email, so the response time does
    /// not reveal whether the email exists.
    pub fn verify_dummy(&self, password: &str) -> bool {
        let dummy = self
            .dummy_hash
            .get_or_init(|| self.hash("dummy-password-for-timing").ok());

        if let Some(hash) = dummy {
            let _ = self.verify(password, hash);
        }
        false
    }

    /// [`hash`](Self::hash) on the blocking thread pool
    pub async fn hash_async(&self, password: String) -> Result<String, PasswordError> {
        self.run_blocking(move |hasher| hasher.hash(&password)).await?
    }

    /// [`verify`](Self::verify) on the blocking thread pool
    pub async fn verify_async(&self, password: String, hash: String) -> Result<bool, PasswordError> {
        self.run_blocking(move |hasher| hasher.verify(&password, &hash))
            .await
    }

    /// [`verify_dummy`](Self::verify_dummy) on the blocking thread pool
    pub async fn verify_dummy_async(&self, password: String) -> Result<bool, PasswordError> {
        self.run_blocking(move |hasher| hasher.verify_dummy(&password))
            .await
    }

    // Argon2 at production cost takes tens of milliseconds of CPU and must
    // not run on an async worker.
    async fn run_blocking<T, F>(&self, f: F) -> Result<T, PasswordError>
    where
        F: FnOnce(&PasswordHasher) -> T + Send + 'static,
        T: Send + 'static,
    {
        let hasher = self.clone();
        tokio::task::spawn_blocking(move || f(&hasher))
            .await
            .map_err(|e| PasswordError::TaskFailed(e.to_string()))
    }
}

/// Validate password length
pub fn validate_password_strength(password: &str) -> Result<(), String> {
    if password.chars().count() < MIN_PASSWORD_LENGTH {
        return Err(format!(
            "Password must be at least {MIN_PASSWORD_LENGTH} characters long"
        ));
    }
    Ok(())
}

#[cfg(test)]
pub(crate) fn test_hasher() -> PasswordHasher {
    PasswordHasher::new(&PasswordHashConfig {
        memory_cost_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .unwrap()
}
