//! Password hashing module
//!
//! This module provides secure password hashing and verification using Argon2id,
//! which is the recommended variant for password hashing.
//!
//! # Security
//!
//! - Uses Argon2id variant (hybrid of Argon2i and Argon2d)
//! - Work factor comes from `auth.hashing` in the configuration
//! - Generates random salt for each password hash
//! - Digests are PHC strings, so verification reads the parameters a digest
//!   was created with and keeps working after the work factor changes
//! - Digest comparison is constant time

use argon2::{
    password_hash::{rand_core::OsRng, PasswordHash, PasswordHasher, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};

use crate::config::HashingConfig;

/// Hasher failures. A mismatch is not an error; see [`CredentialHasher::verify`].
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum HashError {
    #[error("Invalid hashing parameters: {0}")]
    InvalidParams(String),

    #[error("Failed to hash password: {0}")]
    Hash(String),

    #[error("Invalid password hash format: {0}")]
    MalformedDigest(String),

    #[error("Password verification failed: {0}")]
    Verify(String),

    #[error("Hashing task did not complete: {0}")]
    TaskAborted(String),
}

/// One-way password hashing
pub trait CredentialHasher: Send + Sync {
    /// Produce a salted, self-describing digest of `plaintext`.
    fn hash(&self, plaintext: &str) -> Result<String, HashError>;

    /// Check `plaintext` against `digest`.
    ///
    /// Returns `Ok(false)` on mismatch and an error when the digest cannot be
    /// parsed or verification itself fails.
    fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, HashError>;
}

/// Argon2id hasher with a fixed work factor
#[derive(Clone)]
pub struct Argon2Hasher {
    argon2: Argon2<'static>,
}

impl Argon2Hasher {
    /// Create a hasher from configured cost parameters.
    ///
    /// # Errors
    ///
    /// Returns `HashError::InvalidParams` if argon2 rejects the parameters.
    pub fn new(config: &HashingConfig) -> Result<Self, HashError> {
        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            None,
        )
        .map_err(|e| HashError::InvalidParams(e.to_string()))?;

        Ok(Self {
            argon2: Argon2::new(Algorithm::Argon2id, Version::V0x13, params),
        })
    }
}

impl Default for Argon2Hasher {
    fn default() -> Self {
        Self {
            argon2: Argon2::default(),
        }
    }
}

impl std::fmt::Debug for Argon2Hasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Argon2Hasher")
            .field("params", self.argon2.params())
            .finish()
    }
}

impl CredentialHasher for Argon2Hasher {
    /// Hash a password using Argon2id.
    ///
    /// The result is a PHC string (algorithm, parameters, salt and hash).
    ///
    /// ```ignore
    /// let hasher = Argon2Hasher::default();
    /// let digest = hasher.hash("my_secure_password")?;
    /// assert!(digest.starts_with("$argon2id$"));
    /// ```
    fn hash(&self, plaintext: &str) -> Result<String, HashError> {
        let salt = SaltString::generate(&mut OsRng);

        let digest = self
            .argon2
            .hash_password(plaintext.as_bytes(), &salt)
            .map_err(|e| HashError::Hash(e.to_string()))?;

        Ok(digest.to_string())
    }

    fn verify(&self, digest: &str, plaintext: &str) -> Result<bool, HashError> {
        let parsed_hash =
            PasswordHash::new(digest).map_err(|e| HashError::MalformedDigest(e.to_string()))?;

        match self.argon2.verify_password(plaintext.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(HashError::Verify(e.to_string())),
        }
    }
}

#[cfg(test)]
pub(crate) fn fast_test_hasher() -> Argon2Hasher {
    Argon2Hasher::new(&HashingConfig {
        memory_kib: 1024,
        iterations: 1,
        parallelism: 1,
    })
    .expect("Fast test parameters are valid")
}
