//! Password hashing for Tally.
//!
//! Uses Argon2id with cost parameters taken from configuration. Hashes are
//! PHC strings, so verification reads the parameters back out of the hash.

use argon2::{
    password_hash::{PasswordHash, PasswordHasher as _, PasswordVerifier, SaltString},
    Algorithm, Argon2, Params, Version,
};
use rand_core::{OsRng, RngCore};
use thiserror::Error;

use crate::config::Argon2Config;
use crate::TallyError;

const MIN_SALT_LENGTH: usize = 8;
const MAX_SALT_LENGTH: usize = 48;

/// Password-related errors.
///
/// A wrong password is not an error: [`PasswordHasher::verify`] returns
/// `Ok(false)` for it.
#[derive(Error, Debug)]
pub enum PasswordError {
    /// Cost parameters rejected by Argon2.
    #[error("invalid argon2 parameters: {0}")]
    InvalidParams(String),

    /// Password hashing failed.
    #[error("password hashing failed: {0}")]
    HashError(String),

    /// Stored hash could not be parsed.
    #[error("invalid password hash format")]
    InvalidHash,
}

impl From<PasswordError> for TallyError {
    fn from(e: PasswordError) -> Self {
        TallyError::Internal(e.to_string())
    }
}

/// Argon2id password hasher with fixed cost parameters.
#[derive(Clone)]
pub struct PasswordHasher {
    params: Params,
    salt_length: usize,
}

impl PasswordHasher {
    /// Create a hasher from configuration, rejecting parameters Argon2 would refuse.
    pub fn new(config: &Argon2Config) -> Result<Self, PasswordError> {
        if !(MIN_SALT_LENGTH..=MAX_SALT_LENGTH).contains(&config.salt_length) {
            return Err(PasswordError::InvalidParams(format!(
                "salt length must be between {MIN_SALT_LENGTH} and {MAX_SALT_LENGTH} bytes"
            )));
        }

        let params = Params::new(
            config.memory_kib,
            config.iterations,
            config.parallelism,
            Some(config.key_length),
        )
        .map_err(|e| PasswordError::InvalidParams(e.to_string()))?;

        Ok(Self {
            params,
            salt_length: config.salt_length,
        })
    }

    fn argon2(&self) -> Argon2<'static> {
        Argon2::new(Algorithm::Argon2id, Version::V0x13, self.params.clone())
    }

    /// Hash a password, returning a PHC string that embeds salt and parameters.
    pub fn hash(&self, password: &str) -> Result<String, PasswordError> {
        let mut salt_bytes = vec![0u8; self.salt_length];
        OsRng.fill_bytes(&mut salt_bytes);
        let salt = SaltString::encode_b64(&salt_bytes)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;

        let hash = self
            .argon2()
            .hash_password(password.as_bytes(), &salt)
            .map_err(|e| PasswordError::HashError(e.to_string()))?;

        Ok(hash.to_string())
    }

    /// Check a password against a stored hash.
    pub fn verify(&self, password: &str, hash: &str) -> Result<bool, PasswordError> {
        let parsed_hash = PasswordHash::new(hash).map_err(|_| PasswordError::InvalidHash)?;

        match Argon2::default().verify_password(password.as_bytes(), &parsed_hash) {
            Ok(()) => Ok(true),
            Err(argon2::password_hash::Error::Password) => Ok(false),
            Err(e) => Err(PasswordError::HashError(e.to_string())),
        }
    }

    /// [`hash`](Self::hash) on the blocking thread pool.
    pub async fn hash_blocking(&self, password: String) -> crate::Result<String> {
        let hasher = self.clone();
        let hash = tokio::task::spawn_blocking(move || hasher.hash(&password))
            .await
            .map_err(|e| TallyError::Internal(format!("hashing task failed: {e}")))??;
        Ok(hash)
    }

    /// [`verify`](Self::verify) on the blocking thread pool.
    pub async fn verify_blocking(&self, password: String, hash: String) -> crate::Result<bool> {
        let hasher = self.clone();
        let ok = tokio::task::spawn_blocking(move || hasher.verify(&password, &hash))
            .await
            .map_err(|e| TallyError::Internal(format!("hashing task failed: {e}")))??;
        Ok(ok)
    }
}

impl std::fmt::Debug for PasswordHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PasswordHasher")
            .field("m_cost", &self.params.m_cost())
            .field("t_cost", &self.params.t_cost())
            .field("p_cost", &self.params.p_cost())
            .field("salt_length", &self.salt_length)
            .finish()
    }
}
