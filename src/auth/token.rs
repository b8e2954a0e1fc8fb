//! Opaque token generation and hashing.
//!
//! Refresh, verification, reset and invitation tokens are 32 random bytes,
//! hex encoded. Only the SHA-256 digest of the plaintext is persisted.

use rand::RngCore;
use sha2::{Digest, Sha256};

/// Number of random bytes in an opaque token.
pub const TOKEN_BYTES: usize = 32;

/// A freshly generated opaque token.
#[derive(Debug, Clone)]
pub struct GeneratedToken {
    /// Hex plaintext, handed to the client exactly once.
    pub plain: String,
    /// Hex SHA-256 of `plain`, the lookup key stored server side.
    pub hash: String,
}

/// Generate a new random token and its digest.
pub fn generate_token() -> GeneratedToken {
    let mut bytes = [0u8; TOKEN_BYTES];
    rand::rng().fill_bytes(&mut bytes);
    let plain = hex::encode(bytes);
    let hash = hash_token(&plain);
    GeneratedToken { plain, hash }
}

/// Digest of a plaintext token, for lookup.
pub fn hash_token(plain: &str) -> String {
    hex::encode(Sha256::digest(plain.as_bytes()))
}
