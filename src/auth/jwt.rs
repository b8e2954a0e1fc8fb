//! Access token issuance and verification.
//!
//! Access tokens are HS256 JWTs. Verification is stateless: a token stays
//! valid for its whole lifetime even if the user is deactivated meanwhile.

use chrono::Utc;
use jsonwebtoken::{decode, encode, Algorithm, DecodingKey, EncodingKey, Header, Validation};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::config::MAX_TOKEN_TTL_SECS;
use crate::{Result, TallyError};

/// Claims carried by an access token.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Claims {
    /// User ID.
    pub user_id: Uuid,
    /// Tenant ID.
    pub tenant_id: Uuid,
    /// Email address at issue time.
    pub email: String,
    /// Expiration (unix seconds).
    pub exp: i64,
    /// Issued at (unix seconds).
    pub iat: i64,
    /// Not before (unix seconds).
    pub nbf: i64,
    /// Subject, the user ID as a string.
    pub sub: String,
}

/// Signs and verifies access tokens with a shared secret.
#[derive(Clone)]
pub struct TokenIssuer {
    encoding_key: EncodingKey,
    decoding_key: DecodingKey,
    validation: Validation,
    access_ttl_secs: i64,
}

impl TokenIssuer {
    /// Create an issuer from the signing secret and access token lifetime.
    pub fn new(secret: &str, access_ttl_secs: u64) -> Self {
        let mut validation = Validation::new(Algorithm::HS256);
        validation.leeway = 0;
        validation.validate_nbf = true;
        validation.set_required_spec_claims(&["exp", "iat", "nbf", "sub"]);

        Self {
            encoding_key: EncodingKey::from_secret(secret.as_bytes()),
            decoding_key: DecodingKey::from_secret(secret.as_bytes()),
            validation,
            access_ttl_secs: access_ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64,
        }
    }

    /// Access token lifetime in seconds.
    pub fn access_ttl_secs(&self) -> i64 {
        self.access_ttl_secs
    }

    /// Issue a signed access token for a user.
    pub fn issue(&self, user_id: Uuid, tenant_id: Uuid, email: &str) -> Result<String> {
        let now = Utc::now().timestamp();
        let claims = Claims {
            user_id,
            tenant_id,
            email: email.to_string(),
            exp: now + self.access_ttl_secs,
            iat: now,
            nbf: now,
            sub: user_id.to_string(),
        };

        encode(&Header::new(Algorithm::HS256), &claims, &self.encoding_key).map_err(|e| {
            tracing::error!("Failed to encode JWT: {}", e);
            TallyError::Internal("failed to generate access token".to_string())
        })
    }

    /// Verify a token's signature, algorithm and time window.
    ///
    /// Every failure reads the same to the caller.
    pub fn verify(&self, token: &str) -> Result<Claims> {
        let data = decode::<Claims>(token, &self.decoding_key, &self.validation).map_err(|e| {
            tracing::debug!("JWT validation failed: {}", e);
            TallyError::Auth("invalid or expired token".to_string())
        })?;

        Ok(data.claims)
    }
}

impl std::fmt::Debug for TokenIssuer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("TokenIssuer")
            .field("access_ttl_secs", &self.access_ttl_secs)
            .finish_non_exhaustive()
    }
}
