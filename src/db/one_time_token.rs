//! One-time token repository for email verification and password reset.
//!
//! A token row is single-use: once `is_used` flips it never flips back.
//! Rows are kept after use for auditing.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::Result;

/// Token purpose.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TokenPurpose {
    /// Proves ownership of the account's email address.
    EmailVerification,
    /// Authorises setting a new password without the old one.
    PasswordReset,
}

impl TokenPurpose {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            TokenPurpose::EmailVerification => "email_verification",
            TokenPurpose::PasswordReset => "password_reset",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "email_verification" => Some(TokenPurpose::EmailVerification),
            "password_reset" => Some(TokenPurpose::PasswordReset),
            _ => None,
        }
    }
}

/// One-time token entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct OneTimeToken {
    /// Token ID.
    pub id: Uuid,
    /// User ID.
    pub user_id: Uuid,
    /// Token purpose.
    pub purpose: String,
    /// Digest of the opaque token.
    pub token_hash: String,
    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been consumed.
    pub is_used: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl OneTimeToken {
    /// Get the token purpose as enum.
    pub fn purpose(&self) -> Option<TokenPurpose> {
        TokenPurpose::from_str(&self.purpose)
    }

    /// Whether the token is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// New one-time token for creation.
pub struct NewOneTimeToken {
    /// User ID.
    pub user_id: Uuid,
    /// Token purpose.
    pub purpose: TokenPurpose,
    /// Digest of the opaque token.
    pub token_hash: String,
    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

/// Repository for one-time token operations.
pub struct OneTimeTokenRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> OneTimeTokenRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a new one-time token.
    pub async fn create(&mut self, new_token: &NewOneTimeToken) -> Result<OneTimeToken> {
        let token = sqlx::query_as::<_, OneTimeToken>(
            "INSERT INTO one_time_tokens (id, user_id, purpose, token_hash, expires_at, is_used, created_at)
             VALUES ($1, $2, $3, $4, $5, 0, $6)
             RETURNING id, user_id, purpose, token_hash, expires_at, is_used, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new_token.user_id)
        .bind(new_token.purpose.as_str())
        .bind(&new_token.token_hash)
        .bind(new_token.expires_at)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(token)
    }

    /// Get a token by digest, restricted to one purpose.
    ///
    /// A verification token presented to the reset endpoint is not found.
    pub async fn get_by_hash(
        &mut self,
        token_hash: &str,
        purpose: TokenPurpose,
    ) -> Result<Option<OneTimeToken>> {
        let token = sqlx::query_as::<_, OneTimeToken>(
            "SELECT id, user_id, purpose, token_hash, expires_at, is_used, created_at
             FROM one_time_tokens WHERE token_hash = $1 AND purpose = $2",
        )
        .bind(token_hash)
        .bind(purpose.as_str())
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(token)
    }

    /// Mark a token as used if it is not already.
    ///
    /// Returns false when another consumer got there first.
    pub async fn mark_used(&mut self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE one_time_tokens SET is_used = 1 WHERE id = $1 AND is_used = 0")
                .bind(id)
                .execute(&mut *self.conn)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Count the tokens of a user for one purpose.
    pub async fn count_for_user(&mut self, user_id: Uuid, purpose: TokenPurpose) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM one_time_tokens WHERE user_id = $1 AND purpose = $2",
        )
        .bind(user_id)
        .bind(purpose.as_str())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }
}
