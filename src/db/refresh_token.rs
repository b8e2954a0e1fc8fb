//! Refresh token repository.
//!
//! Only the SHA-256 digest of each opaque token is stored. Rows are never
//! un-revoked; revocation is a one-way transition.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::Result;

/// Refresh token entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RefreshToken {
    /// Token ID.
    pub id: Uuid,
    /// User ID.
    pub user_id: Uuid,
    /// Digest of the opaque token.
    pub token_hash: String,
    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
    /// Whether the token has been revoked (rotated, logged out, or killed).
    pub revoked: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
}

impl RefreshToken {
    /// Whether the token is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// New refresh token for creation.
pub struct NewRefreshToken {
    /// User ID.
    pub user_id: Uuid,
    /// Digest of the opaque token.
    pub token_hash: String,
    /// Expiration timestamp.
    pub expires_at: DateTime<Utc>,
}

/// Repository for refresh token operations.
pub struct RefreshTokenRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> RefreshTokenRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a new refresh token.
    pub async fn create(&mut self, new_token: &NewRefreshToken) -> Result<RefreshToken> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "INSERT INTO refresh_tokens (id, user_id, token_hash, expires_at, revoked, created_at)
             VALUES ($1, $2, $3, $4, 0, $5)
             RETURNING id, user_id, token_hash, expires_at, revoked, created_at",
        )
        .bind(Uuid::new_v4())
        .bind(new_token.user_id)
        .bind(&new_token.token_hash)
        .bind(new_token.expires_at)
        .bind(Utc::now())
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(token)
    }

    /// Get a refresh token by the digest of its plaintext.
    pub async fn get_by_hash(&mut self, token_hash: &str) -> Result<Option<RefreshToken>> {
        let token = sqlx::query_as::<_, RefreshToken>(
            "SELECT id, user_id, token_hash, expires_at, revoked, created_at
             FROM refresh_tokens WHERE token_hash = $1",
        )
        .bind(token_hash)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(token)
    }

    /// Revoke a token by ID if it is still live.
    ///
    /// This is the compare-and-swap step of rotation: of two concurrent
    /// callers, only one sees `true`.
    pub async fn revoke(&mut self, id: Uuid) -> Result<bool> {
        let result =
            sqlx::query("UPDATE refresh_tokens SET revoked = 1 WHERE id = $1 AND revoked = 0")
                .bind(id)
                .execute(&mut *self.conn)
                .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Revoke every live token of a user.
    pub async fn revoke_all_for_user(&mut self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query(
            "UPDATE refresh_tokens SET revoked = 1 WHERE user_id = $1 AND revoked = 0",
        )
        .bind(user_id)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected())
    }

    /// Delete tokens whose expiry has passed.
    ///
    /// Revoked tokens are kept until they expire so that a replayed token
    /// is still recognised as reuse rather than as an unknown token.
    pub async fn cleanup_expired(&mut self, now: DateTime<Utc>) -> Result<u64> {
        let result = sqlx::query("DELETE FROM refresh_tokens WHERE expires_at < $1")
            .bind(now)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }
}
