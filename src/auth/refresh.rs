//! Refresh token lifecycle: issue, rotate with reuse detection, revoke.

use chrono::{Duration, Utc};
use sqlx::SqliteConnection;
use tracing::{info, warn};
use uuid::Uuid;

use super::token::{generate_token, hash_token};
use crate::config::MAX_TOKEN_TTL_SECS;
use crate::db::{Database, NewRefreshToken, RefreshTokenRepository, User, UserRepository};
use crate::{Result, TallyError};

/// Outcome of a successful rotation.
#[derive(Debug)]
pub struct Rotation {
    /// Owner of the rotated token.
    pub user: User,
    /// Plaintext of the replacement refresh token.
    pub refresh_token: String,
}

/// Issues and rotates opaque refresh tokens.
#[derive(Debug, Clone)]
pub struct RefreshTokenManager {
    db: Database,
    ttl: Duration,
}

impl RefreshTokenManager {
    /// Create a manager issuing tokens valid for `ttl_secs`.
    pub fn new(db: Database, ttl_secs: u64) -> Self {
        Self {
            db,
            ttl: Duration::seconds(ttl_secs.min(MAX_TOKEN_TTL_SECS) as i64),
        }
    }

    /// Issue a new refresh token for a user on `conn`, returning its plaintext.
    ///
    /// Runs on the caller's connection so it can join an open transaction.
    pub async fn issue(&self, conn: &mut SqliteConnection, user_id: Uuid) -> Result<String> {
        let token = generate_token();
        RefreshTokenRepository::new(conn)
            .create(&NewRefreshToken {
                user_id,
                token_hash: token.hash,
                expires_at: Utc::now() + self.ttl,
            })
            .await?;
        Ok(token.plain)
    }

    /// Exchange a live refresh token for a new one.
    ///
    /// Presenting a revoked token is treated as theft: every token of the
    /// owner is revoked before failing. Losing a concurrent rotation of the
    /// same token counts as presenting a revoked one.
    pub async fn rotate(&self, plain: &str) -> Result<Rotation> {
        let token_hash = hash_token(plain);

        let (stored, user) = {
            let mut conn = self.db.acquire().await?;
            let stored = RefreshTokenRepository::new(&mut conn)
                .get_by_hash(&token_hash)
                .await?
                .ok_or_else(|| TallyError::Auth("invalid refresh token".to_string()))?;

            if stored.revoked {
                let revoked = RefreshTokenRepository::new(&mut conn)
                    .revoke_all_for_user(stored.user_id)
                    .await?;
                warn!(
                    user_id = %stored.user_id,
                    revoked_count = revoked,
                    "Refresh token reuse detected; all sessions revoked"
                );
                return Err(TallyError::Auth("refresh token has been revoked".to_string()));
            }

            if stored.is_expired_at(Utc::now()) {
                return Err(TallyError::Auth("refresh token has expired".to_string()));
            }

            let user = UserRepository::new(&mut conn)
                .get_by_id(stored.user_id)
                .await?
                .ok_or_else(|| TallyError::Auth("invalid refresh token".to_string()))?;
            (stored, user)
        };

        if !user.is_active {
            warn!(user_id = %user.id, "Refresh attempted for deactivated account");
            return Err(TallyError::Auth("account is deactivated".to_string()));
        }

        // The transaction opens with the guarded write so that two concurrent
        // rotations of one token serialise on it.
        let mut tx = self.db.begin().await?;
        if !RefreshTokenRepository::new(&mut tx).revoke(stored.id).await? {
            let revoked = RefreshTokenRepository::new(&mut tx)
                .revoke_all_for_user(user.id)
                .await?;
            tx.commit().await?;
            warn!(
                user_id = %user.id,
                revoked_count = revoked,
                "Concurrent refresh token reuse; all sessions revoked"
            );
            return Err(TallyError::Auth("refresh token has been revoked".to_string()));
        }
        let refresh_token = self.issue(&mut tx, user.id).await?;
        tx.commit().await?;

        info!(user_id = %user.id, "Refresh token rotated");
        Ok(Rotation {
            user,
            refresh_token,
        })
    }

    /// Revoke one token. Unknown or already revoked tokens are a no-op.
    pub async fn revoke(&self, plain: &str) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        let mut repo = RefreshTokenRepository::new(&mut conn);
        if let Some(stored) = repo.get_by_hash(&hash_token(plain)).await? {
            if repo.revoke(stored.id).await? {
                info!(user_id = %stored.user_id, "Refresh token revoked");
            }
        }
        Ok(())
    }

    /// Revoke every live token of a user on `conn`.
    pub async fn revoke_all(&self, conn: &mut SqliteConnection, user_id: Uuid) -> Result<u64> {
        RefreshTokenRepository::new(conn)
            .revoke_all_for_user(user_id)
            .await
    }

    /// Delete expired tokens. Revoked tokens stay until they expire.
    pub async fn cleanup_expired(&self) -> Result<u64> {
        let mut conn = self.db.acquire().await?;
        RefreshTokenRepository::new(&mut conn)
            .cleanup_expired(Utc::now())
            .await
    }
}
