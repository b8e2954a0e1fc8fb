//! Invitation repository.

use std::fmt;

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use crate::Result;

const INVITATION_COLUMNS: &str = "id, tenant_id, invited_by, email, role_id, store_ids, \
     token_hash, status, expires_at, created_at, updated_at";

/// Lifecycle state of an invitation.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InvitationStatus {
    Pending,
    Accepted,
    Cancelled,
}

impl InvitationStatus {
    /// Convert to string representation.
    pub fn as_str(&self) -> &'static str {
        match self {
            InvitationStatus::Pending => "pending",
            InvitationStatus::Accepted => "accepted",
            InvitationStatus::Cancelled => "cancelled",
        }
    }

    /// Parse from string.
    pub fn from_str(s: &str) -> Option<Self> {
        match s {
            "pending" => Some(InvitationStatus::Pending),
            "accepted" => Some(InvitationStatus::Accepted),
            "cancelled" => Some(InvitationStatus::Cancelled),
            _ => None,
        }
    }
}

impl fmt::Display for InvitationStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A pending, accepted, or cancelled offer to join a tenant.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Invitation {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invited_by: Uuid,
    pub email: String,
    /// Cleared when the role is deleted after the invitation settled.
    pub role_id: Option<Uuid>,
    pub store_ids: Json<Vec<Uuid>>,
    pub token_hash: String,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Invitation {
    /// Get the status as enum.
    pub fn status(&self) -> Option<InvitationStatus> {
        InvitationStatus::from_str(&self.status)
    }

    /// Whether the invitation is past its expiry at `now`.
    pub fn is_expired_at(&self, now: DateTime<Utc>) -> bool {
        self.expires_at <= now
    }
}

/// New invitation for creation. Always starts out pending.
#[derive(Debug, Clone)]
pub struct NewInvitation {
    pub tenant_id: Uuid,
    pub invited_by: Uuid,
    pub email: String,
    pub role_id: Uuid,
    pub store_ids: Vec<Uuid>,
    pub token_hash: String,
    pub expires_at: DateTime<Utc>,
}

/// Repository for invitation operations.
pub struct InvitationRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> InvitationRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a pending invitation.
    pub async fn create(&mut self, new_invitation: &NewInvitation) -> Result<Invitation> {
        let sql = format!(
            "INSERT INTO invitations (id, tenant_id, invited_by, email, role_id, store_ids,
                                      token_hash, status, expires_at, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 'pending', $8, $9, $9)
             RETURNING {INVITATION_COLUMNS}"
        );
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_invitation.tenant_id)
            .bind(new_invitation.invited_by)
            .bind(&new_invitation.email)
            .bind(new_invitation.role_id)
            .bind(Json(&new_invitation.store_ids))
            .bind(&new_invitation.token_hash)
            .bind(new_invitation.expires_at)
            .bind(Utc::now())
            .fetch_one(&mut *self.conn)
            .await?;

        Ok(invitation)
    }

    /// Get an invitation by ID.
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Invitation>> {
        let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE id = $1");
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(invitation)
    }

    /// Get an invitation by the digest of its token.
    pub async fn get_by_hash(&mut self, token_hash: &str) -> Result<Option<Invitation>> {
        let sql = format!("SELECT {INVITATION_COLUMNS} FROM invitations WHERE token_hash = $1");
        let invitation = sqlx::query_as::<_, Invitation>(&sql)
            .bind(token_hash)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(invitation)
    }

    /// List a tenant's invitations, newest first.
    pub async fn list_by_tenant(&mut self, tenant_id: Uuid) -> Result<Vec<Invitation>> {
        let sql = format!(
            "SELECT {INVITATION_COLUMNS} FROM invitations
             WHERE tenant_id = $1 ORDER BY created_at DESC"
        );
        let invitations = sqlx::query_as::<_, Invitation>(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(invitations)
    }

    /// Count pending invitations that would grant `role_id`.
    pub async fn count_pending_for_role(&mut self, role_id: Uuid) -> Result<i64> {
        let count: i64 = sqlx::query_scalar(
            "SELECT COUNT(*) FROM invitations WHERE role_id = $1 AND status = 'pending'",
        )
        .bind(role_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(count)
    }

    /// Move a pending invitation to `status`.
    ///
    /// Returns false if the invitation is no longer pending.
    pub async fn transition_from_pending(
        &mut self,
        id: Uuid,
        status: InvitationStatus,
    ) -> Result<bool> {
        let result = sqlx::query(
            "UPDATE invitations SET status = $1, updated_at = $2
             WHERE id = $3 AND status = 'pending'",
        )
        .bind(status.as_str())
        .bind(Utc::now())
        .bind(id)
        .execute(&mut *self.conn)
        .await?;

        Ok(result.rows_affected() > 0)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{
        Database, NewRole, NewTenant, NewUser, RoleRepository, TenantRepository, UserRepository,
    };
    use chrono::Duration;

    struct Fixture {
        db: Database,
        tenant_id: Uuid,
        inviter_id: Uuid,
        role_id: Uuid,
    }

    async fn setup() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let mut conn = db.acquire().await.unwrap();
        let tenant = TenantRepository::new(&mut conn)
            .create(&NewTenant {
                name: "Acme".to_string(),
                slug: "acme".to_string(),
            })
            .await
            .unwrap();
        let inviter = UserRepository::new(&mut conn)
            .create(&NewUser::new(tenant.id, "owner@x.com", "h", "O", "W"))
            .await
            .unwrap();
        let role = RoleRepository::new(&mut conn)
            .create(&NewRole {
                tenant_id: tenant.id,
                name: "Cashier".to_string(),
                description: None,
                is_system_default: false,
            })
            .await
            .unwrap();
        drop(conn);

        Fixture {
            db,
            tenant_id: tenant.id,
            inviter_id: inviter.id,
            role_id: role.id,
        }
    }

    fn new_invitation(f: &Fixture, email: &str, hash: &str) -> NewInvitation {
        NewInvitation {
            tenant_id: f.tenant_id,
            invited_by: f.inviter_id,
            email: email.to_string(),
            role_id: f.role_id,
            store_ids: vec![Uuid::new_v4()],
            token_hash: hash.to_string(),
            expires_at: Utc::now() + Duration::days(7),
        }
    }

    #[tokio::test]
    async fn test_create_invitation() {
        let f = setup().await;
        let mut conn = f.db.acquire().await.unwrap();
        let mut repo = InvitationRepository::new(&mut conn);

        let new = new_invitation(&f, "new@x.com", "inv-1");
        let invitation = repo.create(&new).await.unwrap();

        assert_eq!(invitation.status(), Some(InvitationStatus::Pending));
        assert_eq!(invitation.store_ids.0, new.store_ids);
        assert_eq!(invitation.email, "new@x.com");

        let found = repo.get_by_hash("inv-1").await.unwrap().unwrap();
        assert_eq!(found.id, invitation.id);
        assert!(repo.get_by_id(Uuid::new_v4()).await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_transition_from_pending_once() {
        let f = setup().await;
        let mut conn = f.db.acquire().await.unwrap();
        let mut repo = InvitationRepository::new(&mut conn);

        let invitation = repo
            .create(&new_invitation(&f, "a@x.com", "inv-a"))
            .await
            .unwrap();

        assert!(repo
            .transition_from_pending(invitation.id, InvitationStatus::Cancelled)
            .await
            .unwrap());
        assert!(!repo
            .transition_from_pending(invitation.id, InvitationStatus::Accepted)
            .await
            .unwrap());

        let stored = repo.get_by_id(invitation.id).await.unwrap().unwrap();
        assert_eq!(stored.status(), Some(InvitationStatus::Cancelled));
    }

    #[tokio::test]
    async fn test_list_by_tenant() {
        let f = setup().await;
        let mut conn = f.db.acquire().await.unwrap();
        let mut repo = InvitationRepository::new(&mut conn);

        repo.create(&new_invitation(&f, "a@x.com", "h-a")).await.unwrap();
        repo.create(&new_invitation(&f, "b@x.com", "h-b")).await.unwrap();

        assert_eq!(repo.list_by_tenant(f.tenant_id).await.unwrap().len(), 2);
        assert!(repo.list_by_tenant(Uuid::new_v4()).await.unwrap().is_empty());
    }
}
