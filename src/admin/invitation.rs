//! Invitations for administrators.
//!
//! An invitation carries a role and a set of stores to a not yet
//! registered email address. Its plaintext token goes out through the
//! notifier; only the digest is stored.

use chrono::{Duration, Utc};
use tracing::{error, info};
use uuid::Uuid;

use crate::auth::{generate_token, AuthContext, Notification, Notifier, INVITATION_TTL_DAYS};
use crate::db::{
    Database, Invitation, InvitationRepository, InvitationStatus, NewInvitation, RoleRepository,
    StoreRepository, TenantRepository, UserRepository,
};
use crate::{Result, TallyError};

use super::{owned_by_tenant, CREATE, DELETE, INVITATION_FEATURE, READ};

/// Who to invite, with which role and stores.
#[derive(Debug, Clone)]
pub struct InvitationInput {
    pub email: String,
    pub role_id: Uuid,
    pub store_ids: Vec<Uuid>,
}

/// Admin service for invitations.
pub struct InvitationAdminService<'a> {
    db: &'a Database,
    notifier: &'a dyn Notifier,
}

impl<'a> InvitationAdminService<'a> {
    pub fn new(db: &'a Database, notifier: &'a dyn Notifier) -> Self {
        Self { db, notifier }
    }

    /// Create a pending invitation and send its token.
    pub async fn create(&self, ctx: &AuthContext, input: &InvitationInput) -> Result<Invitation> {
        ctx.require_permission(INVITATION_FEATURE, CREATE)?;
        let email = input.email.to_lowercase();

        let mut conn = self.db.acquire().await?;
        if UserRepository::new(&mut conn)
            .get_by_email(&email)
            .await?
            .is_some()
        {
            return Err(TallyError::Conflict(
                "a user with this email already exists".to_string(),
            ));
        }

        let role_owned = RoleRepository::new(&mut conn)
            .get_by_id(input.role_id)
            .await?
            .is_some_and(|r| r.tenant_id == ctx.tenant_id);
        if !role_owned {
            return Err(TallyError::Validation("role not found".to_string()));
        }

        let mut stores = StoreRepository::new(&mut conn);
        for store_id in &input.store_ids {
            let owned = stores
                .get_by_id(*store_id)
                .await?
                .is_some_and(|s| s.tenant_id == ctx.tenant_id);
            if !owned {
                return Err(TallyError::Validation(format!(
                    "store not found: {store_id}"
                )));
            }
        }

        let token = generate_token();
        let invitation = InvitationRepository::new(&mut conn)
            .create(&NewInvitation {
                tenant_id: ctx.tenant_id,
                invited_by: ctx.user_id,
                email,
                role_id: input.role_id,
                store_ids: input.store_ids.clone(),
                token_hash: token.hash,
                expires_at: Utc::now() + Duration::days(INVITATION_TTL_DAYS),
            })
            .await?;

        info!(
            invitation_id = %invitation.id,
            tenant_id = %ctx.tenant_id,
            invited_by = %ctx.user_id,
            "Invitation created"
        );

        match TenantRepository::new(&mut conn).get_by_id(ctx.tenant_id).await {
            Ok(Some(tenant)) => {
                let notification = Notification::Invitation {
                    email: invitation.email.clone(),
                    token: token.plain,
                    tenant_name: tenant.name,
                };
                if let Err(e) = self.notifier.deliver(&notification) {
                    error!(invitation_id = %invitation.id, error = %e, "Failed to deliver invitation");
                }
            }
            Ok(None) => error!(tenant_id = %ctx.tenant_id, "Tenant missing for invitation"),
            Err(e) => error!(error = %e, "Failed to load tenant for invitation"),
        }

        Ok(invitation)
    }

    /// All invitations of the caller's tenant, newest first.
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<Invitation>> {
        ctx.require_permission(INVITATION_FEATURE, READ)?;
        let mut conn = self.db.acquire().await?;
        InvitationRepository::new(&mut conn)
            .list_by_tenant(ctx.tenant_id)
            .await
    }

    /// Cancel a pending invitation.
    pub async fn cancel(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        ctx.require_permission(INVITATION_FEATURE, DELETE)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = InvitationRepository::new(&mut conn);
        owned_by_tenant(repo.get_by_id(id).await?, |i| i.tenant_id, ctx, "invitation")?;

        if !repo
            .transition_from_pending(id, InvitationStatus::Cancelled)
            .await?
        {
            return Err(TallyError::Validation(
                "can only cancel pending invitations".to_string(),
            ));
        }

        info!(invitation_id = %id, "Invitation cancelled");
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::admin::testing::{context, fixture, register};
    use crate::admin::{RoleAdminService, RoleInput, StoreAdminService};
    use crate::auth::AcceptInvitationInput;

    async fn cashier_role(f: &crate::admin::testing::Fixture) -> Uuid {
        RoleAdminService::new(&f.db)
            .create(
                &f.ctx,
                &RoleInput {
                    name: "Cashier".to_string(),
                    description: None,
                },
            )
            .await
            .unwrap()
            .id
    }

    #[tokio::test]
    async fn test_create_sends_token() {
        let f = fixture().await;
        let service = InvitationAdminService::new(&f.db, f.notifier.as_ref());
        let role_id = cashier_role(&f).await;
        let store = StoreAdminService::new(&f.db).list(&f.ctx).await.unwrap().remove(0);

        let invitation = service
            .create(
                &f.ctx,
                &InvitationInput {
                    email: "New@Acme.test".to_string(),
                    role_id,
                    store_ids: vec![store.id],
                },
            )
            .await
            .unwrap();

        assert_eq!(invitation.email, "new@acme.test");
        assert_eq!(invitation.status(), Some(InvitationStatus::Pending));
        assert_eq!(invitation.invited_by, f.admin.id);
        assert!(invitation.expires_at > Utc::now() + Duration::days(6));

        let sent = f.notifier.sent();
        let last = sent.last().unwrap();
        assert!(matches!(
            last,
            Notification::Invitation { tenant_name, .. } if tenant_name == "Acme"
        ));

        // the delivered token redeems the invitation
        let token = f.notifier.last_invitation_token("new@acme.test").unwrap();
        let session = f
            .auth
            .accept_invitation(AcceptInvitationInput {
                token,
                password: "password123".to_string(),
                first_name: "New".to_string(),
                last_name: "Hire".to_string(),
            })
            .await
            .unwrap();
        assert_eq!(session.user.tenant_id, f.admin.tenant_id);

        let listed = service.list(&f.ctx).await.unwrap();
        assert_eq!(listed[0].status(), Some(InvitationStatus::Accepted));
    }

    #[tokio::test]
    async fn test_create_rejects_foreign_role_and_existing_email() {
        let f = fixture().await;
        let service = InvitationAdminService::new(&f.db, f.notifier.as_ref());
        let other = register(&f.auth, "Globex", "owner@globex.test").await;
        let other_ctx = context(&f.db, &other).await;
        let foreign_role = RoleAdminService::new(&f.db)
            .list(&other_ctx)
            .await
            .unwrap()
            .remove(0);

        let err = service
            .create(
                &f.ctx,
                &InvitationInput {
                    email: "x@acme.test".to_string(),
                    role_id: foreign_role.id,
                    store_ids: vec![],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.message(), "role not found");

        let role_id = cashier_role(&f).await;
        let err = service
            .create(
                &f.ctx,
                &InvitationInput {
                    email: "OWNER@globex.test".to_string(),
                    role_id,
                    store_ids: vec![],
                },
            )
            .await
            .unwrap_err();
        assert!(matches!(err, TallyError::Conflict(_)));

        let foreign_store = StoreAdminService::new(&f.db)
            .list(&other_ctx)
            .await
            .unwrap()
            .remove(0);
        let err = service
            .create(
                &f.ctx,
                &InvitationInput {
                    email: "x@acme.test".to_string(),
                    role_id,
                    store_ids: vec![foreign_store.id],
                },
            )
            .await
            .unwrap_err();
        assert_eq!(err.message(), format!("store not found: {}", foreign_store.id));
    }

    #[tokio::test]
    async fn test_cancel() {
        let f = fixture().await;
        let service = InvitationAdminService::new(&f.db, f.notifier.as_ref());
        let role_id = cashier_role(&f).await;
        let invitation = service
            .create(
                &f.ctx,
                &InvitationInput {
                    email: "gone@acme.test".to_string(),
                    role_id,
                    store_ids: vec![],
                },
            )
            .await
            .unwrap();

        service.cancel(&f.ctx, invitation.id).await.unwrap();
        let err = service.cancel(&f.ctx, invitation.id).await.unwrap_err();
        assert!(matches!(err, TallyError::Validation(_)));
        assert_eq!(err.message(), "can only cancel pending invitations");

        let token = f.notifier.last_invitation_token("gone@acme.test").unwrap();
        let err = f
            .auth
            .accept_invitation(AcceptInvitationInput {
                token,
                password: "password123".to_string(),
                first_name: "G".to_string(),
                last_name: "O".to_string(),
            })
            .await
            .unwrap_err();
        assert_eq!(err.message(), "invitation is no longer valid");

        let err = service.cancel(&f.ctx, Uuid::new_v4()).await.unwrap_err();
        assert!(matches!(err, TallyError::NotFound(_)));
    }

    #[tokio::test]
    async fn test_role_with_pending_invitation_cannot_be_deleted() {
        let f = fixture().await;
        let service = InvitationAdminService::new(&f.db, f.notifier.as_ref());
        let roles = RoleAdminService::new(&f.db);
        let role_id = cashier_role(&f).await;
        let invitation = service
            .create(
                &f.ctx,
                &InvitationInput {
                    email: "wait@acme.test".to_string(),
                    role_id,
                    store_ids: vec![],
                },
            )
            .await
            .unwrap();

        let err = roles.delete(&f.ctx, role_id).await.unwrap_err();
        assert!(matches!(err, TallyError::Conflict(_)));
        assert_eq!(err.message(), "cannot delete a role with pending invitations");
        assert_eq!(
            service.list(&f.ctx).await.unwrap()[0].status(),
            Some(InvitationStatus::Pending)
        );

        // once settled, the role can go and the invitation row stays
        service.cancel(&f.ctx, invitation.id).await.unwrap();
        roles.delete(&f.ctx, role_id).await.unwrap();

        let listed = service.list(&f.ctx).await.unwrap();
        assert_eq!(listed.len(), 1);
        assert_eq!(listed[0].id, invitation.id);
        assert_eq!(listed[0].status(), Some(InvitationStatus::Cancelled));
        assert_eq!(listed[0].role_id, None);
    }
}
