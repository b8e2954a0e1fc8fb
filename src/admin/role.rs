//! Role management for administrators.
//!
//! This module provides administrative functions for managing roles:
//! - List, get, create (`settings.role` read / create)
//! - Rename and describe (`settings.role` edit)
//! - Delete (`settings.role` delete)
//! - Replace the permission set (`settings.role` edit)
//!
//! The system-default role can be neither renamed nor deleted.

use tracing::info;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::db::{
    Database, FeatureRepository, InvitationRepository, NewRole, Role, RolePermissionDetail,
    RoleRepository,
};
use crate::{Result, TallyError};

use super::{owned_by_tenant, CREATE, DELETE, EDIT, READ, ROLE_FEATURE};

/// Name and description of a role.
#[derive(Debug, Clone)]
pub struct RoleInput {
    pub name: String,
    pub description: Option<String>,
}

impl RoleInput {
    fn description(&self) -> Option<&str> {
        self.description.as_deref().filter(|d| !d.is_empty())
    }
}

/// Actions to grant on one feature.
#[derive(Debug, Clone)]
pub struct PermissionGrant {
    pub feature_id: Uuid,
    pub actions: Vec<String>,
}

/// A role with its permissions.
#[derive(Debug, Clone)]
pub struct RoleDetail {
    pub role: Role,
    pub permissions: Vec<RolePermissionDetail>,
}

/// Admin service for role management.
pub struct RoleAdminService<'a> {
    db: &'a Database,
}

impl<'a> RoleAdminService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// List the roles of the caller's tenant.
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<Role>> {
        ctx.require_permission(ROLE_FEATURE, READ)?;
        let mut conn = self.db.acquire().await?;
        RoleRepository::new(&mut conn)
            .list_by_tenant(ctx.tenant_id)
            .await
    }

    /// Get a role with its permissions.
    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<RoleDetail> {
        ctx.require_permission(ROLE_FEATURE, READ)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = RoleRepository::new(&mut conn);
        let role = owned_by_tenant(repo.get_by_id(id).await?, |r| r.tenant_id, ctx, "role")?;
        let permissions = repo.permissions(id).await?;
        Ok(RoleDetail { role, permissions })
    }

    /// Create a custom role with no permissions.
    pub async fn create(&self, ctx: &AuthContext, input: &RoleInput) -> Result<Role> {
        ctx.require_permission(ROLE_FEATURE, CREATE)?;
        let mut conn = self.db.acquire().await?;
        let role = RoleRepository::new(&mut conn)
            .create(&NewRole {
                tenant_id: ctx.tenant_id,
                name: input.name.clone(),
                description: input.description().map(str::to_string),
                is_system_default: false,
            })
            .await?;

        info!(role_id = %role.id, tenant_id = %ctx.tenant_id, "Role created");
        Ok(role)
    }

    /// Rename a role and replace its description.
    pub async fn update(&self, ctx: &AuthContext, id: Uuid, input: &RoleInput) -> Result<Role> {
        ctx.require_permission(ROLE_FEATURE, EDIT)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = RoleRepository::new(&mut conn);
        let existing = owned_by_tenant(repo.get_by_id(id).await?, |r| r.tenant_id, ctx, "role")?;

        if existing.is_system_default && input.name != existing.name {
            return Err(TallyError::Permission(
                "cannot rename system default roles".to_string(),
            ));
        }

        repo.update(id, &input.name, input.description())
            .await?
            .ok_or_else(|| TallyError::NotFound("role".to_string()))
    }

    /// Delete a custom role. Its grants and assignments go with it.
    ///
    /// Refused while a pending invitation would still grant the role.
    /// Settled invitations keep their row with the role cleared.
    pub async fn delete(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        ctx.require_permission(ROLE_FEATURE, DELETE)?;
        let mut tx = self.db.begin().await?;
        let existing = owned_by_tenant(
            RoleRepository::new(&mut tx).get_by_id(id).await?,
            |r| r.tenant_id,
            ctx,
            "role",
        )?;

        if existing.is_system_default {
            return Err(TallyError::Permission(
                "cannot delete system default roles".to_string(),
            ));
        }

        if InvitationRepository::new(&mut tx)
            .count_pending_for_role(id)
            .await?
            > 0
        {
            return Err(TallyError::Conflict(
                "cannot delete a role with pending invitations".to_string(),
            ));
        }

        RoleRepository::new(&mut tx).delete(id).await?;
        tx.commit().await?;
        info!(role_id = %id, tenant_id = %ctx.tenant_id, "Role deleted");
        Ok(())
    }

    /// Replace every permission of a role.
    ///
    /// Each grant must name an existing feature and only actions that the
    /// feature declares. Nothing is written unless every grant is valid.
    pub async fn set_permissions(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        grants: &[PermissionGrant],
    ) -> Result<Vec<RolePermissionDetail>> {
        ctx.require_permission(ROLE_FEATURE, EDIT)?;
        {
            let mut conn = self.db.acquire().await?;
            owned_by_tenant(
                RoleRepository::new(&mut conn).get_by_id(id).await?,
                |r| r.tenant_id,
                ctx,
                "role",
            )?;

            let mut features = FeatureRepository::new(&mut conn);
            for grant in grants {
                let feature = features.get_by_id(grant.feature_id).await?.ok_or_else(|| {
                    TallyError::Validation(format!("feature not found: {}", grant.feature_id))
                })?;
                if let Some(action) = grant.actions.iter().find(|a| !feature.allows(a)) {
                    return Err(TallyError::Validation(format!(
                        "invalid action '{}' for feature {}",
                        action, feature.slug
                    )));
                }
            }
        }

        let mut tx = self.db.begin().await?;
        let mut repo = RoleRepository::new(&mut tx);
        repo.clear_permissions(id).await?;
        for grant in grants {
            repo.set_permission(id, grant.feature_id, &grant.actions)
                .await?;
        }
        let permissions = repo.permissions(id).await?;
        tx.commit().await?;

        info!(
            role_id = %id,
            grants = permissions.len(),
            "Role permissions replaced"
        );
        Ok(permissions)
    }
}
