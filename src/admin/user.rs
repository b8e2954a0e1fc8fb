//! User management for administrators.
//!
//! This module provides administrative functions for managing users:
//! - List users and view one with roles and stores (`settings.user` read)
//! - Update name and active flag (`settings.user` edit)
//! - Deactivate (`settings.user` delete)
//! - Replace store assignments (`settings.user` edit)
//!
//! Users are never hard-deleted. Nobody can deactivate their own account.

use tracing::info;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::db::{
    Database, Role, RoleRepository, Store, StoreRepository, User, UserRepository, UserUpdate,
};
use crate::{Result, TallyError};

use super::{owned_by_tenant, DELETE, EDIT, READ, USER_FEATURE};

/// A user with their roles and explicitly assigned stores.
#[derive(Debug, Clone)]
pub struct UserDetail {
    pub user: User,
    pub roles: Vec<Role>,
    pub stores: Vec<Store>,
}

/// Fields an administrator may change on a user.
#[derive(Debug, Clone, Default)]
pub struct UserPatch {
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
}

/// Admin service for user management.
pub struct UserAdminService<'a> {
    db: &'a Database,
}

impl<'a> UserAdminService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// List the users of the caller's tenant, including inactive ones.
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<User>> {
        ctx.require_permission(USER_FEATURE, READ)?;
        let mut conn = self.db.acquire().await?;
        UserRepository::new(&mut conn)
            .list_by_tenant(ctx.tenant_id)
            .await
    }

    /// Get a user with roles and stores.
    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<UserDetail> {
        ctx.require_permission(USER_FEATURE, READ)?;
        let mut conn = self.db.acquire().await?;
        let user = owned_by_tenant(
            UserRepository::new(&mut conn).get_by_id(id).await?,
            |u| u.tenant_id,
            ctx,
            "user",
        )?;
        let roles = RoleRepository::new(&mut conn).list_for_user(id).await?;
        let stores = StoreRepository::new(&mut conn).list_for_user(id).await?;
        Ok(UserDetail {
            user,
            roles,
            stores,
        })
    }

    /// Update name and active flag.
    pub async fn update(&self, ctx: &AuthContext, id: Uuid, patch: &UserPatch) -> Result<User> {
        ctx.require_permission(USER_FEATURE, EDIT)?;
        if patch.is_active == Some(false) {
            forbid_self(ctx, id)?;
        }

        let mut conn = self.db.acquire().await?;
        let mut repo = UserRepository::new(&mut conn);
        owned_by_tenant(repo.get_by_id(id).await?, |u| u.tenant_id, ctx, "user")?;

        let mut update = UserUpdate::new();
        if let Some(name) = &patch.first_name {
            update = update.first_name(name.clone());
        }
        if let Some(name) = &patch.last_name {
            update = update.last_name(name.clone());
        }
        if let Some(active) = patch.is_active {
            update = update.is_active(active);
        }

        repo.update(id, &update)
            .await?
            .ok_or_else(|| TallyError::NotFound("user".to_string()))
    }

    /// Soft-delete a user by clearing the active flag.
    pub async fn deactivate(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        ctx.require_permission(USER_FEATURE, DELETE)?;
        forbid_self(ctx, id)?;

        let mut conn = self.db.acquire().await?;
        let mut repo = UserRepository::new(&mut conn);
        owned_by_tenant(repo.get_by_id(id).await?, |u| u.tenant_id, ctx, "user")?;
        repo.update(id, &UserUpdate::new().is_active(false)).await?;

        info!(user_id = %id, by = %ctx.user_id, "User deactivated");
        Ok(())
    }

    /// Replace a user's store assignments.
    ///
    /// Every store must belong to the caller's tenant.
    pub async fn set_stores(
        &self,
        ctx: &AuthContext,
        id: Uuid,
        store_ids: &[Uuid],
    ) -> Result<Vec<Store>> {
        ctx.require_permission(USER_FEATURE, EDIT)?;
        {
            let mut conn = self.db.acquire().await?;
            owned_by_tenant(
                UserRepository::new(&mut conn).get_by_id(id).await?,
                |u| u.tenant_id,
                ctx,
                "user",
            )?;

            let mut stores = StoreRepository::new(&mut conn);
            for store_id in store_ids {
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
        }

        let mut tx = self.db.begin().await?;
        let mut users = UserRepository::new(&mut tx);
        users.clear_stores(id).await?;
        for store_id in store_ids {
            users.assign_store(id, *store_id, Some(ctx.user_id)).await?;
        }
        let stores = StoreRepository::new(&mut tx).list_for_user(id).await?;
        tx.commit().await?;

        info!(user_id = %id, stores = stores.len(), "User stores replaced");
        Ok(stores)
    }
}

fn forbid_self(ctx: &AuthContext, id: Uuid) -> Result<()> {
    if ctx.user_id == id {
        Err(TallyError::Permission(
            "cannot deactivate your own account".to_string(),
        ))
    } else {
        Ok(())
    }
}
