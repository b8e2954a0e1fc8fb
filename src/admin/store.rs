//! Store management for administrators.

use tracing::info;
use uuid::Uuid;

use crate::auth::AuthContext;
use crate::db::{Database, NewStore, Store, StoreChanges, StoreRepository};
use crate::{Result, TallyError};

use super::{owned_by_tenant, CREATE, DELETE, EDIT, READ, STORE_FEATURE};

/// Data for a new store.
#[derive(Debug, Clone)]
pub struct StoreInput {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Replacement details for a store. `is_active: None` keeps the flag.
#[derive(Debug, Clone)]
pub struct StorePatch {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

/// Admin service for stores.
pub struct StoreAdminService<'a> {
    db: &'a Database,
}

impl<'a> StoreAdminService<'a> {
    pub fn new(db: &'a Database) -> Self {
        Self { db }
    }

    /// Stores of the tenant that the caller may act on.
    pub async fn list(&self, ctx: &AuthContext) -> Result<Vec<Store>> {
        ctx.require_permission(STORE_FEATURE, READ)?;
        let mut conn = self.db.acquire().await?;
        let stores = StoreRepository::new(&mut conn)
            .list_by_tenant(ctx.tenant_id)
            .await?;
        Ok(stores
            .into_iter()
            .filter(|s| ctx.can_access_store(s.id))
            .collect())
    }

    /// Get one store. Stores outside the caller's scope are forbidden.
    pub async fn get(&self, ctx: &AuthContext, id: Uuid) -> Result<Store> {
        ctx.require_permission(STORE_FEATURE, READ)?;
        let mut conn = self.db.acquire().await?;
        let store = owned_by_tenant(
            StoreRepository::new(&mut conn).get_by_id(id).await?,
            |s| s.tenant_id,
            ctx,
            "store",
        )?;
        ctx.require_store(store.id)?;
        Ok(store)
    }

    /// Open a new store in the caller's tenant.
    pub async fn create(&self, ctx: &AuthContext, input: &StoreInput) -> Result<Store> {
        ctx.require_permission(STORE_FEATURE, CREATE)?;
        let mut conn = self.db.acquire().await?;
        let store = StoreRepository::new(&mut conn)
            .create(&NewStore {
                tenant_id: ctx.tenant_id,
                name: input.name.clone(),
                address: input.address.clone().filter(|a| !a.is_empty()),
                phone: input.phone.clone().filter(|p| !p.is_empty()),
            })
            .await?;

        info!(store_id = %store.id, tenant_id = %ctx.tenant_id, "Store created");
        Ok(store)
    }

    /// Replace a store's name, address, phone and optionally its active flag.
    pub async fn update(&self, ctx: &AuthContext, id: Uuid, patch: &StorePatch) -> Result<Store> {
        ctx.require_permission(STORE_FEATURE, EDIT)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = StoreRepository::new(&mut conn);
        let existing = owned_by_tenant(repo.get_by_id(id).await?, |s| s.tenant_id, ctx, "store")?;
        ctx.require_store(existing.id)?;

        let changes = StoreChanges {
            name: patch.name.clone(),
            address: patch.address.clone().filter(|a| !a.is_empty()),
            phone: patch.phone.clone().filter(|p| !p.is_empty()),
            is_active: patch.is_active.unwrap_or(existing.is_active),
        };
        let store = repo
            .update(id, &changes)
            .await?
            .ok_or_else(|| TallyError::NotFound("store".to_string()))?;

        info!(store_id = %id, by = %ctx.user_id, "Store updated");
        Ok(store)
    }

    /// Soft-delete a store by clearing its active flag.
    pub async fn deactivate(&self, ctx: &AuthContext, id: Uuid) -> Result<()> {
        ctx.require_permission(STORE_FEATURE, DELETE)?;
        let mut conn = self.db.acquire().await?;
        let mut repo = StoreRepository::new(&mut conn);
        owned_by_tenant(repo.get_by_id(id).await?, |s| s.tenant_id, ctx, "store")?;
        ctx.require_store(id)?;
        repo.deactivate(id).await?;

        info!(store_id = %id, by = %ctx.user_id, "Store deactivated");
        Ok(())
    }
}
