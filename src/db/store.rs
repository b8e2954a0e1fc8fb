//! Store repository.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::conflict_or_db;
use crate::Result;

const STORE_COLUMNS: &str =
    "id, tenant_id, name, address, phone, is_active, created_at, updated_at";

/// A physical point of sale belonging to a tenant.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Store {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New store for creation.
#[derive(Debug, Clone)]
pub struct NewStore {
    pub tenant_id: Uuid,
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
}

/// Replacement values for an existing store.
#[derive(Debug, Clone)]
pub struct StoreChanges {
    pub name: String,
    pub address: Option<String>,
    pub phone: Option<String>,
    pub is_active: bool,
}

/// Repository for store operations.
pub struct StoreRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> StoreRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a store. Store names are unique per tenant.
    pub async fn create(&mut self, new_store: &NewStore) -> Result<Store> {
        let sql = format!(
            "INSERT INTO stores (id, tenant_id, name, address, phone, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, 1, $6, $6)
             RETURNING {STORE_COLUMNS}"
        );
        let store = sqlx::query_as::<_, Store>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_store.tenant_id)
            .bind(&new_store.name)
            .bind(&new_store.address)
            .bind(&new_store.phone)
            .bind(Utc::now())
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| conflict_or_db(e, "a store with this name already exists in your tenant"))?;

        Ok(store)
    }

    /// Get a store by ID, regardless of tenant.
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Store>> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE id = $1");
        let store = sqlx::query_as::<_, Store>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(store)
    }

    /// Overwrite a store's details. Returns `None` if the store is gone.
    pub async fn update(&mut self, id: Uuid, changes: &StoreChanges) -> Result<Option<Store>> {
        let sql = format!(
            "UPDATE stores
             SET name = $1, address = $2, phone = $3, is_active = $4, updated_at = $5
             WHERE id = $6
             RETURNING {STORE_COLUMNS}"
        );
        let store = sqlx::query_as::<_, Store>(&sql)
            .bind(&changes.name)
            .bind(&changes.address)
            .bind(&changes.phone)
            .bind(changes.is_active)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| conflict_or_db(e, "a store with this name already exists in your tenant"))?;

        Ok(store)
    }

    /// Clear the active flag. Returns whether a row was updated.
    pub async fn deactivate(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("UPDATE stores SET is_active = 0, updated_at = $1 WHERE id = $2")
            .bind(Utc::now())
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// List all stores of a tenant, by name.
    pub async fn list_by_tenant(&mut self, tenant_id: Uuid) -> Result<Vec<Store>> {
        let sql = format!("SELECT {STORE_COLUMNS} FROM stores WHERE tenant_id = $1 ORDER BY name");
        let stores = sqlx::query_as::<_, Store>(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(stores)
    }

    /// List the stores explicitly assigned to a user, by name.
    pub async fn list_for_user(&mut self, user_id: Uuid) -> Result<Vec<Store>> {
        let stores = sqlx::query_as::<_, Store>(
            "SELECT s.id, s.tenant_id, s.name, s.address, s.phone, s.is_active,
                    s.created_at, s.updated_at
             FROM stores s
             JOIN user_stores us ON us.store_id = s.id
             WHERE us.user_id = $1
             ORDER BY s.name",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(stores)
    }
}
