//! Tenant repository.

use chrono::{DateTime, Utc};
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::conflict_or_db;
use crate::Result;

/// Tenant entity: the root of multi-tenant isolation.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Tenant {
    pub id: Uuid,
    pub name: String,
    pub slug: String,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New tenant for creation.
pub struct NewTenant {
    pub name: String,
    pub slug: String,
}

/// Repository for tenant operations.
pub struct TenantRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> TenantRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a tenant. A duplicate slug is a conflict.
    pub async fn create(&mut self, new_tenant: &NewTenant) -> Result<Tenant> {
        let now = Utc::now();
        let tenant = sqlx::query_as::<_, Tenant>(
            "INSERT INTO tenants (id, name, slug, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, 1, $4, $4)
             RETURNING id, name, slug, is_active, created_at, updated_at",
        )
        .bind(Uuid::new_v4())
        .bind(&new_tenant.name)
        .bind(&new_tenant.slug)
        .bind(now)
        .fetch_one(&mut *self.conn)
        .await
        .map_err(|e| conflict_or_db(e, "a tenant with a similar name already exists"))?;

        Ok(tenant)
    }

    /// Get a tenant by ID.
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Tenant>> {
        let tenant = sqlx::query_as::<_, Tenant>(
            "SELECT id, name, slug, is_active, created_at, updated_at FROM tenants WHERE id = $1",
        )
        .bind(id)
        .fetch_optional(&mut *self.conn)
        .await?;

        Ok(tenant)
    }
}
