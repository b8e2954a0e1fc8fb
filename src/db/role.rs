//! Roles, role permissions and user-role assignments.

use chrono::{DateTime, Utc};
use sqlx::types::Json;
use sqlx::SqliteConnection;
use uuid::Uuid;

use super::conflict_or_db;
use crate::Result;

/// Name of the system-default role created for every tenant.
pub const ADMINISTRATOR_ROLE: &str = "Administrator";

const ROLE_COLUMNS: &str =
    "id, tenant_id, name, description, is_system_default, created_at, updated_at";

const ROLE_DUPLICATE: &str = "a role with this name already exists";

/// Role entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct Role {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    /// The tenant's Administrator role: full access, cannot be renamed or deleted.
    pub is_system_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// New role for creation.
#[derive(Debug, Clone)]
pub struct NewRole {
    pub tenant_id: Uuid,
    pub name: String,
    pub description: Option<String>,
    pub is_system_default: bool,
}

/// A permission row: actions granted to a role on one feature.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RolePermission {
    pub id: Uuid,
    pub role_id: Uuid,
    pub feature_id: Uuid,
    pub actions: Json<Vec<String>>,
}

/// A permission row joined with its feature.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct RolePermissionDetail {
    pub id: Uuid,
    pub feature_id: Uuid,
    pub feature_slug: String,
    pub feature_name: String,
    pub feature_module: String,
    pub actions: Json<Vec<String>>,
}

/// Repository for role operations.
pub struct RoleRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> RoleRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a role. Names are unique per tenant.
    pub async fn create(&mut self, new_role: &NewRole) -> Result<Role> {
        let sql = format!(
            "INSERT INTO roles (id, tenant_id, name, description, is_system_default, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $6)
             RETURNING {ROLE_COLUMNS}"
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_role.tenant_id)
            .bind(&new_role.name)
            .bind(&new_role.description)
            .bind(new_role.is_system_default)
            .bind(Utc::now())
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| conflict_or_db(e, ROLE_DUPLICATE))?;

        Ok(role)
    }

    /// Get a role by ID, regardless of tenant.
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<Role>> {
        let sql = format!("SELECT {ROLE_COLUMNS} FROM roles WHERE id = $1");
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(role)
    }

    /// List the roles of a tenant, system-default first.
    pub async fn list_by_tenant(&mut self, tenant_id: Uuid) -> Result<Vec<Role>> {
        let sql = format!(
            "SELECT {ROLE_COLUMNS} FROM roles WHERE tenant_id = $1
             ORDER BY is_system_default DESC, name"
        );
        let roles = sqlx::query_as::<_, Role>(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(roles)
    }

    /// Rename a role and replace its description.
    pub async fn update(
        &mut self,
        id: Uuid,
        name: &str,
        description: Option<&str>,
    ) -> Result<Option<Role>> {
        let sql = format!(
            "UPDATE roles SET name = $1, description = $2, updated_at = $3
             WHERE id = $4
             RETURNING {ROLE_COLUMNS}"
        );
        let role = sqlx::query_as::<_, Role>(&sql)
            .bind(name)
            .bind(description)
            .bind(Utc::now())
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await
            .map_err(|e| conflict_or_db(e, ROLE_DUPLICATE))?;

        Ok(role)
    }

    /// Delete a role. Its permissions and assignments cascade.
    pub async fn delete(&mut self, id: Uuid) -> Result<bool> {
        let result = sqlx::query("DELETE FROM roles WHERE id = $1")
            .bind(id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    /// Permissions of a role with their feature details.
    pub async fn permissions(&mut self, role_id: Uuid) -> Result<Vec<RolePermissionDetail>> {
        let perms = sqlx::query_as::<_, RolePermissionDetail>(
            "SELECT rp.id, rp.feature_id, f.slug AS feature_slug, f.name AS feature_name,
                    f.module AS feature_module, rp.actions
             FROM role_permissions rp
             JOIN features f ON f.id = rp.feature_id
             WHERE rp.role_id = $1
             ORDER BY f.module, f.sort_order",
        )
        .bind(role_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(perms)
    }

    /// Grant `actions` on a feature to a role, replacing any previous grant.
    pub async fn set_permission(
        &mut self,
        role_id: Uuid,
        feature_id: Uuid,
        actions: &[String],
    ) -> Result<RolePermission> {
        let perm = sqlx::query_as::<_, RolePermission>(
            "INSERT INTO role_permissions (id, role_id, feature_id, actions)
             VALUES ($1, $2, $3, $4)
             ON CONFLICT (role_id, feature_id) DO UPDATE SET actions = excluded.actions
             RETURNING id, role_id, feature_id, actions",
        )
        .bind(Uuid::new_v4())
        .bind(role_id)
        .bind(feature_id)
        .bind(Json(actions.to_vec()))
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(perm)
    }

    /// Remove every permission of a role.
    pub async fn clear_permissions(&mut self, role_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM role_permissions WHERE role_id = $1")
            .bind(role_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }

    /// Assign a role to a user. Assigning twice is a no-op.
    pub async fn assign_to_user(&mut self, user_id: Uuid, role_id: Uuid) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_roles (user_id, role_id, created_at) VALUES ($1, $2, $3)",
        )
        .bind(user_id)
        .bind(role_id)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Roles held by a user.
    pub async fn list_for_user(&mut self, user_id: Uuid) -> Result<Vec<Role>> {
        let roles = sqlx::query_as::<_, Role>(
            "SELECT r.id, r.tenant_id, r.name, r.description, r.is_system_default,
                    r.created_at, r.updated_at
             FROM roles r
             JOIN user_roles ur ON ur.role_id = r.id
             WHERE ur.user_id = $1
             ORDER BY r.is_system_default DESC, r.name",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(roles)
    }

    /// Whether the user holds their tenant's system-default role.
    pub async fn user_has_system_default(&mut self, user_id: Uuid) -> Result<bool> {
        let has: bool = sqlx::query_scalar(
            "SELECT EXISTS(
                 SELECT 1 FROM user_roles ur
                 JOIN roles r ON r.id = ur.role_id
                 WHERE ur.user_id = $1 AND r.is_system_default = 1
             )",
        )
        .bind(user_id)
        .fetch_one(&mut *self.conn)
        .await?;

        Ok(has)
    }

    /// (feature slug, granted actions) for every permission row reachable
    /// from the user's roles. A slug may appear once per role.
    pub async fn grants_for_user(&mut self, user_id: Uuid) -> Result<Vec<(String, Vec<String>)>> {
        let rows: Vec<(String, Json<Vec<String>>)> = sqlx::query_as(
            "SELECT f.slug, rp.actions
             FROM user_roles ur
             JOIN role_permissions rp ON rp.role_id = ur.role_id
             JOIN features f ON f.id = rp.feature_id
             WHERE ur.user_id = $1",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(rows
            .into_iter()
            .map(|(slug, actions)| (slug, actions.0))
            .collect())
    }
}
