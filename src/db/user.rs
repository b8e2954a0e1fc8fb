//! User model and repository for Tally.

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqliteConnection};
use uuid::Uuid;

use super::conflict_or_db;
use crate::Result;

const USER_COLUMNS: &str = "id, tenant_id, email, password_hash, first_name, last_name, \
                            is_email_verified, is_active, created_at, updated_at";

/// User entity.
#[derive(Debug, Clone, sqlx::FromRow)]
pub struct User {
    /// User ID.
    pub id: Uuid,
    /// Owning tenant.
    pub tenant_id: Uuid,
    /// Email address, lower-cased, globally unique.
    pub email: String,
    /// Argon2id PHC hash string.
    pub password_hash: String,
    /// First name.
    pub first_name: String,
    /// Last name.
    pub last_name: String,
    /// Whether the email address has been verified.
    pub is_email_verified: bool,
    /// Soft-delete flag.
    pub is_active: bool,
    /// Creation timestamp.
    pub created_at: DateTime<Utc>,
    /// Last update timestamp.
    pub updated_at: DateTime<Utc>,
}

/// New user for creation.
#[derive(Debug, Clone)]
pub struct NewUser {
    pub tenant_id: Uuid,
    pub email: String,
    pub password_hash: String,
    pub first_name: String,
    pub last_name: String,
    pub is_email_verified: bool,
}

impl NewUser {
    /// Create a new user with an unverified email address.
    pub fn new(
        tenant_id: Uuid,
        email: impl Into<String>,
        password_hash: impl Into<String>,
        first_name: impl Into<String>,
        last_name: impl Into<String>,
    ) -> Self {
        Self {
            tenant_id,
            email: email.into(),
            password_hash: password_hash.into(),
            first_name: first_name.into(),
            last_name: last_name.into(),
            is_email_verified: false,
        }
    }

    /// Mark the email as already verified (invitation acceptance).
    pub fn verified(mut self) -> Self {
        self.is_email_verified = true;
        self
    }
}

/// Partial update for a user. Only `Some` fields are written.
#[derive(Debug, Clone, Default)]
pub struct UserUpdate {
    pub password_hash: Option<String>,
    pub first_name: Option<String>,
    pub last_name: Option<String>,
    pub is_email_verified: Option<bool>,
    pub is_active: Option<bool>,
}

impl UserUpdate {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn password_hash(mut self, hash: impl Into<String>) -> Self {
        self.password_hash = Some(hash.into());
        self
    }

    pub fn first_name(mut self, name: impl Into<String>) -> Self {
        self.first_name = Some(name.into());
        self
    }

    pub fn last_name(mut self, name: impl Into<String>) -> Self {
        self.last_name = Some(name.into());
        self
    }

    pub fn email_verified(mut self, verified: bool) -> Self {
        self.is_email_verified = Some(verified);
        self
    }

    pub fn is_active(mut self, active: bool) -> Self {
        self.is_active = Some(active);
        self
    }

    pub fn is_empty(&self) -> bool {
        self.password_hash.is_none()
            && self.first_name.is_none()
            && self.last_name.is_none()
            && self.is_email_verified.is_none()
            && self.is_active.is_none()
    }
}

/// Repository for user operations, including user-store assignments.
pub struct UserRepository<'c> {
    conn: &'c mut SqliteConnection,
}

impl<'c> UserRepository<'c> {
    /// Create a new repository instance.
    pub fn new(conn: &'c mut SqliteConnection) -> Self {
        Self { conn }
    }

    /// Create a user. A duplicate email is a conflict.
    pub async fn create(&mut self, new_user: &NewUser) -> Result<User> {
        let now = Utc::now();
        let sql = format!(
            "INSERT INTO users (id, tenant_id, email, password_hash, first_name, last_name,
                                is_email_verified, is_active, created_at, updated_at)
             VALUES ($1, $2, $3, $4, $5, $6, $7, 1, $8, $8)
             RETURNING {USER_COLUMNS}"
        );
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(Uuid::new_v4())
            .bind(new_user.tenant_id)
            .bind(&new_user.email)
            .bind(&new_user.password_hash)
            .bind(&new_user.first_name)
            .bind(&new_user.last_name)
            .bind(new_user.is_email_verified)
            .bind(now)
            .fetch_one(&mut *self.conn)
            .await
            .map_err(|e| conflict_or_db(e, "a user with this email already exists"))?;

        Ok(user)
    }

    /// Get a user by ID.
    pub async fn get_by_id(&mut self, id: Uuid) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE id = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(id)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(user)
    }

    /// Get a user by (already lower-cased) email.
    pub async fn get_by_email(&mut self, email: &str) -> Result<Option<User>> {
        let sql = format!("SELECT {USER_COLUMNS} FROM users WHERE email = $1");
        let user = sqlx::query_as::<_, User>(&sql)
            .bind(email)
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(user)
    }

    /// List the users of a tenant, oldest first.
    pub async fn list_by_tenant(&mut self, tenant_id: Uuid) -> Result<Vec<User>> {
        let sql = format!(
            "SELECT {USER_COLUMNS} FROM users WHERE tenant_id = $1 ORDER BY created_at, email"
        );
        let users = sqlx::query_as::<_, User>(&sql)
            .bind(tenant_id)
            .fetch_all(&mut *self.conn)
            .await?;

        Ok(users)
    }

    /// Apply a partial update. Returns the updated user, or `None` if absent.
    pub async fn update(&mut self, id: Uuid, update: &UserUpdate) -> Result<Option<User>> {
        if update.is_empty() {
            return self.get_by_id(id).await;
        }

        let mut builder: QueryBuilder<Sqlite> = QueryBuilder::new("UPDATE users SET ");
        let mut fields = builder.separated(", ");
        if let Some(hash) = &update.password_hash {
            fields.push("password_hash = ").push_bind_unseparated(hash.clone());
        }
        if let Some(name) = &update.first_name {
            fields.push("first_name = ").push_bind_unseparated(name.clone());
        }
        if let Some(name) = &update.last_name {
            fields.push("last_name = ").push_bind_unseparated(name.clone());
        }
        if let Some(verified) = update.is_email_verified {
            fields.push("is_email_verified = ").push_bind_unseparated(verified);
        }
        if let Some(active) = update.is_active {
            fields.push("is_active = ").push_bind_unseparated(active);
        }
        fields.push("updated_at = ").push_bind_unseparated(Utc::now());

        builder.push(" WHERE id = ").push_bind(id);
        builder.push(" RETURNING ").push(USER_COLUMNS);

        let user = builder
            .build_query_as::<User>()
            .fetch_optional(&mut *self.conn)
            .await?;

        Ok(user)
    }

    /// Store IDs explicitly assigned to a user.
    pub async fn store_ids(&mut self, user_id: Uuid) -> Result<Vec<Uuid>> {
        let ids = sqlx::query_scalar::<_, Uuid>(
            "SELECT store_id FROM user_stores WHERE user_id = $1 ORDER BY created_at",
        )
        .bind(user_id)
        .fetch_all(&mut *self.conn)
        .await?;

        Ok(ids)
    }

    /// Assign a store to a user. Assigning twice is a no-op.
    pub async fn assign_store(
        &mut self,
        user_id: Uuid,
        store_id: Uuid,
        assigned_by: Option<Uuid>,
    ) -> Result<()> {
        sqlx::query(
            "INSERT OR IGNORE INTO user_stores (user_id, store_id, assigned_by, created_at)
             VALUES ($1, $2, $3, $4)",
        )
        .bind(user_id)
        .bind(store_id)
        .bind(assigned_by)
        .bind(Utc::now())
        .execute(&mut *self.conn)
        .await?;

        Ok(())
    }

    /// Remove every store assignment of a user.
    pub async fn clear_stores(&mut self, user_id: Uuid) -> Result<u64> {
        let result = sqlx::query("DELETE FROM user_stores WHERE user_id = $1")
            .bind(user_id)
            .execute(&mut *self.conn)
            .await?;

        Ok(result.rows_affected())
    }
}
