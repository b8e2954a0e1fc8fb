//! Database module for Tally.
//!
//! This module provides SQLite connectivity through a sqlx pool, the
//! embedded migrations, and one repository per table. Repositories borrow
//! a `&mut SqliteConnection` so the same code runs on a pooled connection
//! or inside a transaction.

mod feature;
mod invitation;
mod one_time_token;
mod refresh_token;
mod role;
mod schema;
mod store;
mod tenant;
mod user;

pub use feature::{feature_id, Feature, FeatureRepository, FeatureSeed, FEATURE_CATALOG};
pub use invitation::{Invitation, InvitationRepository, InvitationStatus, NewInvitation};
pub use one_time_token::{NewOneTimeToken, OneTimeToken, OneTimeTokenRepository, TokenPurpose};
pub use refresh_token::{NewRefreshToken, RefreshToken, RefreshTokenRepository};
pub use role::{
    NewRole, Role, RolePermission, RolePermissionDetail, RoleRepository, ADMINISTRATOR_ROLE,
};
pub use schema::MIGRATIONS;
pub use store::{NewStore, Store, StoreChanges, StoreRepository};
pub use tenant::{NewTenant, Tenant, TenantRepository};
pub use user::{NewUser, User, UserRepository, UserUpdate};

use std::path::Path;
use std::str::FromStr;
use std::time::Duration;

use sqlx::pool::PoolConnection;
use sqlx::sqlite::{SqliteConnectOptions, SqliteJournalMode, SqlitePoolOptions};
use sqlx::{Sqlite, SqliteConnection, SqlitePool, Transaction};
use tracing::{debug, info};

use crate::{Result, TallyError};

/// Connection pool type used throughout the crate.
pub type DbPool = SqlitePool;

/// Returns true when the error is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Map a sqlx error to [`TallyError::Conflict`] with `message` when it is a
/// unique-constraint violation, or to a database error otherwise.
pub(crate) fn conflict_or_db(err: sqlx::Error, message: &str) -> TallyError {
    if is_unique_violation(&err) {
        TallyError::Conflict(message.to_string())
    } else {
        TallyError::Database(err.to_string())
    }
}

/// Database wrapper owning the SQLite pool.
#[derive(Clone)]
pub struct Database {
    pool: DbPool,
}

impl Database {
    /// Open a database at the specified path.
    ///
    /// The file and its parent directories are created if missing.
    /// Migrations are applied automatically.
    pub async fn open(path: impl AsRef<Path>, max_connections: u32) -> Result<Self> {
        let path = path.as_ref();
        info!("Opening database at {:?}", path);

        if let Some(parent) = path.parent() {
            if !parent.as_os_str().is_empty() && !parent.exists() {
                std::fs::create_dir_all(parent)?;
            }
        }

        let options = SqliteConnectOptions::new()
            .filename(path)
            .create_if_missing(true)
            .foreign_keys(true)
            .journal_mode(SqliteJournalMode::Wal)
            .busy_timeout(Duration::from_secs(5));

        let pool = SqlitePoolOptions::new()
            .max_connections(max_connections.max(1))
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Open an in-memory database for testing.
    ///
    /// A single connection is pinned for the lifetime of the pool, since
    /// every new SQLite memory connection would see an empty database.
    pub async fn open_in_memory() -> Result<Self> {
        debug!("Opening in-memory database");
        let options = SqliteConnectOptions::from_str("sqlite::memory:")?.foreign_keys(true);

        let pool = SqlitePoolOptions::new()
            .max_connections(1)
            .min_connections(1)
            .idle_timeout(None)
            .max_lifetime(None)
            .connect_with(options)
            .await?;

        let db = Self { pool };
        db.migrate().await?;

        Ok(db)
    }

    /// Get a reference to the underlying pool.
    pub fn pool(&self) -> &DbPool {
        &self.pool
    }

    /// Acquire a pooled connection.
    pub async fn acquire(&self) -> Result<PoolConnection<Sqlite>> {
        Ok(self.pool.acquire().await?)
    }

    /// Begin a new transaction. It rolls back when dropped without commit.
    pub async fn begin(&self) -> Result<Transaction<'static, Sqlite>> {
        Ok(self.pool.begin().await?)
    }

    /// Get the current schema version.
    pub async fn schema_version(&self) -> Result<i64> {
        let mut conn = self.acquire().await?;
        Self::schema_version_on(&mut conn).await
    }

    async fn schema_version_on(conn: &mut SqliteConnection) -> Result<i64> {
        let table_exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name='schema_version')",
        )
        .fetch_one(&mut *conn)
        .await?;

        if !table_exists {
            return Ok(0);
        }

        let version: i64 =
            sqlx::query_scalar("SELECT COALESCE(MAX(version), 0) FROM schema_version")
                .fetch_one(&mut *conn)
                .await?;

        Ok(version)
    }

    /// Apply pending migrations and seed the feature catalog.
    pub async fn migrate(&self) -> Result<()> {
        let mut conn = self.acquire().await?;
        let current_version = Self::schema_version_on(&mut conn).await?;

        if current_version as usize >= MIGRATIONS.len() {
            debug!("Database is up to date (version {})", current_version);
        } else {
            info!(
                "Migrating database from version {} to {}",
                current_version,
                MIGRATIONS.len()
            );

            sqlx::query(
                "CREATE TABLE IF NOT EXISTS schema_version (
                    version     INTEGER PRIMARY KEY,
                    applied_at  TEXT NOT NULL DEFAULT (datetime('now'))
                )",
            )
            .execute(&mut *conn)
            .await?;

            for (i, migration) in MIGRATIONS.iter().enumerate().skip(current_version as usize) {
                let version = (i + 1) as i64;
                info!("Applying migration v{}", version);

                let mut tx = sqlx::Connection::begin(&mut *conn).await?;
                sqlx::raw_sql(migration).execute(&mut *tx).await?;
                sqlx::query("INSERT INTO schema_version (version) VALUES ($1)")
                    .bind(version)
                    .execute(&mut *tx)
                    .await?;
                tx.commit().await?;

                debug!("Migration v{} applied successfully", version);
            }

            info!(
                "Database migration complete (now at version {})",
                MIGRATIONS.len()
            );
        }

        let seeded = FeatureRepository::new(&mut conn).seed(FEATURE_CATALOG).await?;
        if seeded > 0 {
            info!(count = seeded, "Seeded feature catalog");
        }

        Ok(())
    }

    /// Check if a table exists.
    pub async fn table_exists(&self, table_name: &str) -> Result<bool> {
        let exists: bool = sqlx::query_scalar(
            "SELECT EXISTS(SELECT 1 FROM sqlite_master WHERE type='table' AND name=$1)",
        )
        .bind(table_name)
        .fetch_one(&self.pool)
        .await?;
        Ok(exists)
    }
}

impl std::fmt::Debug for Database {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Database").finish()
    }
}
