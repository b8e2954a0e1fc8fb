//! Database schema and migrations for Tally.
//!
//! This module contains all database migrations that will be applied
//! sequentially when the database is first opened or upgraded.
//! Identifiers are UUIDs stored as 16-byte blobs, timestamps are UTC
//! RFC 3339 text written by the application.

/// Database migrations.
///
/// Each migration is a SQL script that will be executed in order.
/// The schema_version table tracks which migrations have been applied.
pub const MIGRATIONS: &[&str] = &[
    // v1: tenants and users
    r#"
CREATE TABLE tenants (
    id          BLOB PRIMARY KEY,
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE TABLE users (
    id                  BLOB PRIMARY KEY,
    tenant_id           BLOB NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    email               TEXT NOT NULL UNIQUE,    -- stored lower-cased
    password_hash       TEXT NOT NULL,           -- Argon2id PHC string
    first_name          TEXT NOT NULL,
    last_name           TEXT NOT NULL,
    is_email_verified   INTEGER NOT NULL DEFAULT 0,
    is_active           INTEGER NOT NULL DEFAULT 1,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL
);

CREATE INDEX idx_users_tenant_id ON users(tenant_id);
"#,
    // v2: stores
    r#"
CREATE TABLE stores (
    id          BLOB PRIMARY KEY,
    tenant_id   BLOB NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name        TEXT NOT NULL,
    address     TEXT,
    phone       TEXT,
    is_active   INTEGER NOT NULL DEFAULT 1,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL,
    UNIQUE(tenant_id, name)
);

CREATE INDEX idx_stores_tenant_id ON stores(tenant_id);
"#,
    // v3: feature catalog, roles and assignments
    r#"
CREATE TABLE features (
    id          BLOB PRIMARY KEY,
    parent_id   BLOB REFERENCES features(id),
    name        TEXT NOT NULL,
    slug        TEXT NOT NULL UNIQUE,
    module      TEXT NOT NULL,
    actions     TEXT NOT NULL,           -- JSON array of action names
    sort_order  INTEGER NOT NULL DEFAULT 0
);

CREATE TABLE roles (
    id                  BLOB PRIMARY KEY,
    tenant_id           BLOB NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    name                TEXT NOT NULL,
    description         TEXT,
    is_system_default   INTEGER NOT NULL DEFAULT 0,
    created_at          TEXT NOT NULL,
    updated_at          TEXT NOT NULL,
    UNIQUE(tenant_id, name)
);

CREATE INDEX idx_roles_tenant_id ON roles(tenant_id);

CREATE TABLE role_permissions (
    id          BLOB PRIMARY KEY,
    role_id     BLOB NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    feature_id  BLOB NOT NULL REFERENCES features(id),
    actions     TEXT NOT NULL,           -- JSON array, subset of features.actions
    UNIQUE(role_id, feature_id)
);

CREATE TABLE user_roles (
    user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    role_id     BLOB NOT NULL REFERENCES roles(id) ON DELETE CASCADE,
    created_at  TEXT NOT NULL,
    PRIMARY KEY (user_id, role_id)
);

CREATE INDEX idx_user_roles_role_id ON user_roles(role_id);

CREATE TABLE user_stores (
    user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    store_id    BLOB NOT NULL REFERENCES stores(id) ON DELETE CASCADE,
    assigned_by BLOB REFERENCES users(id),
    created_at  TEXT NOT NULL,
    PRIMARY KEY (user_id, store_id)
);
"#,
    // v4: refresh tokens
    r#"
CREATE TABLE refresh_tokens (
    id          BLOB PRIMARY KEY,
    user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    token_hash  TEXT NOT NULL UNIQUE,    -- SHA-256 hex of the opaque token
    expires_at  TEXT NOT NULL,
    revoked     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_refresh_tokens_user_id ON refresh_tokens(user_id);
CREATE INDEX idx_refresh_tokens_expires_at ON refresh_tokens(expires_at);
"#,
    // v5: single-use tokens (email verification, password reset)
    r#"
CREATE TABLE one_time_tokens (
    id          BLOB PRIMARY KEY,
    user_id     BLOB NOT NULL REFERENCES users(id) ON DELETE CASCADE,
    purpose     TEXT NOT NULL,           -- 'email_verification' or 'password_reset'
    token_hash  TEXT NOT NULL UNIQUE,
    expires_at  TEXT NOT NULL,
    is_used     INTEGER NOT NULL DEFAULT 0,
    created_at  TEXT NOT NULL
);

CREATE INDEX idx_one_time_tokens_user_id ON one_time_tokens(user_id);
"#,
    // v6: invitations
    r#"
CREATE TABLE invitations (
    id          BLOB PRIMARY KEY,
    tenant_id   BLOB NOT NULL REFERENCES tenants(id) ON DELETE CASCADE,
    invited_by  BLOB NOT NULL REFERENCES users(id),
    email       TEXT NOT NULL,
    role_id     BLOB REFERENCES roles(id) ON DELETE SET NULL,  -- kept for history
    store_ids   TEXT NOT NULL,           -- JSON array of store ids
    token_hash  TEXT NOT NULL UNIQUE,
    status      TEXT NOT NULL DEFAULT 'pending',  -- 'pending', 'accepted', 'cancelled'
    expires_at  TEXT NOT NULL,
    created_at  TEXT NOT NULL,
    updated_at  TEXT NOT NULL
);

CREATE INDEX idx_invitations_tenant_id ON invitations(tenant_id);
"#,
];

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_migrations_not_empty() {
        assert!(!MIGRATIONS.is_empty());
    }

    #[test]
    fn test_first_migration_contains_users_table() {
        let first = MIGRATIONS[0];
        assert!(first.contains("CREATE TABLE tenants"));
        assert!(first.contains("CREATE TABLE users"));
        assert!(first.contains("password_hash"));
        assert!(first.contains("email               TEXT NOT NULL UNIQUE"));
    }

    #[test]
    fn test_migrations_are_valid_sql() {
        for migration in MIGRATIONS {
            assert!(!migration.trim().is_empty());
            assert!(migration.contains("CREATE TABLE") || migration.contains("ALTER TABLE"));
        }
    }

    #[test]
    fn test_token_tables_store_hashes_only() {
        let tokens: Vec<&str> = MIGRATIONS
            .iter()
            .copied()
            .filter(|m| m.contains("token_hash"))
            .collect();
        assert_eq!(tokens.len(), 3);
        for migration in tokens {
            assert!(!migration.contains(" token "));
        }
    }
}
