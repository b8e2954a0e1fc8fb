//! Per-request authorization context.
//!
//! Loaded once per authenticated request from the caller's roles and store
//! assignments; every check afterwards is a pure function over it.

use std::collections::{BTreeMap, BTreeSet, HashSet};

use sqlx::SqliteConnection;
use uuid::Uuid;

use super::jwt::Claims;
use crate::db::{RoleRepository, UserRepository};
use crate::{Result, TallyError};

/// Feature slug to the set of actions granted on it.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct PermissionSet {
    grants: BTreeMap<String, BTreeSet<String>>,
}

impl PermissionSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a grant. Grants for the same slug from several roles are merged.
    pub fn grant<I, S>(&mut self, slug: impl Into<String>, actions: I)
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.grants
            .entry(slug.into())
            .or_default()
            .extend(actions.into_iter().map(Into::into));
    }

    /// Whether `action` is granted on `slug`. Unknown slugs are denied.
    pub fn has(&self, slug: &str, action: &str) -> bool {
        self.grants
            .get(slug)
            .is_some_and(|actions| actions.contains(action))
    }

    pub fn is_empty(&self) -> bool {
        self.grants.values().all(BTreeSet::is_empty)
    }

    /// The grants as slug to sorted action list.
    pub fn to_map(&self) -> BTreeMap<String, Vec<String>> {
        self.grants
            .iter()
            .map(|(slug, actions)| (slug.clone(), actions.iter().cloned().collect()))
            .collect()
    }
}

impl<S: Into<String>> FromIterator<(S, Vec<String>)> for PermissionSet {
    fn from_iter<T: IntoIterator<Item = (S, Vec<String>)>>(iter: T) -> Self {
        let mut set = PermissionSet::new();
        for (slug, actions) in iter {
            set.grant(slug, actions);
        }
        set
    }
}

/// Which stores a caller may act on.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreScope {
    /// Holder of the system-default role: every store of the tenant.
    All,
    /// Exactly the assigned stores, possibly none.
    Only(HashSet<Uuid>),
}

impl StoreScope {
    pub fn contains(&self, store_id: Uuid) -> bool {
        match self {
            StoreScope::All => true,
            StoreScope::Only(ids) => ids.contains(&store_id),
        }
    }

    pub fn is_all(&self) -> bool {
        matches!(self, StoreScope::All)
    }
}

/// Identity and authorization data of the authenticated caller.
#[derive(Debug, Clone)]
pub struct AuthContext {
    pub user_id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub permissions: PermissionSet,
    pub stores: StoreScope,
}

impl AuthContext {
    /// Load permissions and store scope for verified claims.
    pub async fn load(conn: &mut SqliteConnection, claims: &Claims) -> Result<Self> {
        let permissions = RoleRepository::new(conn)
            .grants_for_user(claims.user_id)
            .await?
            .into_iter()
            .collect::<PermissionSet>();
        let stores = load_store_scope(conn, claims.user_id).await?;

        Ok(Self {
            user_id: claims.user_id,
            tenant_id: claims.tenant_id,
            email: claims.email.clone(),
            permissions,
            stores,
        })
    }

    pub fn has_permission(&self, slug: &str, action: &str) -> bool {
        self.permissions.has(slug, action)
    }

    pub fn can_access_store(&self, store_id: Uuid) -> bool {
        self.stores.contains(store_id)
    }

    /// Fail with 403 unless `action` is granted on `slug`.
    pub fn require_permission(&self, slug: &str, action: &str) -> Result<()> {
        if self.has_permission(slug, action) {
            Ok(())
        } else {
            tracing::debug!(user_id = %self.user_id, slug, action, "Permission denied");
            Err(TallyError::Permission("insufficient permissions".to_string()))
        }
    }

    /// Fail with 403 unless the store is within scope.
    pub fn require_store(&self, store_id: Uuid) -> Result<()> {
        if self.can_access_store(store_id) {
            Ok(())
        } else {
            Err(TallyError::Permission(
                "you do not have access to this store".to_string(),
            ))
        }
    }
}

/// Store scope of a user: all stores for system-default role holders,
/// otherwise the explicit assignments.
pub async fn load_store_scope(conn: &mut SqliteConnection, user_id: Uuid) -> Result<StoreScope> {
    if RoleRepository::new(conn)
        .user_has_system_default(user_id)
        .await?
    {
        return Ok(StoreScope::All);
    }

    let ids = UserRepository::new(conn).store_ids(user_id).await?;
    Ok(StoreScope::Only(ids.into_iter().collect()))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn context(permissions: PermissionSet, stores: StoreScope) -> AuthContext {
        AuthContext {
            user_id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "c@x.com".to_string(),
            permissions,
            stores,
        }
    }

    #[test]
    fn test_permission_set_merges_roles() {
        let set: PermissionSet = vec![
            ("master-data.product", vec!["read".to_string()]),
            ("master-data.product", vec!["edit".to_string()]),
        ]
        .into_iter()
        .collect();

        assert!(set.has("master-data.product", "read"));
        assert!(set.has("master-data.product", "edit"));
        assert!(!set.has("master-data.product", "delete"));
        assert_eq!(
            set.to_map()["master-data.product"],
            vec!["edit".to_string(), "read".to_string()]
        );
    }

    #[test]
    fn test_fail_closed() {
        let ctx = context(PermissionSet::new(), StoreScope::Only(HashSet::new()));
        assert!(!ctx.has_permission("settings.role", "read"));
        assert!(!ctx.has_permission("", ""));
        assert!(!ctx.can_access_store(Uuid::new_v4()));

        let err = ctx.require_permission("settings.role", "read").unwrap_err();
        assert!(matches!(err, TallyError::Permission(_)));
        assert_eq!(err.message(), "insufficient permissions");
    }

    #[test]
    fn test_store_scope() {
        let store = Uuid::new_v4();
        let all = context(PermissionSet::new(), StoreScope::All);
        assert!(all.can_access_store(store));
        assert!(all.require_store(Uuid::new_v4()).is_ok());

        let only = context(
            PermissionSet::new(),
            StoreScope::Only([store].into_iter().collect()),
        );
        assert!(only.can_access_store(store));
        assert!(!only.can_access_store(Uuid::new_v4()));
        assert!(only.require_store(Uuid::new_v4()).is_err());
    }
}
