//! Tenant administration for Tally.
//!
//! This module provides the administrative services behind the settings
//! screens:
//! - Feature catalog as a tree (any authenticated user)
//! - Roles and their permissions (`settings.role`)
//! - Stores (`settings.store`)
//! - Users and their store assignments (`settings.user`)
//! - Invitations (`settings.invitation`)
//!
//! Every service takes the caller's [`AuthContext`]. Rows owned by another
//! tenant are reported as not found.

mod feature;
mod invitation;
mod role;
mod store;
mod user;

pub use feature::{FeatureAdminService, FeatureNode, FeatureTree};
pub use invitation::{InvitationAdminService, InvitationInput};
pub use role::{PermissionGrant, RoleAdminService, RoleDetail, RoleInput};
pub use store::{StoreAdminService, StoreInput, StorePatch};
pub use user::{UserAdminService, UserDetail, UserPatch};

use uuid::Uuid;

use crate::auth::AuthContext;
use crate::{Result, TallyError};

/// Feature slug gating store administration.
pub const STORE_FEATURE: &str = "settings.store";
/// Feature slug gating role administration.
pub const ROLE_FEATURE: &str = "settings.role";
/// Feature slug gating user administration.
pub const USER_FEATURE: &str = "settings.user";
/// Feature slug gating invitations.
pub const INVITATION_FEATURE: &str = "settings.invitation";

pub const READ: &str = "read";
pub const CREATE: &str = "create";
pub const EDIT: &str = "edit";
pub const DELETE: &str = "delete";

/// Keep a row only if it exists and belongs to the caller's tenant.
fn owned_by_tenant<T>(
    row: Option<T>,
    tenant_of: impl Fn(&T) -> Uuid,
    ctx: &AuthContext,
    entity: &str,
) -> Result<T> {
    match row {
        Some(row) if tenant_of(&row) == ctx.tenant_id => Ok(row),
        _ => Err(TallyError::NotFound(entity.to_string())),
    }
}

#[cfg(test)]
pub(crate) mod testing {
    use std::sync::Arc;

    use crate::auth::{AuthContext, AuthService, Claims, MemoryNotifier, RegisterInput};
    use crate::config::Config;
    use crate::db::{Database, User};

    pub struct Fixture {
        pub db: Database,
        pub auth: AuthService,
        pub notifier: Arc<MemoryNotifier>,
        pub admin: User,
        pub ctx: AuthContext,
    }

    pub fn test_config() -> Config {
        let mut config = Config::default();
        config.jwt.secret = "test-secret".to_string();
        config.argon2.memory_kib = 1024;
        config.argon2.iterations = 1;
        config.argon2.parallelism = 1;
        config
    }

    /// One registered tenant with its administrator's context.
    pub async fn fixture() -> Fixture {
        let db = Database::open_in_memory().await.unwrap();
        let notifier = Arc::new(MemoryNotifier::new());
        let auth = AuthService::new(db.clone(), &test_config(), notifier.clone()).unwrap();
        let admin = register(&auth, "Acme", "owner@acme.test").await;
        let ctx = context(&db, &admin).await;
        Fixture {
            db,
            auth,
            notifier,
            admin,
            ctx,
        }
    }

    pub async fn register(auth: &AuthService, tenant: &str, email: &str) -> User {
        auth.register(RegisterInput {
            tenant_name: tenant.to_string(),
            email: email.to_string(),
            password: "password123".to_string(),
            first_name: "Test".to_string(),
            last_name: "Owner".to_string(),
            store_name: "Main".to_string(),
            store_address: None,
        })
        .await
        .unwrap()
        .user
    }

    pub async fn context(db: &Database, user: &User) -> AuthContext {
        let claims = Claims {
            user_id: user.id,
            tenant_id: user.tenant_id,
            email: user.email.clone(),
            exp: 0,
            iat: 0,
            nbf: 0,
            sub: user.id.to_string(),
        };
        let mut conn = db.acquire().await.unwrap();
        AuthContext::load(&mut conn, &claims).await.unwrap()
    }
}
