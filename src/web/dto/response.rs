//! Response DTOs for Web API.

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use uuid::Uuid;

use crate::admin::{FeatureNode, FeatureTree, RoleDetail, UserDetail};
use crate::auth::{AuthSession, AuthTokens, Profile};
use crate::db::{Invitation, Role, RolePermissionDetail, Store, User};

// ============================================================================
// Generic Responses
// ============================================================================

/// Message-only response.
#[derive(Debug, Serialize)]
pub struct MessageResponse {
    pub message: String,
}

impl MessageResponse {
    pub fn new(message: impl Into<String>) -> Self {
        Self {
            message: message.into(),
        }
    }
}

/// Health check response.
#[derive(Debug, Serialize)]
pub struct HealthResponse {
    pub status: &'static str,
}

// ============================================================================
// Auth DTOs
// ============================================================================

/// User information in responses. Never carries the password hash.
#[derive(Debug, Serialize)]
pub struct UserResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub email: String,
    pub first_name: String,
    pub last_name: String,
    pub is_email_verified: bool,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<User> for UserResponse {
    fn from(user: User) -> Self {
        Self {
            id: user.id,
            tenant_id: user.tenant_id,
            email: user.email,
            first_name: user.first_name,
            last_name: user.last_name,
            is_email_verified: user.is_email_verified,
            is_active: user.is_active,
            created_at: user.created_at,
            updated_at: user.updated_at,
        }
    }
}

/// Access and refresh token pair.
#[derive(Debug, Serialize)]
pub struct AuthTokensResponse {
    /// Access token (JWT).
    pub access_token: String,
    /// Opaque refresh token.
    pub refresh_token: String,
}

impl From<AuthTokens> for AuthTokensResponse {
    fn from(tokens: AuthTokens) -> Self {
        Self {
            access_token: tokens.access_token,
            refresh_token: tokens.refresh_token,
        }
    }
}

/// Register, login and invitation acceptance response.
#[derive(Debug, Serialize)]
pub struct AuthResponse {
    pub user: UserResponse,
    pub tokens: AuthTokensResponse,
}

impl From<AuthSession> for AuthResponse {
    fn from(session: AuthSession) -> Self {
        Self {
            user: session.user.into(),
            tokens: session.tokens.into(),
        }
    }
}

/// Current user response (for /api/v1/me).
#[derive(Debug, Serialize)]
pub struct MeResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub roles: Vec<RoleResponse>,
    /// Feature slug to granted actions.
    pub permissions: BTreeMap<String, Vec<String>>,
    pub stores: Vec<StoreResponse>,
    /// True when the user holds a role that is not store-scoped.
    pub all_stores_access: bool,
}

impl From<Profile> for MeResponse {
    fn from(profile: Profile) -> Self {
        Self {
            user: profile.user.into(),
            roles: profile.roles.into_iter().map(Into::into).collect(),
            permissions: profile.permissions,
            stores: profile.stores.into_iter().map(Into::into).collect(),
            all_stores_access: profile.all_stores_access,
        }
    }
}

// ============================================================================
// Store DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct StoreResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub address: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub phone: Option<String>,
    pub is_active: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Store> for StoreResponse {
    fn from(store: Store) -> Self {
        Self {
            id: store.id,
            tenant_id: store.tenant_id,
            name: store.name,
            address: store.address,
            phone: store.phone,
            is_active: store.is_active,
            created_at: store.created_at,
            updated_at: store.updated_at,
        }
    }
}

// ============================================================================
// Role DTOs
// ============================================================================

#[derive(Debug, Serialize)]
pub struct RoleResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,
    pub is_system_default: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Role> for RoleResponse {
    fn from(role: Role) -> Self {
        Self {
            id: role.id,
            tenant_id: role.tenant_id,
            name: role.name,
            description: role.description,
            is_system_default: role.is_system_default,
            created_at: role.created_at,
            updated_at: role.updated_at,
        }
    }
}

/// One feature's grant on a role.
#[derive(Debug, Serialize)]
pub struct PermissionResponse {
    pub id: Uuid,
    pub feature_id: Uuid,
    pub feature_slug: String,
    pub feature_name: String,
    pub feature_module: String,
    pub actions: Vec<String>,
}

impl From<RolePermissionDetail> for PermissionResponse {
    fn from(p: RolePermissionDetail) -> Self {
        Self {
            id: p.id,
            feature_id: p.feature_id,
            feature_slug: p.feature_slug,
            feature_name: p.feature_name,
            feature_module: p.feature_module,
            actions: p.actions.0,
        }
    }
}

/// A role with its permissions.
#[derive(Debug, Serialize)]
pub struct RoleDetailResponse {
    #[serde(flatten)]
    pub role: RoleResponse,
    pub permissions: Vec<PermissionResponse>,
}

impl From<RoleDetail> for RoleDetailResponse {
    fn from(detail: RoleDetail) -> Self {
        Self {
            role: detail.role.into(),
            permissions: detail.permissions.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Feature DTOs
// ============================================================================

/// A catalog feature with its children nested.
#[derive(Debug, Serialize)]
pub struct FeatureResponse {
    pub id: Uuid,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub parent_id: Option<Uuid>,
    pub name: String,
    pub slug: String,
    pub module: String,
    pub actions: Vec<String>,
    pub sort_order: i32,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub children: Vec<FeatureResponse>,
}

impl FeatureResponse {
    fn from_node(tree: &FeatureTree, node: &FeatureNode) -> Self {
        let feature = &node.feature;
        Self {
            id: feature.id,
            parent_id: feature.parent_id,
            name: feature.name.clone(),
            slug: feature.slug.clone(),
            module: feature.module.clone(),
            actions: feature.actions.0.clone(),
            sort_order: feature.sort_order,
            children: tree
                .children(node)
                .map(|child| Self::from_node(tree, child))
                .collect(),
        }
    }

    /// Render the tree from its roots down.
    pub fn from_tree(tree: &FeatureTree) -> Vec<Self> {
        tree.roots().map(|root| Self::from_node(tree, root)).collect()
    }
}

// ============================================================================
// User DTOs
// ============================================================================

/// A user with roles and explicitly assigned stores.
#[derive(Debug, Serialize)]
pub struct UserDetailResponse {
    #[serde(flatten)]
    pub user: UserResponse,
    pub roles: Vec<RoleResponse>,
    pub stores: Vec<StoreResponse>,
}

impl From<UserDetail> for UserDetailResponse {
    fn from(detail: UserDetail) -> Self {
        Self {
            user: detail.user.into(),
            roles: detail.roles.into_iter().map(Into::into).collect(),
            stores: detail.stores.into_iter().map(Into::into).collect(),
        }
    }
}

// ============================================================================
// Invitation DTOs
// ============================================================================

/// Invitation without its token digest.
#[derive(Debug, Serialize)]
pub struct InvitationResponse {
    pub id: Uuid,
    pub tenant_id: Uuid,
    pub invited_by: Uuid,
    pub email: String,
    pub role_id: Option<Uuid>,
    pub store_ids: Vec<Uuid>,
    pub status: String,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl From<Invitation> for InvitationResponse {
    fn from(invitation: Invitation) -> Self {
        Self {
            id: invitation.id,
            tenant_id: invitation.tenant_id,
            invited_by: invitation.invited_by,
            email: invitation.email,
            role_id: invitation.role_id,
            store_ids: invitation.store_ids.0,
            status: invitation.status,
            expires_at: invitation.expires_at,
            created_at: invitation.created_at,
            updated_at: invitation.updated_at,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::db::{feature_id, Feature, FEATURE_CATALOG};
    use sqlx::types::Json;

    fn sample_user() -> User {
        let now = Utc::now();
        User {
            id: Uuid::new_v4(),
            tenant_id: Uuid::new_v4(),
            email: "a@acme.test".to_string(),
            password_hash: "$argon2id$secret".to_string(),
            first_name: "Ada".to_string(),
            last_name: "Lovelace".to_string(),
            is_email_verified: false,
            is_active: true,
            created_at: now,
            updated_at: now,
        }
    }

    #[test]
    fn test_user_response_hides_password_hash() {
        let json = serde_json::to_value(UserResponse::from(sample_user())).unwrap();
        assert!(json.get("password_hash").is_none());
        assert_eq!(json["email"], "a@acme.test");
    }

    #[test]
    fn test_me_response_flattens_user() {
        let profile = Profile {
            user: sample_user(),
            roles: vec![],
            permissions: BTreeMap::from([(
                "settings.store".to_string(),
                vec!["read".to_string()],
            )]),
            stores: vec![],
            all_stores_access: true,
        };
        let json = serde_json::to_value(MeResponse::from(profile)).unwrap();
        assert_eq!(json["first_name"], "Ada");
        assert_eq!(json["permissions"]["settings.store"][0], "read");
        assert_eq!(json["all_stores_access"], true);
    }

    #[test]
    fn test_feature_tree_nests_children() {
        let features: Vec<Feature> = FEATURE_CATALOG
            .iter()
            .map(|seed| Feature {
                id: seed.id(),
                parent_id: seed.parent_seq.map(feature_id),
                name: seed.name.to_string(),
                slug: seed.slug.to_string(),
                module: seed.module.to_string(),
                actions: Json(seed.actions.iter().map(|a| a.to_string()).collect()),
                sort_order: seed.sort_order,
            })
            .collect();
        let tree = FeatureTree::build(features);

        let json = serde_json::to_value(FeatureResponse::from_tree(&tree)).unwrap();
        let roots = json.as_array().unwrap();
        assert!(roots.iter().all(|r| r.get("parent_id").is_none()));
        assert!(roots.iter().all(|r| !r["children"].as_array().unwrap().is_empty()));
        let leaf = &roots[0]["children"][0];
        assert!(leaf.get("children").is_none());
    }
}
