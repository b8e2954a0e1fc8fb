//! Request DTOs for Web API.
//!
//! Every request defaults missing fields, so an absent field fails
//! validation with a field message instead of a body parse error.

use serde::Deserialize;
use uuid::Uuid;
use validator::Validate;

use crate::admin::{InvitationInput, PermissionGrant, RoleInput, StoreInput, StorePatch, UserPatch};
use crate::auth::{AcceptInvitationInput, RegisterInput};

use super::validation::not_blank;

const REQUIRED: &str = "this field is required";

/// Tenant registration request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RegisterRequest {
    #[validate(length(min = 2, max = 100))]
    pub tenant_name: String,
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
    #[validate(length(min = 1, max = 100))]
    pub store_name: String,
    #[validate(length(max = 500))]
    pub store_address: Option<String>,
}

impl From<RegisterRequest> for RegisterInput {
    fn from(req: RegisterRequest) -> Self {
        RegisterInput {
            tenant_name: req.tenant_name,
            email: req.email,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
            store_name: req.store_name,
            store_address: req.store_address,
        }
    }
}

/// Login request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct LoginRequest {
    #[validate(email)]
    pub email: String,
    #[validate(length(min = 1, message = "this field is required"))]
    pub password: String,
}

/// Email verification request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct VerifyEmailRequest {
    #[validate(custom(function = "not_blank"))]
    pub token: String,
}

/// Forgot-password request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ForgotPasswordRequest {
    #[validate(email)]
    pub email: String,
}

/// Password reset request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ResetPasswordRequest {
    #[validate(custom(function = "not_blank"))]
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
}

/// Refresh or logout request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RefreshTokenRequest {
    #[validate(custom(function = "not_blank"))]
    pub refresh_token: String,
}

/// Change-password request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct ChangePasswordRequest {
    #[validate(length(min = 1, message = "this field is required"))]
    pub current_password: String,
    #[validate(length(min = 8, max = 128))]
    pub new_password: String,
}

/// Invitation acceptance request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct AcceptInvitationRequest {
    #[validate(custom(function = "not_blank"))]
    pub token: String,
    #[validate(length(min = 8, max = 128))]
    pub password: String,
    #[validate(length(min = 1, max = 100))]
    pub first_name: String,
    #[validate(length(min = 1, max = 100))]
    pub last_name: String,
}

impl From<AcceptInvitationRequest> for AcceptInvitationInput {
    fn from(req: AcceptInvitationRequest) -> Self {
        AcceptInvitationInput {
            token: req.token,
            password: req.password,
            first_name: req.first_name,
            last_name: req.last_name,
        }
    }
}

/// Store creation request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateStoreRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
}

impl From<CreateStoreRequest> for StoreInput {
    fn from(req: CreateStoreRequest) -> Self {
        StoreInput {
            name: req.name,
            address: req.address,
            phone: req.phone,
        }
    }
}

/// Store update request. Replaces name, address and phone; `is_active`
/// is left unchanged when omitted.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateStoreRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub address: Option<String>,
    #[validate(length(max = 50))]
    pub phone: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateStoreRequest> for StorePatch {
    fn from(req: UpdateStoreRequest) -> Self {
        StorePatch {
            name: req.name,
            address: req.address,
            phone: req.phone,
            is_active: req.is_active,
        }
    }
}

/// Role creation or update request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct RoleRequest {
    #[validate(length(min = 1, max = 100))]
    pub name: String,
    #[validate(length(max = 500))]
    pub description: Option<String>,
}

impl From<RoleRequest> for RoleInput {
    fn from(req: RoleRequest) -> Self {
        RoleInput {
            name: req.name,
            description: req.description,
        }
    }
}

/// One feature's actions in a permission update.
#[derive(Debug, Default, Clone, Deserialize)]
#[serde(default)]
pub struct PermissionEntry {
    pub feature_id: Uuid,
    pub actions: Vec<String>,
}

/// Replacement permission set for a role.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdatePermissionsRequest {
    pub permissions: Vec<PermissionEntry>,
}

impl UpdatePermissionsRequest {
    pub fn grants(self) -> Vec<PermissionGrant> {
        self.permissions
            .into_iter()
            .map(|p| PermissionGrant {
                feature_id: p.feature_id,
                actions: p.actions,
            })
            .collect()
    }
}

/// User update request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateUserRequest {
    #[validate(length(min = 1, max = 100))]
    pub first_name: Option<String>,
    #[validate(length(min = 1, max = 100))]
    pub last_name: Option<String>,
    pub is_active: Option<bool>,
}

impl From<UpdateUserRequest> for UserPatch {
    fn from(req: UpdateUserRequest) -> Self {
        UserPatch {
            first_name: req.first_name,
            last_name: req.last_name,
            is_active: req.is_active,
        }
    }
}

/// Store assignment replacement request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct UpdateUserStoresRequest {
    pub store_ids: Vec<Uuid>,
}

/// Invitation creation request.
#[derive(Debug, Default, Deserialize, Validate)]
#[serde(default)]
pub struct CreateInvitationRequest {
    #[validate(email, length(max = 255))]
    pub email: String,
    #[validate(custom(function = "non_nil", message = "this field is required"))]
    pub role_id: Uuid,
    pub store_ids: Vec<Uuid>,
}

impl From<CreateInvitationRequest> for InvitationInput {
    fn from(req: CreateInvitationRequest) -> Self {
        InvitationInput {
            email: req.email,
            role_id: req.role_id,
            store_ids: req.store_ids,
        }
    }
}

fn non_nil(id: &Uuid) -> Result<(), validator::ValidationError> {
    if id.is_nil() {
        return Err(validator::ValidationError::new("required").with_message(REQUIRED.into()));
    }
    Ok(())
}
