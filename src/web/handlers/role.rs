//! Role handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::admin::RoleAdminService;
use crate::web::dto::{
    parse_id, MessageResponse, PermissionResponse, RoleDetailResponse, RoleRequest, RoleResponse,
    UpdatePermissionsRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

/// GET /api/v1/roles
pub async fn list_roles(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<RoleResponse>>, ApiError> {
    let roles = RoleAdminService::new(&state.db).list(&ctx).await?;
    Ok(Json(roles.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/roles
pub async fn create_role(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<RoleRequest>,
) -> Result<(StatusCode, Json<RoleResponse>), ApiError> {
    let role = RoleAdminService::new(&state.db)
        .create(&ctx, &req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(role.into())))
}

/// GET /api/v1/roles/:id - Role with its permissions.
pub async fn get_role(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<RoleDetailResponse>, ApiError> {
    let id = parse_id(&id, "role")?;
    let detail = RoleAdminService::new(&state.db).get(&ctx, id).await?;
    Ok(Json(detail.into()))
}

/// PUT /api/v1/roles/:id
pub async fn update_role(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<RoleRequest>,
) -> Result<Json<RoleResponse>, ApiError> {
    let id = parse_id(&id, "role")?;
    let role = RoleAdminService::new(&state.db)
        .update(&ctx, id, &req.into())
        .await?;
    Ok(Json(role.into()))
}

/// DELETE /api/v1/roles/:id
pub async fn delete_role(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id, "role")?;
    RoleAdminService::new(&state.db).delete(&ctx, id).await?;
    Ok(Json(MessageResponse::new("role deleted successfully")))
}

/// PUT /api/v1/roles/:id/permissions - Replace the role's permission set.
pub async fn update_role_permissions(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdatePermissionsRequest>,
) -> Result<Json<Vec<PermissionResponse>>, ApiError> {
    let id = parse_id(&id, "role")?;
    let permissions = RoleAdminService::new(&state.db)
        .set_permissions(&ctx, id, &req.grants())
        .await?;
    Ok(Json(permissions.into_iter().map(Into::into).collect()))
}
