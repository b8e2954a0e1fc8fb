//! User management handlers.

use axum::{
    extract::{Path, State},
    Json,
};
use std::sync::Arc;

use crate::admin::UserAdminService;
use crate::web::dto::{
    parse_id, MessageResponse, StoreResponse, UpdateUserRequest, UpdateUserStoresRequest,
    UserDetailResponse, UserResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

/// GET /api/v1/users
pub async fn list_users(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<UserResponse>>, ApiError> {
    let users = UserAdminService::new(&state.db).list(&ctx).await?;
    Ok(Json(users.into_iter().map(Into::into).collect()))
}

/// GET /api/v1/users/:id - User with roles and stores.
pub async fn get_user(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<UserDetailResponse>, ApiError> {
    let id = parse_id(&id, "user")?;
    let detail = UserAdminService::new(&state.db).get(&ctx, id).await?;
    Ok(Json(detail.into()))
}

/// PUT /api/v1/users/:id
pub async fn update_user(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateUserRequest>,
) -> Result<Json<UserResponse>, ApiError> {
    let id = parse_id(&id, "user")?;
    let user = UserAdminService::new(&state.db)
        .update(&ctx, id, &req.into())
        .await?;
    Ok(Json(user.into()))
}

/// DELETE /api/v1/users/:id - Deactivate a user.
pub async fn deactivate_user(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id, "user")?;
    UserAdminService::new(&state.db).deactivate(&ctx, id).await?;
    Ok(Json(MessageResponse::new("user deactivated successfully")))
}

/// PUT /api/v1/users/:id/stores - Replace store assignments.
pub async fn update_user_stores(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateUserStoresRequest>,
) -> Result<Json<Vec<StoreResponse>>, ApiError> {
    let id = parse_id(&id, "user")?;
    let stores = UserAdminService::new(&state.db)
        .set_stores(&ctx, id, &req.store_ids)
        .await?;
    Ok(Json(stores.into_iter().map(Into::into).collect()))
}
