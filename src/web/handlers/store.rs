//! Store handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::admin::StoreAdminService;
use crate::web::dto::{
    parse_id, CreateStoreRequest, MessageResponse, StoreResponse, UpdateStoreRequest, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

/// GET /api/v1/stores - Stores within the caller's scope.
pub async fn list_stores(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<StoreResponse>>, ApiError> {
    let stores = StoreAdminService::new(&state.db).list(&ctx).await?;
    Ok(Json(stores.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/stores
pub async fn create_store(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateStoreRequest>,
) -> Result<(StatusCode, Json<StoreResponse>), ApiError> {
    let store = StoreAdminService::new(&state.db)
        .create(&ctx, &req.into())
        .await?;
    Ok((StatusCode::CREATED, Json(store.into())))
}

/// GET /api/v1/stores/:id
pub async fn get_store(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<StoreResponse>, ApiError> {
    let id = parse_id(&id, "store")?;
    let store = StoreAdminService::new(&state.db).get(&ctx, id).await?;
    Ok(Json(store.into()))
}

/// PUT /api/v1/stores/:id
pub async fn update_store(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
    ValidatedJson(req): ValidatedJson<UpdateStoreRequest>,
) -> Result<Json<StoreResponse>, ApiError> {
    let id = parse_id(&id, "store")?;
    let store = StoreAdminService::new(&state.db)
        .update(&ctx, id, &req.into())
        .await?;
    Ok(Json(store.into()))
}

/// DELETE /api/v1/stores/:id - Deactivate a store.
pub async fn deactivate_store(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id, "store")?;
    StoreAdminService::new(&state.db).deactivate(&ctx, id).await?;
    Ok(Json(MessageResponse::new("store deactivated successfully")))
}
