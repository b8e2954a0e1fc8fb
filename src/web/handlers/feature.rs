//! Feature catalog handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::admin::FeatureAdminService;
use crate::web::dto::FeatureResponse;
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

/// GET /api/v1/features - The catalog as a tree. Any authenticated user.
pub async fn list_features(
    State(state): State<Arc<AppState>>,
    AuthUser(_): AuthUser,
) -> Result<Json<Vec<FeatureResponse>>, ApiError> {
    let tree = FeatureAdminService::new(&state.db).tree().await?;
    Ok(Json(FeatureResponse::from_tree(&tree)))
}
