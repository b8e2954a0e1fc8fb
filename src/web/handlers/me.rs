//! Current user handler.

use axum::{extract::State, Json};
use std::sync::Arc;

use crate::web::dto::MeResponse;
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

/// GET /api/v1/me - Profile, roles, effective permissions and stores.
pub async fn me(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<MeResponse>, ApiError> {
    let profile = state.auth.me(ctx.user_id).await?;
    Ok(Json(profile.into()))
}
