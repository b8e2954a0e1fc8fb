//! Invitation handlers.

use axum::{
    extract::{Path, State},
    http::StatusCode,
    Json,
};
use std::sync::Arc;

use crate::admin::InvitationAdminService;
use crate::web::dto::{
    parse_id, CreateInvitationRequest, InvitationResponse, MessageResponse, ValidatedJson,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

fn service(state: &AppState) -> InvitationAdminService<'_> {
    InvitationAdminService::new(&state.db, state.auth.notifier().as_ref())
}

/// GET /api/v1/invitations
pub async fn list_invitations(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
) -> Result<Json<Vec<InvitationResponse>>, ApiError> {
    let invitations = service(&state).list(&ctx).await?;
    Ok(Json(invitations.into_iter().map(Into::into).collect()))
}

/// POST /api/v1/invitations - Invite an email address into the tenant.
pub async fn create_invitation(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<CreateInvitationRequest>,
) -> Result<(StatusCode, Json<InvitationResponse>), ApiError> {
    let invitation = service(&state).create(&ctx, &req.into()).await?;
    Ok((StatusCode::CREATED, Json(invitation.into())))
}

/// DELETE /api/v1/invitations/:id - Cancel a pending invitation.
pub async fn cancel_invitation(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    Path(id): Path<String>,
) -> Result<Json<MessageResponse>, ApiError> {
    let id = parse_id(&id, "invitation")?;
    service(&state).cancel(&ctx, id).await?;
    Ok(Json(MessageResponse::new("invitation cancelled successfully")))
}
