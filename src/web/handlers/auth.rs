//! Authentication handlers.

use axum::{extract::State, http::StatusCode, Json};
use std::sync::Arc;

use crate::web::dto::{
    AcceptInvitationRequest, AuthResponse, AuthTokensResponse, ChangePasswordRequest,
    ForgotPasswordRequest, LoginRequest, MessageResponse, RefreshTokenRequest, RegisterRequest,
    ResetPasswordRequest, ValidatedJson, VerifyEmailRequest,
};
use crate::web::error::ApiError;
use crate::web::middleware::AuthUser;

use super::AppState;

/// POST /api/v1/auth/register - Create a tenant with its first administrator.
pub async fn register(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RegisterRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let session = state.auth.register(req.into()).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// POST /api/v1/auth/login - User login.
pub async fn login(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<LoginRequest>,
) -> Result<Json<AuthResponse>, ApiError> {
    let session = state.auth.login(&req.email, &req.password).await?;
    Ok(Json(session.into()))
}

/// POST /api/v1/auth/verify-email
pub async fn verify_email(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<VerifyEmailRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.verify_email(&req.token).await?;
    Ok(Json(MessageResponse::new("email verified successfully")))
}

/// POST /api/v1/auth/forgot-password
///
/// Answers the same way whether or not the address is registered.
pub async fn forgot_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ForgotPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.forgot_password(&req.email).await?;
    Ok(Json(MessageResponse::new(
        "if the email exists, a reset link has been sent",
    )))
}

/// POST /api/v1/auth/reset-password
pub async fn reset_password(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<ResetPasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.reset_password(&req.token, req.password).await?;
    Ok(Json(MessageResponse::new("password reset successfully")))
}

/// POST /api/v1/auth/refresh - Rotate a refresh token.
pub async fn refresh(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<AuthTokensResponse>, ApiError> {
    let tokens = state.auth.refresh(&req.refresh_token).await?;
    Ok(Json(tokens.into()))
}

/// POST /api/v1/auth/accept-invitation - Join a tenant through an invitation.
pub async fn accept_invitation(
    State(state): State<Arc<AppState>>,
    ValidatedJson(req): ValidatedJson<AcceptInvitationRequest>,
) -> Result<(StatusCode, Json<AuthResponse>), ApiError> {
    let session = state.auth.accept_invitation(req.into()).await?;
    Ok((StatusCode::CREATED, Json(session.into())))
}

/// POST /api/v1/auth/logout - Revoke a refresh token.
pub async fn logout(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<RefreshTokenRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state.auth.logout(&req.refresh_token).await?;
    tracing::debug!(user_id = %ctx.user_id, "Logout");
    Ok(Json(MessageResponse::new("logged out successfully")))
}

/// PUT /api/v1/auth/change-password
pub async fn change_password(
    State(state): State<Arc<AppState>>,
    AuthUser(ctx): AuthUser,
    ValidatedJson(req): ValidatedJson<ChangePasswordRequest>,
) -> Result<Json<MessageResponse>, ApiError> {
    state
        .auth
        .change_password(ctx.user_id, &req.current_password, req.new_password)
        .await?;
    Ok(Json(MessageResponse::new("password changed successfully")))
}
