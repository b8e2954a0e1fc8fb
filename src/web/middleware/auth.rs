//! Bearer token authentication.

use std::sync::Arc;

use axum::{
    async_trait,
    extract::{FromRef, FromRequestParts},
    http::{header::AUTHORIZATION, request::Parts},
};

use crate::auth::AuthContext;
use crate::web::error::ApiError;
use crate::web::handlers::AppState;

/// Extractor for authenticated callers.
///
/// Verifies the access token and loads the caller's permissions and store
/// scope. The token alone is trusted; the user row is not re-checked.
#[derive(Debug, Clone)]
pub struct AuthUser(pub AuthContext);

/// Pull the token out of an `Authorization: Bearer <token>` header.
/// The scheme is matched case-insensitively.
pub fn bearer_token(parts: &Parts) -> Result<&str, ApiError> {
    let header = parts
        .headers
        .get(AUTHORIZATION)
        .ok_or_else(|| ApiError::unauthorized("missing authorization header"))?;
    let value = header
        .to_str()
        .map_err(|_| ApiError::unauthorized("invalid authorization header format"))?;

    match value.split_once(' ') {
        Some((scheme, token)) if scheme.eq_ignore_ascii_case("bearer") && !token.trim().is_empty() => {
            Ok(token.trim())
        }
        _ => Err(ApiError::unauthorized("invalid authorization header format")),
    }
}

#[async_trait]
impl<S> FromRequestParts<S> for AuthUser
where
    Arc<AppState>: FromRef<S>,
    S: Send + Sync,
{
    type Rejection = ApiError;

    async fn from_request_parts(parts: &mut Parts, state: &S) -> Result<Self, Self::Rejection> {
        let app = Arc::<AppState>::from_ref(state);
        let token = bearer_token(parts)?;
        let claims = app.auth.issuer().verify(token)?;

        let mut conn = app.db.acquire().await?;
        let ctx = AuthContext::load(&mut conn, &claims).await?;
        Ok(AuthUser(ctx))
    }
}
