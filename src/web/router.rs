//! Router configuration for Web API.

use axum::{
    middleware,
    routing::{delete, get, post, put},
    Router,
};
use std::sync::Arc;
use tower::ServiceBuilder;
use tower_http::trace::TraceLayer;

use super::handlers::{
    accept_invitation, cancel_invitation, change_password, create_invitation, create_role,
    create_store, deactivate_store, deactivate_user, delete_role, forgot_password, get_role,
    get_store, get_user, health_check, list_features, list_invitations, list_roles, list_stores,
    list_users, login, logout, me, refresh, register, reset_password, update_role,
    update_role_permissions, update_store, update_user, update_user_stores, verify_email,
    AppState,
};
use super::middleware::{auth_rate_limit, create_cors_layer, security_headers};

/// Create the main API router.
///
/// Public auth routes sit behind the per-IP rate limiter; every other
/// `/api/v1` route authenticates through the `AuthUser` extractor.
pub fn create_router(app_state: Arc<AppState>, cors_origins: &[String]) -> Router {
    let limiter = app_state.rate_limit.clone();

    // Auth routes (no authentication required)
    let auth_public_routes = Router::new()
        .route("/register", post(register))
        .route("/login", post(login))
        .route("/verify-email", post(verify_email))
        .route("/forgot-password", post(forgot_password))
        .route("/reset-password", post(reset_password))
        .route("/refresh", post(refresh))
        .route("/accept-invitation", post(accept_invitation))
        .layer(middleware::from_fn(move |req, next| {
            auth_rate_limit(limiter.clone(), req, next)
        }));

    // Auth routes (authentication required)
    let auth_protected_routes = Router::new()
        .route("/logout", post(logout))
        .route("/change-password", put(change_password));

    let auth_routes = Router::new()
        .merge(auth_public_routes)
        .merge(auth_protected_routes);

    let api_routes = Router::new()
        .nest("/auth", auth_routes)
        .route("/me", get(me))
        .route("/features", get(list_features))
        .route("/stores", get(list_stores).post(create_store))
        .route(
            "/stores/:id",
            get(get_store).put(update_store).delete(deactivate_store),
        )
        .route("/roles", get(list_roles).post(create_role))
        .route(
            "/roles/:id",
            get(get_role).put(update_role).delete(delete_role),
        )
        .route("/roles/:id/permissions", put(update_role_permissions))
        .route("/users", get(list_users))
        .route(
            "/users/:id",
            get(get_user).put(update_user).delete(deactivate_user),
        )
        .route("/users/:id/stores", put(update_user_stores))
        .route("/invitations", get(list_invitations).post(create_invitation))
        .route("/invitations/:id", delete(cancel_invitation));

    Router::new()
        .nest("/api/v1", api_routes)
        .merge(create_health_router())
        .layer(
            ServiceBuilder::new()
                .layer(TraceLayer::new_for_http())
                .layer(create_cors_layer(cors_origins))
                .layer(middleware::from_fn(security_headers)),
        )
        .with_state(app_state)
}

/// Create a health check router.
pub fn create_health_router<S>() -> Router<S>
where
    S: Clone + Send + Sync + 'static,
{
    Router::new().route("/health", get(health_check))
}
