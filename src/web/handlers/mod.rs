//! API handlers for the Tally HTTP surface.

pub mod auth;
pub mod feature;
pub mod health;
pub mod invitation;
pub mod me;
pub mod role;
pub mod store;
pub mod user;

pub use auth::*;
pub use feature::*;
pub use health::*;
pub use invitation::*;
pub use me::*;
pub use role::*;
pub use store::*;
pub use user::*;

use crate::auth::AuthService;
use crate::db::Database;
use crate::web::middleware::RateLimitState;

/// Application state shared across handlers.
#[derive(Clone)]
pub struct AppState {
    /// Connection pool.
    pub db: Database,
    /// Authentication service; also verifies access tokens.
    pub auth: AuthService,
    /// Per-IP limiter for the public auth endpoints.
    pub rate_limit: RateLimitState,
}

impl AppState {
    pub fn new(db: Database, auth: AuthService, rate_limit: RateLimitState) -> Self {
        Self {
            db,
            auth,
            rate_limit,
        }
    }
}
