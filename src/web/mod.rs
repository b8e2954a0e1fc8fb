//! HTTP API for Tally.
//!
//! Versioned JSON endpoints under `/api/v1` covering authentication,
//! the caller's profile and tenant administration, plus `/health`.

pub mod dto;
pub mod error;
pub mod handlers;
pub mod middleware;
pub mod router;
pub mod server;

pub use error::ApiError;
pub use handlers::AppState;
pub use router::create_router;
pub use server::WebServer;
