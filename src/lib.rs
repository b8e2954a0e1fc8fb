//! Tally - multi-tenant point-of-sale back office.
//!
//! This crate holds the identity and access core: tenant registration,
//! sessions with rotating refresh tokens, email verification, password
//! reset, invitations, role-based access control with store scoping, and
//! the HTTP API that exposes them.

pub mod admin;
pub mod auth;
pub mod config;
pub mod db;
pub mod error;
pub mod logging;
pub mod web;

pub use auth::{AuthContext, AuthService, LogNotifier, MemoryNotifier, Notifier};
pub use config::Config;
pub use db::Database;
pub use error::{Result, TallyError};
pub use web::{create_router, AppState, WebServer};
