//! Authentication module for Tally.
//!
//! This module provides password hashing, opaque and JWT tokens, refresh
//! rotation, the per-request authorization context, and the service that
//! ties them together.

mod jwt;
mod notifier;
mod password;
mod rbac;
mod refresh;
mod service;
mod token;

pub use jwt::{Claims, TokenIssuer};
pub use notifier::{LogNotifier, MemoryNotifier, Notification, Notifier};
pub use password::{PasswordError, PasswordHasher};
pub use rbac::{load_store_scope, AuthContext, PermissionSet, StoreScope};
pub use refresh::{RefreshTokenManager, Rotation};
pub use service::{
    slugify, AcceptInvitationInput, AuthService, AuthSession, AuthTokens, Profile, RegisterInput,
    INVITATION_TTL_DAYS, RESET_TTL_HOURS, VERIFICATION_TTL_HOURS,
};
pub use token::{generate_token, hash_token, GeneratedToken, TOKEN_BYTES};
