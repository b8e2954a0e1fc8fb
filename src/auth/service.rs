//! Authentication service.
//!
//! Orchestrates registration, login, token refresh, email verification,
//! password reset and change, invitation acceptance, and the caller's
//! profile. Multi-row workflows run in a single transaction.

use std::collections::BTreeMap;
use std::sync::Arc;

use chrono::{Duration, Utc};
use sqlx::{Sqlite, Transaction};
use tracing::{error, info, warn};
use uuid::Uuid;

use super::jwt::TokenIssuer;
use super::notifier::{Notification, Notifier};
use super::password::PasswordHasher;
use super::rbac::{load_store_scope, PermissionSet, StoreScope};
use super::refresh::RefreshTokenManager;
use super::token::{generate_token, hash_token};
use crate::config::Config;
use crate::db::{
    Database, FeatureRepository, InvitationRepository, InvitationStatus, NewOneTimeToken,
    NewRole, NewStore, NewTenant, NewUser, OneTimeToken, OneTimeTokenRepository, Role,
    RoleRepository, Store, StoreRepository, TenantRepository, TokenPurpose, User,
    UserRepository, UserUpdate, ADMINISTRATOR_ROLE,
};
use crate::{Result, TallyError};

/// Lifetime of an email verification token.
pub const VERIFICATION_TTL_HOURS: i64 = 24;
/// Lifetime of a password reset token.
pub const RESET_TTL_HOURS: i64 = 1;
/// Lifetime of an invitation.
pub const INVITATION_TTL_DAYS: i64 = 7;

const INVALID_CREDENTIALS: &str = "invalid email or password";
const ACCOUNT_DEACTIVATED: &str = "account is deactivated";

struct TokenMessages {
    invalid: &'static str,
    used: &'static str,
    expired: &'static str,
}

const VERIFICATION_MESSAGES: TokenMessages = TokenMessages {
    invalid: "invalid or expired verification token",
    used: "verification token already used",
    expired: "verification token has expired",
};

const RESET_MESSAGES: TokenMessages = TokenMessages {
    invalid: "invalid or expired reset token",
    used: "reset token already used",
    expired: "reset token has expired",
};

/// Derive a URL-safe tenant slug: lower-case, spaces to hyphens, and only
/// `[a-z0-9-]` kept.
pub fn slugify(name: &str) -> String {
    name.to_lowercase()
        .replace(' ', "-")
        .chars()
        .filter(|c| c.is_ascii_lowercase() || c.is_ascii_digit() || *c == '-')
        .collect()
}

/// Registration data for a new tenant and its first user.
#[derive(Debug, Clone)]
pub struct RegisterInput {
    pub tenant_name: String,
    pub email: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
    pub store_name: String,
    pub store_address: Option<String>,
}

/// Data supplied by an invitee when accepting.
#[derive(Debug, Clone)]
pub struct AcceptInvitationInput {
    pub token: String,
    pub password: String,
    pub first_name: String,
    pub last_name: String,
}

/// Access and refresh token pair.
#[derive(Debug, Clone)]
pub struct AuthTokens {
    pub access_token: String,
    pub refresh_token: String,
}

/// A user together with a fresh token pair.
#[derive(Debug, Clone)]
pub struct AuthSession {
    pub user: User,
    pub tokens: AuthTokens,
}

/// Aggregated view of the caller: profile, roles, grants and stores.
#[derive(Debug, Clone)]
pub struct Profile {
    pub user: User,
    pub roles: Vec<Role>,
    pub permissions: BTreeMap<String, Vec<String>>,
    pub stores: Vec<Store>,
    pub all_stores_access: bool,
}

/// Authentication service.
#[derive(Clone)]
pub struct AuthService {
    db: Database,
    hasher: PasswordHasher,
    issuer: TokenIssuer,
    refresh: RefreshTokenManager,
    notifier: Arc<dyn Notifier>,
}

impl AuthService {
    /// Create the service from configuration.
    pub fn new(db: Database, config: &Config, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let hasher = PasswordHasher::new(&config.argon2)
            .map_err(|e| TallyError::Config(e.to_string()))?;
        Ok(Self {
            hasher,
            issuer: TokenIssuer::new(&config.jwt.secret, config.jwt.access_ttl_secs),
            refresh: RefreshTokenManager::new(db.clone(), config.jwt.refresh_ttl_secs),
            notifier,
            db,
        })
    }

    /// Access token issuer, shared with the request authenticator.
    pub fn issuer(&self) -> &TokenIssuer {
        &self.issuer
    }

    /// Refresh token manager, shared with the maintenance task.
    pub fn refresh_tokens(&self) -> &RefreshTokenManager {
        &self.refresh
    }

    /// Password hasher.
    pub fn hasher(&self) -> &PasswordHasher {
        &self.hasher
    }

    /// Notification channel.
    pub fn notifier(&self) -> &Arc<dyn Notifier> {
        &self.notifier
    }

    /// Create a tenant, its first user, store and Administrator role.
    pub async fn register(&self, input: RegisterInput) -> Result<AuthSession> {
        let slug = slugify(&input.tenant_name);
        if slug.is_empty() {
            return Err(TallyError::Validation(
                "tenant name must contain letters or digits".to_string(),
            ));
        }

        let password_hash = self.hasher.hash_blocking(input.password).await?;

        let mut tx = self.db.begin().await?;

        let tenant = TenantRepository::new(&mut tx)
            .create(&NewTenant {
                name: input.tenant_name,
                slug,
            })
            .await?;

        let user = UserRepository::new(&mut tx)
            .create(&NewUser::new(
                tenant.id,
                input.email.to_lowercase(),
                password_hash,
                input.first_name,
                input.last_name,
            ))
            .await?;

        let store = StoreRepository::new(&mut tx)
            .create(&NewStore {
                tenant_id: tenant.id,
                name: input.store_name,
                address: input.store_address.filter(|a| !a.is_empty()),
                phone: None,
            })
            .await?;

        let role = RoleRepository::new(&mut tx)
            .create(&NewRole {
                tenant_id: tenant.id,
                name: ADMINISTRATOR_ROLE.to_string(),
                description: Some("Full system access".to_string()),
                is_system_default: true,
            })
            .await?;

        let features = FeatureRepository::new(&mut tx).list_leaves().await?;
        let mut roles = RoleRepository::new(&mut tx);
        for feature in &features {
            roles
                .set_permission(role.id, feature.id, &feature.actions)
                .await?;
        }
        roles.assign_to_user(user.id, role.id).await?;

        tx.commit().await?;

        info!(
            tenant_id = %tenant.id,
            user_id = %user.id,
            store_id = %store.id,
            "Tenant registered"
        );

        self.send_verification(&user).await;

        let tokens = self.issue_tokens(&user).await?;
        Ok(AuthSession { user, tokens })
    }

    /// Check credentials and start a session.
    pub async fn login(&self, email: &str, password: &str) -> Result<AuthSession> {
        let user = {
            let mut conn = self.db.acquire().await?;
            UserRepository::new(&mut conn)
                .get_by_email(&email.to_lowercase())
                .await?
        };

        let Some(user) = user else {
            return Err(TallyError::Auth(INVALID_CREDENTIALS.to_string()));
        };

        if !user.is_active {
            warn!(user_id = %user.id, "Login attempt for deactivated account");
            return Err(TallyError::Auth(ACCOUNT_DEACTIVATED.to_string()));
        }

        if !self
            .hasher
            .verify_blocking(password.to_string(), user.password_hash.clone())
            .await?
        {
            return Err(TallyError::Auth(INVALID_CREDENTIALS.to_string()));
        }

        let tokens = self.issue_tokens(&user).await?;
        info!(user_id = %user.id, tenant_id = %user.tenant_id, "User logged in");
        Ok(AuthSession { user, tokens })
    }

    /// Rotate a refresh token into a new token pair.
    pub async fn refresh(&self, refresh_token: &str) -> Result<AuthTokens> {
        let rotation = self.refresh.rotate(refresh_token).await?;
        let access_token = self.issuer.issue(
            rotation.user.id,
            rotation.user.tenant_id,
            &rotation.user.email,
        )?;
        Ok(AuthTokens {
            access_token,
            refresh_token: rotation.refresh_token,
        })
    }

    /// Revoke one refresh token. Always succeeds for unknown tokens.
    pub async fn logout(&self, refresh_token: &str) -> Result<()> {
        self.refresh.revoke(refresh_token).await
    }

    /// Consume a verification token and mark the email verified.
    pub async fn verify_email(&self, token: &str) -> Result<()> {
        let record = self
            .find_one_time_token(token, TokenPurpose::EmailVerification, &VERIFICATION_MESSAGES)
            .await?;

        let mut tx = self.claim_one_time_token(&record, &VERIFICATION_MESSAGES).await?;
        UserRepository::new(&mut tx)
            .update(record.user_id, &UserUpdate::new().email_verified(true))
            .await?
            .ok_or_else(|| TallyError::Auth(VERIFICATION_MESSAGES.invalid.to_string()))?;
        tx.commit().await?;

        info!(user_id = %record.user_id, "Email verified");
        Ok(())
    }

    /// Start a password reset. Succeeds whether or not the email is known.
    pub async fn forgot_password(&self, email: &str) -> Result<()> {
        let mut conn = self.db.acquire().await?;
        let Some(user) = UserRepository::new(&mut conn)
            .get_by_email(&email.to_lowercase())
            .await?
        else {
            return Ok(());
        };
        drop(conn);

        let token = self
            .create_one_time_token(
                user.id,
                TokenPurpose::PasswordReset,
                Duration::hours(RESET_TTL_HOURS),
            )
            .await?;

        info!(user_id = %user.id, "Password reset requested");
        self.notify(&Notification::PasswordReset {
            email: user.email,
            token,
        });
        Ok(())
    }

    /// Consume a reset token, set the new password and end every session.
    pub async fn reset_password(&self, token: &str, new_password: String) -> Result<()> {
        let record = self
            .find_one_time_token(token, TokenPurpose::PasswordReset, &RESET_MESSAGES)
            .await?;
        let password_hash = self.hasher.hash_blocking(new_password).await?;

        let mut tx = self.claim_one_time_token(&record, &RESET_MESSAGES).await?;
        UserRepository::new(&mut tx)
            .update(record.user_id, &UserUpdate::new().password_hash(password_hash))
            .await?
            .ok_or_else(|| TallyError::Auth(RESET_MESSAGES.invalid.to_string()))?;
        let revoked = self.refresh.revoke_all(&mut tx, record.user_id).await?;
        tx.commit().await?;

        info!(
            user_id = %record.user_id,
            revoked_sessions = revoked,
            "Password reset"
        );
        Ok(())
    }

    /// Change the caller's password after checking the current one.
    ///
    /// Existing sessions are kept.
    pub async fn change_password(
        &self,
        user_id: Uuid,
        current_password: &str,
        new_password: String,
    ) -> Result<()> {
        let user = self.get_user(user_id).await?;

        if !self
            .hasher
            .verify_blocking(current_password.to_string(), user.password_hash)
            .await?
        {
            return Err(TallyError::Auth("current password is incorrect".to_string()));
        }

        let password_hash = self.hasher.hash_blocking(new_password).await?;
        let mut conn = self.db.acquire().await?;
        UserRepository::new(&mut conn)
            .update(user_id, &UserUpdate::new().password_hash(password_hash))
            .await?;

        info!(user_id = %user_id, "Password changed");
        Ok(())
    }

    /// Redeem an invitation: create the user with the invited role and stores.
    pub async fn accept_invitation(&self, input: AcceptInvitationInput) -> Result<AuthSession> {
        let invitation = {
            let mut conn = self.db.acquire().await?;
            InvitationRepository::new(&mut conn)
                .get_by_hash(&hash_token(&input.token))
                .await?
                .ok_or_else(|| TallyError::Auth("invalid invitation token".to_string()))?
        };

        if invitation.status() != Some(InvitationStatus::Pending) {
            return Err(TallyError::Auth("invitation is no longer valid".to_string()));
        }
        if invitation.is_expired_at(Utc::now()) {
            return Err(TallyError::Auth("invitation has expired".to_string()));
        }
        let role_id = invitation
            .role_id
            .ok_or_else(|| TallyError::Auth("invitation is no longer valid".to_string()))?;

        let password_hash = self.hasher.hash_blocking(input.password).await?;

        let mut tx = self.db.begin().await?;
        if !InvitationRepository::new(&mut tx)
            .transition_from_pending(invitation.id, InvitationStatus::Accepted)
            .await?
        {
            return Err(TallyError::Auth("invitation is no longer valid".to_string()));
        }

        let mut users = UserRepository::new(&mut tx);
        let user = users
            .create(
                &NewUser::new(
                    invitation.tenant_id,
                    invitation.email.to_lowercase(),
                    password_hash,
                    input.first_name,
                    input.last_name,
                )
                .verified(),
            )
            .await?;
        for store_id in invitation.store_ids.iter() {
            users
                .assign_store(user.id, *store_id, Some(invitation.invited_by))
                .await?;
        }
        RoleRepository::new(&mut tx)
            .assign_to_user(user.id, role_id)
            .await?;
        tx.commit().await?;

        info!(
            user_id = %user.id,
            tenant_id = %user.tenant_id,
            invitation_id = %invitation.id,
            "Invitation accepted"
        );

        let tokens = self.issue_tokens(&user).await?;
        Ok(AuthSession { user, tokens })
    }

    /// Profile, roles, permission map and accessible stores of a user.
    pub async fn me(&self, user_id: Uuid) -> Result<Profile> {
        let mut conn = self.db.acquire().await?;
        let user = UserRepository::new(&mut conn)
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| TallyError::NotFound("user".to_string()))?;

        let mut roles_repo = RoleRepository::new(&mut conn);
        let roles = roles_repo.list_for_user(user_id).await?;
        let permissions = roles_repo
            .grants_for_user(user_id)
            .await?
            .into_iter()
            .collect::<PermissionSet>()
            .to_map();

        let scope = load_store_scope(&mut conn, user_id).await?;
        let mut stores_repo = StoreRepository::new(&mut conn);
        let stores = match scope {
            StoreScope::All => stores_repo.list_by_tenant(user.tenant_id).await?,
            StoreScope::Only(_) => stores_repo.list_for_user(user_id).await?,
        };

        Ok(Profile {
            user,
            roles,
            permissions,
            stores,
            all_stores_access: scope.is_all(),
        })
    }

    async fn get_user(&self, user_id: Uuid) -> Result<User> {
        let mut conn = self.db.acquire().await?;
        UserRepository::new(&mut conn)
            .get_by_id(user_id)
            .await?
            .ok_or_else(|| TallyError::NotFound("user".to_string()))
    }

    async fn issue_tokens(&self, user: &User) -> Result<AuthTokens> {
        let access_token = self.issuer.issue(user.id, user.tenant_id, &user.email)?;
        let mut conn = self.db.acquire().await?;
        let refresh_token = self.refresh.issue(&mut conn, user.id).await?;
        Ok(AuthTokens {
            access_token,
            refresh_token,
        })
    }

    async fn find_one_time_token(
        &self,
        plain: &str,
        purpose: TokenPurpose,
        messages: &TokenMessages,
    ) -> Result<OneTimeToken> {
        let mut conn = self.db.acquire().await?;
        let record = OneTimeTokenRepository::new(&mut conn)
            .get_by_hash(&hash_token(plain), purpose)
            .await?
            .ok_or_else(|| TallyError::Auth(messages.invalid.to_string()))?;

        if record.is_used {
            return Err(TallyError::Auth(messages.used.to_string()));
        }
        if record.is_expired_at(Utc::now()) {
            return Err(TallyError::Auth(messages.expired.to_string()));
        }
        Ok(record)
    }

    /// Open a transaction that starts by marking the token used.
    async fn claim_one_time_token(
        &self,
        record: &OneTimeToken,
        messages: &TokenMessages,
    ) -> Result<Transaction<'static, Sqlite>> {
        let mut tx = self.db.begin().await?;
        if !OneTimeTokenRepository::new(&mut tx)
            .mark_used(record.id)
            .await?
        {
            return Err(TallyError::Auth(messages.used.to_string()));
        }
        Ok(tx)
    }

    async fn create_one_time_token(
        &self,
        user_id: Uuid,
        purpose: TokenPurpose,
        ttl: Duration,
    ) -> Result<String> {
        let token = generate_token();
        let mut conn = self.db.acquire().await?;
        OneTimeTokenRepository::new(&mut conn)
            .create(&NewOneTimeToken {
                user_id,
                purpose,
                token_hash: token.hash,
                expires_at: Utc::now() + ttl,
            })
            .await?;
        Ok(token.plain)
    }

    async fn send_verification(&self, user: &User) {
        match self
            .create_one_time_token(
                user.id,
                TokenPurpose::EmailVerification,
                Duration::hours(VERIFICATION_TTL_HOURS),
            )
            .await
        {
            Ok(token) => self.notify(&Notification::EmailVerification {
                email: user.email.clone(),
                token,
            }),
            Err(e) => error!(user_id = %user.id, error = %e, "Failed to create email verification"),
        }
    }

    /// Hand a notification to the notifier, logging failures.
    pub fn notify(&self, notification: &Notification) {
        if let Err(e) = self.notifier.deliver(notification) {
            error!(email = notification.email(), error = %e, "Failed to deliver notification");
        }
    }
}

impl std::fmt::Debug for AuthService {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("AuthService")
            .field("issuer", &self.issuer)
            .field("refresh", &self.refresh)
            .finish_non_exhaustive()
    }
}
