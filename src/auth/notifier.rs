//! Delivery of out-of-band tokens (verification, reset, invitation).
//!
//! Transport is pluggable behind [`Notifier`]. Delivery is best effort:
//! callers log failures and carry on.

use std::sync::Mutex;

use crate::{Result, TallyError};

/// A message carrying a one-time token to an email address.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Notification {
    /// Sent after registration.
    EmailVerification { email: String, token: String },
    /// Sent on forgot-password for a known address.
    PasswordReset { email: String, token: String },
    /// Sent when an administrator invites someone to a tenant.
    Invitation {
        email: String,
        token: String,
        tenant_name: String,
    },
}

impl Notification {
    /// Recipient address.
    pub fn email(&self) -> &str {
        match self {
            Notification::EmailVerification { email, .. }
            | Notification::PasswordReset { email, .. }
            | Notification::Invitation { email, .. } => email,
        }
    }

    /// Plaintext token carried by the message.
    pub fn token(&self) -> &str {
        match self {
            Notification::EmailVerification { token, .. }
            | Notification::PasswordReset { token, .. }
            | Notification::Invitation { token, .. } => token,
        }
    }

    /// Front-end link the recipient follows.
    pub fn link(&self, app_url: &str) -> String {
        let base = app_url.trim_end_matches('/');
        match self {
            Notification::EmailVerification { token, .. } => {
                format!("{base}/verify-email?token={token}")
            }
            Notification::PasswordReset { token, .. } => {
                format!("{base}/reset-password?token={token}")
            }
            Notification::Invitation { token, .. } => format!("{base}/invitation/{token}"),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Notification::EmailVerification { .. } => "email_verification",
            Notification::PasswordReset { .. } => "password_reset",
            Notification::Invitation { .. } => "invitation",
        }
    }
}

/// Delivers notifications to users.
pub trait Notifier: Send + Sync {
    /// Deliver one notification.
    fn deliver(&self, notification: &Notification) -> Result<()>;
}

/// Development notifier that writes delivery links to the log.
#[derive(Debug, Clone)]
pub struct LogNotifier {
    app_url: String,
}

impl LogNotifier {
    pub fn new(app_url: impl Into<String>) -> Self {
        Self {
            app_url: app_url.into(),
        }
    }
}

impl Notifier for LogNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        tracing::info!(
            kind = notification.kind(),
            email = notification.email(),
            "Notification queued"
        );
        tracing::debug!(link = %notification.link(&self.app_url), "Notification link");
        Ok(())
    }
}

/// Notifier that keeps every delivery in memory.
#[derive(Debug, Default)]
pub struct MemoryNotifier {
    sent: Mutex<Vec<Notification>>,
}

impl MemoryNotifier {
    pub fn new() -> Self {
        Self::default()
    }

    /// All notifications delivered so far, oldest first.
    pub fn sent(&self) -> Vec<Notification> {
        self.sent
            .lock()
            .map(|sent| sent.clone())
            .unwrap_or_default()
    }

    /// Token of the most recent verification sent to `email`.
    pub fn last_verification_token(&self, email: &str) -> Option<String> {
        self.last_matching(email, |n| matches!(n, Notification::EmailVerification { .. }))
    }

    /// Token of the most recent password reset sent to `email`.
    pub fn last_reset_token(&self, email: &str) -> Option<String> {
        self.last_matching(email, |n| matches!(n, Notification::PasswordReset { .. }))
    }

    /// Token of the most recent invitation sent to `email`.
    pub fn last_invitation_token(&self, email: &str) -> Option<String> {
        self.last_matching(email, |n| matches!(n, Notification::Invitation { .. }))
    }

    fn last_matching(&self, email: &str, pred: impl Fn(&Notification) -> bool) -> Option<String> {
        self.sent()
            .into_iter()
            .rev()
            .find(|n| n.email() == email && pred(n))
            .map(|n| n.token().to_string())
    }
}

impl Notifier for MemoryNotifier {
    fn deliver(&self, notification: &Notification) -> Result<()> {
        self.sent
            .lock()
            .map_err(|_| TallyError::Internal("notifier lock poisoned".to_string()))?
            .push(notification.clone());
        Ok(())
    }
}
