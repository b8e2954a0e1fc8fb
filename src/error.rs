//! Error types for Tally.

use thiserror::Error;

/// Common error type for Tally.
#[derive(Error, Debug)]
pub enum TallyError {
    /// Database error.
    ///
    /// Errors from sqlx are converted into this variant automatically.
    /// Unique-constraint violations are mapped to [`TallyError::Conflict`]
    /// by the repositories before they get here.
    #[error("database error: {0}")]
    Database(String),

    /// I/O error.
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    /// Authentication failure (bad credentials, bad or revoked token).
    #[error("authentication error: {0}")]
    Auth(String),

    /// Authenticated but not allowed.
    #[error("permission denied: {0}")]
    Permission(String),

    /// Validation error for user input.
    #[error("validation error: {0}")]
    Validation(String),

    /// Resource not found, including resources owned by another tenant.
    #[error("{0} not found")]
    NotFound(String),

    /// Uniqueness violation.
    #[error("conflict: {0}")]
    Conflict(String),

    /// Unexpected failure (hashing, signing, task join).
    #[error("internal error: {0}")]
    Internal(String),

    /// Configuration error.
    #[error("configuration error: {0}")]
    Config(String),
}

impl TallyError {
    /// The message carried by the error, without the category prefix.
    pub fn message(&self) -> String {
        match self {
            TallyError::Database(msg)
            | TallyError::Auth(msg)
            | TallyError::Permission(msg)
            | TallyError::Validation(msg)
            | TallyError::NotFound(msg)
            | TallyError::Conflict(msg)
            | TallyError::Internal(msg)
            | TallyError::Config(msg) => msg.clone(),
            TallyError::Io(e) => e.to_string(),
        }
    }
}

impl From<sqlx::Error> for TallyError {
    fn from(e: sqlx::Error) -> Self {
        TallyError::Database(e.to_string())
    }
}

/// Result type alias for Tally operations.
pub type Result<T> = std::result::Result<T, TallyError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_auth_error_display() {
        let err = TallyError::Auth("invalid email or password".to_string());
        assert_eq!(
            err.to_string(),
            "authentication error: invalid email or password"
        );
    }

    #[test]
    fn test_permission_error_display() {
        let err = TallyError::Permission("insufficient permissions".to_string());
        assert_eq!(err.to_string(), "permission denied: insufficient permissions");
    }

    #[test]
    fn test_not_found_error_display() {
        let err = TallyError::NotFound("role".to_string());
        assert_eq!(err.to_string(), "role not found");
    }

    #[test]
    fn test_conflict_error_display() {
        let err = TallyError::Conflict("a user with this email already exists".to_string());
        assert_eq!(
            err.to_string(),
            "conflict: a user with this email already exists"
        );
    }

    #[test]
    fn test_message_strips_prefix() {
        let err = TallyError::Auth("refresh token has expired".to_string());
        assert_eq!(err.message(), "refresh token has expired");
    }

    #[test]
    fn test_io_error_conversion() {
        let io_err = std::io::Error::new(std::io::ErrorKind::NotFound, "file not found");
        let err: TallyError = io_err.into();
        assert!(matches!(err, TallyError::Io(_)));
        assert!(err.to_string().contains("file not found"));
    }

    #[test]
    fn test_sqlx_error_conversion() {
        let err: TallyError = sqlx::Error::RowNotFound.into();
        assert!(matches!(err, TallyError::Database(_)));
    }

    #[test]
    fn test_result_alias() {
        fn sample_ok() -> Result<i32> {
            Ok(42)
        }

        fn sample_err() -> Result<i32> {
            Err(TallyError::Auth("test".to_string()))
        }

        assert_eq!(sample_ok().unwrap(), 42);
        assert!(sample_err().is_err());
    }
}
