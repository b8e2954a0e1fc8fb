//! Configuration module for Tally.

use serde::Deserialize;
use std::path::Path;

use crate::{Result, TallyError};

/// HTTP server configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct ServerConfig {
    /// Host address to bind.
    #[serde(default = "default_host")]
    pub host: String,
    /// Port number to listen on.
    #[serde(default = "default_port")]
    pub port: u16,
    /// CORS allowed origins. Empty means permissive development mode.
    #[serde(default)]
    pub cors_origins: Vec<String>,
    /// Public URL of the front-end, used to build links in notifications.
    #[serde(default = "default_app_url")]
    pub app_url: String,
}

fn default_host() -> String {
    "0.0.0.0".to_string()
}

fn default_port() -> u16 {
    8080
}

fn default_app_url() -> String {
    "http://localhost:3000".to_string()
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            host: default_host(),
            port: default_port(),
            cors_origins: vec![],
            app_url: default_app_url(),
        }
    }
}

/// Database configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct DatabaseConfig {
    /// Path to the SQLite database file.
    #[serde(default = "default_db_path")]
    pub path: String,
    /// Maximum number of pooled connections.
    #[serde(default = "default_max_connections")]
    pub max_connections: u32,
}

fn default_db_path() -> String {
    "data/tally.db".to_string()
}

fn default_max_connections() -> u32 {
    5
}

impl Default for DatabaseConfig {
    fn default() -> Self {
        Self {
            path: default_db_path(),
            max_connections: default_max_connections(),
        }
    }
}

/// Access and refresh token configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct JwtConfig {
    /// HMAC secret used to sign access tokens (must be set).
    #[serde(default)]
    pub secret: String,
    /// Access token lifetime in seconds.
    #[serde(default = "default_access_ttl")]
    pub access_ttl_secs: u64,
    /// Refresh token lifetime in seconds.
    #[serde(default = "default_refresh_ttl")]
    pub refresh_ttl_secs: u64,
}

/// Upper bound for either token lifetime (ten years).
pub const MAX_TOKEN_TTL_SECS: u64 = 10 * 365 * 24 * 3600;

fn default_access_ttl() -> u64 {
    900 // 15 minutes
}

fn default_refresh_ttl() -> u64 {
    7 * 24 * 3600 // 168 hours
}

impl Default for JwtConfig {
    fn default() -> Self {
        Self {
            secret: String::new(),
            access_ttl_secs: default_access_ttl(),
            refresh_ttl_secs: default_refresh_ttl(),
        }
    }
}

/// Argon2id cost parameters for password hashing.
#[derive(Debug, Clone, Deserialize)]
pub struct Argon2Config {
    /// Memory cost in KiB.
    #[serde(default = "default_argon2_memory")]
    pub memory_kib: u32,
    /// Number of iterations.
    #[serde(default = "default_argon2_iterations")]
    pub iterations: u32,
    /// Degree of parallelism.
    #[serde(default = "default_argon2_parallelism")]
    pub parallelism: u32,
    /// Salt length in bytes.
    #[serde(default = "default_argon2_salt_length")]
    pub salt_length: usize,
    /// Derived key length in bytes.
    #[serde(default = "default_argon2_key_length")]
    pub key_length: usize,
}

fn default_argon2_memory() -> u32 {
    64 * 1024
}

fn default_argon2_iterations() -> u32 {
    3
}

fn default_argon2_parallelism() -> u32 {
    2
}

fn default_argon2_salt_length() -> usize {
    16
}

fn default_argon2_key_length() -> usize {
    32
}

impl Default for Argon2Config {
    fn default() -> Self {
        Self {
            memory_kib: default_argon2_memory(),
            iterations: default_argon2_iterations(),
            parallelism: default_argon2_parallelism(),
            salt_length: default_argon2_salt_length(),
            key_length: default_argon2_key_length(),
        }
    }
}

/// Rate limiting for the public authentication endpoints.
#[derive(Debug, Clone, Deserialize)]
pub struct RateLimitConfig {
    /// Sustained requests per second per client IP.
    #[serde(default = "default_auth_per_second")]
    pub auth_per_second: u32,
    /// Burst size per client IP.
    #[serde(default = "default_auth_burst")]
    pub auth_burst: u32,
    /// Key clients on `X-Forwarded-For` / `X-Real-IP` instead of the peer
    /// address. Only enable behind a reverse proxy that overwrites them.
    #[serde(default)]
    pub trust_forwarded_headers: bool,
}

fn default_auth_per_second() -> u32 {
    10
}

fn default_auth_burst() -> u32 {
    20
}

impl Default for RateLimitConfig {
    fn default() -> Self {
        Self {
            auth_per_second: default_auth_per_second(),
            auth_burst: default_auth_burst(),
            trust_forwarded_headers: false,
        }
    }
}

/// Logging configuration.
#[derive(Debug, Clone, Deserialize)]
pub struct LoggingConfig {
    /// Log level (trace, debug, info, warn, error).
    #[serde(default = "default_log_level")]
    pub level: String,
    /// Log file path.
    #[serde(default = "default_log_file")]
    pub file: String,
}

fn default_log_level() -> String {
    "info".to_string()
}

fn default_log_file() -> String {
    "logs/tally.log".to_string()
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: default_log_level(),
            file: default_log_file(),
        }
    }
}

/// Main configuration structure.
#[derive(Debug, Clone, Deserialize, Default)]
pub struct Config {
    /// HTTP server configuration.
    #[serde(default)]
    pub server: ServerConfig,
    /// Database configuration.
    #[serde(default)]
    pub database: DatabaseConfig,
    /// Token configuration.
    #[serde(default)]
    pub jwt: JwtConfig,
    /// Password hashing configuration.
    #[serde(default)]
    pub argon2: Argon2Config,
    /// Rate limit configuration.
    #[serde(default)]
    pub rate_limit: RateLimitConfig,
    /// Logging configuration.
    #[serde(default)]
    pub logging: LoggingConfig,
}

impl Config {
    /// Load configuration from a TOML file.
    pub fn load<P: AsRef<Path>>(path: P) -> Result<Self> {
        let content = std::fs::read_to_string(path.as_ref()).map_err(TallyError::Io)?;
        Self::parse(&content)
    }

    /// Load configuration from a TOML file and apply environment variable overrides.
    pub fn load_with_env<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut config = Self::load(path)?;
        config.apply_env_overrides();
        Ok(config)
    }

    /// Parse configuration from a TOML string.
    pub fn parse(s: &str) -> Result<Self> {
        toml::from_str(s).map_err(|e| TallyError::Config(format!("config parse error: {e}")))
    }

    /// Apply environment variable overrides to the configuration.
    ///
    /// Supported environment variables:
    /// - `TALLY_JWT_SECRET`: access token signing secret
    /// - `TALLY_DATABASE_PATH`: SQLite database path
    /// - `TALLY_PORT`: HTTP port
    pub fn apply_env_overrides(&mut self) {
        if let Ok(secret) = std::env::var("TALLY_JWT_SECRET") {
            if !secret.is_empty() {
                self.jwt.secret = secret;
            }
        }

        if let Ok(path) = std::env::var("TALLY_DATABASE_PATH") {
            if !path.is_empty() {
                self.database.path = path;
            }
        }

        if let Ok(port) = std::env::var("TALLY_PORT") {
            match port.parse() {
                Ok(port) => self.server.port = port,
                Err(_) => tracing::warn!(value = %port, "Ignoring invalid TALLY_PORT"),
            }
        }
    }

    /// Validate the configuration.
    ///
    /// Returns an error if:
    /// - the JWT secret is not set
    /// - either token lifetime is zero or above `MAX_TOKEN_TTL_SECS`
    /// - the argon2 parameters are out of range
    pub fn validate(&self) -> Result<()> {
        if self.jwt.secret.is_empty() {
            return Err(TallyError::Config(
                "jwt.secret is not set. \
                 Set it in config.toml or via the TALLY_JWT_SECRET environment variable."
                    .to_string(),
            ));
        }

        if self.jwt.access_ttl_secs == 0 || self.jwt.refresh_ttl_secs == 0 {
            return Err(TallyError::Config(
                "token lifetimes must be greater than zero".to_string(),
            ));
        }

        if self.jwt.access_ttl_secs > MAX_TOKEN_TTL_SECS
            || self.jwt.refresh_ttl_secs > MAX_TOKEN_TTL_SECS
        {
            return Err(TallyError::Config(format!(
                "token lifetimes must not exceed {MAX_TOKEN_TTL_SECS} seconds"
            )));
        }

        crate::auth::PasswordHasher::new(&self.argon2)
            .map_err(|e| TallyError::Config(format!("invalid argon2 settings: {e}")))?;

        Ok(())
    }
}
