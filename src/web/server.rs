//! Web server for Tally.

use std::net::SocketAddr;
use std::sync::Arc;
use std::time::Duration;

use axum::Router;
use tokio::net::TcpListener;
use tower_http::compression::CompressionLayer;

use crate::auth::{AuthService, Notifier, RefreshTokenManager};
use crate::config::Config;
use crate::db::Database;
use crate::{Result, TallyError};

use super::handlers::AppState;
use super::middleware::RateLimitState;
use super::router::create_router;

/// Token cleanup interval: 1 hour.
const CLEANUP_INTERVAL_SECS: u64 = 3600;

/// Web server for the API.
pub struct WebServer {
    /// Server address.
    addr: SocketAddr,
    /// Application state.
    app_state: Arc<AppState>,
    /// Allowed CORS origins.
    cors_origins: Vec<String>,
}

impl std::fmt::Debug for WebServer {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("WebServer")
            .field("addr", &self.addr)
            .field("cors_origins", &self.cors_origins)
            .finish_non_exhaustive()
    }
}

impl WebServer {
    /// Create a new web server.
    pub fn new(config: &Config, db: Database, notifier: Arc<dyn Notifier>) -> Result<Self> {
        let addr = format!("{}:{}", config.server.host, config.server.port)
            .parse()
            .map_err(|e| TallyError::Config(format!("invalid server address: {e}")))?;

        let auth = AuthService::new(db.clone(), config, notifier)?;
        let rate_limit = RateLimitState::from_config(&config.rate_limit);

        Ok(Self {
            addr,
            app_state: Arc::new(AppState::new(db, auth, rate_limit)),
            cors_origins: config.server.cors_origins.clone(),
        })
    }

    /// Get the server address.
    pub fn addr(&self) -> SocketAddr {
        self.addr
    }

    /// Start the token cleanup background task.
    ///
    /// Runs every hour and deletes refresh tokens past their expiry.
    /// Revoked but unexpired rows stay for reuse detection.
    fn start_token_cleanup_task(refresh: RefreshTokenManager) {
        tokio::spawn(async move {
            let mut interval = tokio::time::interval(Duration::from_secs(CLEANUP_INTERVAL_SECS));

            // Skip the first immediate tick
            interval.tick().await;

            loop {
                interval.tick().await;

                match refresh.cleanup_expired().await {
                    Ok(count) if count > 0 => {
                        tracing::info!(deleted_count = count, "Cleaned up expired refresh tokens");
                    }
                    Ok(_) => tracing::debug!("No expired refresh tokens to clean up"),
                    Err(e) => tracing::warn!(error = %e, "Failed to cleanup refresh tokens"),
                }
            }
        });
    }

    fn build(&self) -> Router {
        create_router(self.app_state.clone(), &self.cors_origins).layer(CompressionLayer::new())
    }

    fn start_background_tasks(&self) {
        Self::start_token_cleanup_task(self.app_state.auth.refresh_tokens().clone());
        self.app_state.rate_limit.start_sweep_task();
        tracing::info!("Background maintenance started");
    }

    /// Run the web server.
    pub async fn run(self) -> Result<()> {
        let router = self.build();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        // after a successful bind
        self.start_background_tasks();

        tracing::info!("Web server listening on http://{}", local_addr);

        axum::serve(
            listener,
            router.into_make_service_with_connect_info::<SocketAddr>(),
        )
        .await?;
        Ok(())
    }

    /// Run the server and return the actual bound address.
    ///
    /// This is useful for testing when binding to port 0.
    pub async fn run_with_addr(self) -> Result<SocketAddr> {
        let router = self.build();

        let listener = TcpListener::bind(self.addr).await?;
        let local_addr = listener.local_addr()?;

        self.start_background_tasks();

        tracing::info!("Web server listening on http://{}", local_addr);

        tokio::spawn(async move {
            if let Err(e) = axum::serve(
                listener,
                router.into_make_service_with_connect_info::<SocketAddr>(),
            )
            .await
            {
                tracing::error!("Web server error: {}", e);
            }
        });

        Ok(local_addr)
    }
}
