use std::process::ExitCode;
use std::sync::Arc;

use tracing::{error, info};

use tally::{Config, Database, LogNotifier, WebServer};

#[tokio::main]
async fn main() -> ExitCode {
    // Load configuration
    let config = match Config::load_with_env("config.toml") {
        Ok(config) => config,
        Err(e) => {
            eprintln!("Failed to load config.toml: {e}");
            eprintln!("Using default configuration.");
            let mut config = Config::default();
            config.apply_env_overrides();
            config
        }
    };

    // Initialize logging
    if let Err(e) = tally::logging::init(&config.logging) {
        eprintln!("Failed to initialize logging: {e}");
        // Fall back to console-only logging
        tally::logging::init_console_only(&config.logging.level);
    }

    info!("Tally back office API");

    if let Err(e) = config.validate() {
        error!("Invalid configuration: {}", e);
        return ExitCode::FAILURE;
    }

    let db = match Database::open(&config.database.path, config.database.max_connections).await {
        Ok(db) => db,
        Err(e) => {
            error!(path = %config.database.path, "Failed to open database: {}", e);
            return ExitCode::FAILURE;
        }
    };
    info!(path = %config.database.path, "Database ready");

    let notifier = Arc::new(LogNotifier::new(config.server.app_url.clone()));
    let server = match WebServer::new(&config, db, notifier) {
        Ok(server) => server,
        Err(e) => {
            error!("Failed to configure web server: {}", e);
            return ExitCode::FAILURE;
        }
    };

    info!("Server configured on {}", server.addr());
    if let Err(e) = server.run().await {
        error!("Web server error: {}", e);
        return ExitCode::FAILURE;
    }

    ExitCode::SUCCESS
}
