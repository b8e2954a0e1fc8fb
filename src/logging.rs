//! Tracing subscriber setup.
//!
//! Services log with structured fields (`user_id`, `tenant_id`); this module
//! only decides where those events go and at which level.

use std::fs::{self, File, OpenOptions};
use std::path::Path;
use std::sync::Arc;

use tracing::Level;
use tracing_subscriber::fmt::writer::MakeWriterExt;
use tracing_subscriber::prelude::*;
use tracing_subscriber::EnvFilter;

use crate::config::LoggingConfig;
use crate::{Result, TallyError};

/// Map a configured level name to a `Level`. Unknown names mean `info`.
fn parse_level(level: &str) -> Level {
    match level.trim().to_ascii_lowercase().as_str() {
        "trace" => Level::TRACE,
        "debug" => Level::DEBUG,
        "warn" | "warning" => Level::WARN,
        "error" => Level::ERROR,
        _ => Level::INFO,
    }
}

/// `RUST_LOG` directives win over the configured level. Without them,
/// sqlx statement logging stays at `warn`.
fn build_filter(level: &str) -> EnvFilter {
    let filter = EnvFilter::from_default_env().add_directive(parse_level(level).into());
    if std::env::var_os("RUST_LOG").is_some() {
        return filter;
    }
    match "sqlx=warn".parse() {
        Ok(directive) => filter.add_directive(directive),
        Err(_) => filter,
    }
}

fn open_log_file(path: &Path) -> Result<File> {
    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() {
            fs::create_dir_all(parent)?;
        }
    }
    Ok(OpenOptions::new().create(true).append(true).open(path)?)
}

/// Install the global subscriber.
///
/// Events go to stdout and, when `config.file` is not empty, are appended
/// to that file as well. Fails if a subscriber is already installed.
pub fn init(config: &LoggingConfig) -> Result<()> {
    let filter = build_filter(&config.level);
    let stdout_layer = tracing_subscriber::fmt::layer().with_target(true);

    let installed = if config.file.is_empty() {
        tracing_subscriber::registry()
            .with(stdout_layer)
            .with(filter)
            .try_init()
    } else {
        let file = Arc::new(open_log_file(Path::new(&config.file))?);
        tracing_subscriber::registry()
            .with(
                stdout_layer
                    .with_ansi(false)
                    .with_writer(std::io::stdout.and(file)),
            )
            .with(filter)
            .try_init()
    };

    installed.map_err(|e| TallyError::Config(format!("logging already initialized: {e}")))
}

/// Console-only fallback used when the log file cannot be opened.
pub fn init_console_only(level: &str) {
    let _ = tracing_subscriber::registry()
        .with(tracing_subscriber::fmt::layer().with_target(true))
        .with(build_filter(level))
        .try_init();
}
