//! Telemetry relay binary.
//!
//! Accepts measurements from the scanning pipeline over HTTP and pushes
//! them to every connected dashboard over `WebSocket`.
//!
//! # Startup Sequence
//!
//! 1. Load configuration from `RELAY_CONFIG` or `relay-config.yaml`
//! 2. Initialize structured logging (tracing)
//! 3. Build the shared store, hub, and connection lifecycle
//! 4. Bind the listener and serve until Ctrl-C or SIGTERM

mod config;
mod error;

use std::path::PathBuf;
use std::sync::Arc;

use relay_observer::{AppState, start_server};
use tracing::{info, warn};
use tracing_subscriber::EnvFilter;

use crate::config::{LoggingConfig, RelayConfig};
use crate::error::RelayError;

const DEFAULT_CONFIG_PATH: &str = "relay-config.yaml";

/// Application entry point for the relay.
///
/// # Errors
///
/// Returns an error if the configuration is invalid, the port cannot be
/// bound, or the server fails while running.
#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    // 1. Load configuration. Logging is not up yet, so the source is
    //    reported after step 2.
    let (config, source) = load_config()?;

    // 2. Initialize structured logging.
    init_tracing(&config.logging)?;
    info!(
        source = %source,
        host = config.server.host,
        port = config.server.port,
        connection_buffer = config.broadcast.connection_buffer,
        "relay-server starting"
    );

    // 3. Shared state.
    let state = Arc::new(AppState::with_connection_buffer(
        config.broadcast.connection_buffer,
    ));

    // 4. Serve.
    start_server(&config.server, state, shutdown_signal())
        .await
        .map_err(RelayError::from)?;

    info!("relay-server stopped");
    Ok(())
}

/// Load configuration from disk, falling back to defaults when the
/// default file is absent. An explicit `RELAY_CONFIG` path must exist.
fn load_config() -> Result<(RelayConfig, String), RelayError> {
    if let Ok(path) = std::env::var("RELAY_CONFIG") {
        let path = PathBuf::from(path);
        let config = RelayConfig::from_file(&path)?;
        return Ok((config, path.display().to_string()));
    }

    let path = PathBuf::from(DEFAULT_CONFIG_PATH);
    if path.exists() {
        let config = RelayConfig::from_file(&path)?;
        Ok((config, path.display().to_string()))
    } else {
        let mut config = RelayConfig::default();
        config.apply_env_overrides()?;
        Ok((config, String::from("defaults")))
    }
}

/// `RUST_LOG` wins over the configured level.
fn init_tracing(logging: &LoggingConfig) -> Result<(), RelayError> {
    let filter = match EnvFilter::try_from_default_env() {
        Ok(filter) => filter,
        Err(_) => EnvFilter::try_new(&logging.level).map_err(|e| RelayError::Logging {
            directive: logging.level.clone(),
            message: e.to_string(),
        })?,
    };

    if logging.json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(true)
            .init();
    }
    Ok(())
}

/// Resolves on Ctrl-C, or SIGTERM on Unix.
async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            warn!(error = %e, "Failed to listen for Ctrl-C");
            std::future::pending::<()>().await;
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut sigterm) => {
                sigterm.recv().await;
            }
            Err(e) => {
                warn!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        () = ctrl_c => info!("Ctrl-C received, draining connections"),
        () = terminate => info!("SIGTERM received, draining connections"),
    }
}
