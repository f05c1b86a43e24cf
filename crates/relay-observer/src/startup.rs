//! Relay startup helper for embedding in another process.
//!
//! Provides [`spawn_relay`] which binds the listener eagerly and then
//! runs the server on a background Tokio task. A port conflict is
//! reported to the caller before anything is spawned.
//!
//! # Usage
//!
//! ```rust,ignore
//! use relay_observer::startup::spawn_relay;
//! use relay_observer::{AppState, ServerConfig};
//! use std::sync::Arc;
//!
//! let state = Arc::new(AppState::new());
//! let relay = spawn_relay(&ServerConfig::default(), state).await?;
//! println!("relay on {}", relay.addr);
//! ```

use std::net::SocketAddr;
use std::sync::Arc;

use tokio::sync::oneshot;
use tokio::task::JoinHandle;

use crate::server::{self, ServerConfig, ServerError};
use crate::state::AppState;

/// Errors that can occur when spawning the relay server.
#[derive(Debug, thiserror::Error)]
pub enum StartupError {
    /// The server failed to bind or start.
    #[error("server start error: {0}")]
    Server(#[from] ServerError),

    /// The bound socket did not report a local address.
    #[error("could not read local address: {0}")]
    LocalAddr(#[from] std::io::Error),
}

/// A relay running on a background task.
#[derive(Debug)]
pub struct RunningRelay {
    /// The address actually bound (useful when the configured port is 0).
    pub addr: SocketAddr,
    /// The server task.
    pub handle: JoinHandle<()>,
    shutdown: Option<oneshot::Sender<()>>,
}

impl RunningRelay {
    /// Ask the server to stop accepting and wait for it to finish.
    pub async fn shutdown(mut self) {
        if let Some(tx) = self.shutdown.take() {
            let _ = tx.send(());
        }
        if let Err(e) = self.handle.await {
            tracing::warn!(error = %e, "Relay server task ended abnormally");
        }
    }
}

/// Bind the listener and spawn the relay server on a background task.
///
/// # Errors
///
/// Returns [`StartupError::Server`] if the configured address cannot be
/// bound. This is checked before the background task is spawned.
pub async fn spawn_relay(
    config: &ServerConfig,
    state: Arc<AppState>,
) -> Result<RunningRelay, StartupError> {
    let listener = server::bind(config).await?;
    let addr = listener.local_addr()?;

    let (tx, rx) = oneshot::channel::<()>();
    let handle = tokio::spawn(async move {
        let shutdown = async move {
            let _ = rx.await;
        };
        if let Err(e) = server::serve(listener, state, shutdown).await {
            tracing::error!(error = %e, "Relay server exited with error");
        }
    });

    tracing::info!(%addr, "Relay server spawned on background task");

    Ok(RunningRelay {
        addr,
        handle,
        shutdown: Some(tx),
    })
}
