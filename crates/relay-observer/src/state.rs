//! Shared application state for the relay server.
//!
//! [`AppState`] owns the two pieces of mutable state in the relay, the
//! [`ChannelStore`] and the [`BroadcastHub`], plus the
//! [`ConnectionLifecycle`] that ties them together for new observers.
//! Each is guarded by its own lock, so connection churn on the hub does
//! not serialize writes to the store.

use std::sync::Arc;

use crate::hub::BroadcastHub;
use crate::lifecycle::{ConnectionLifecycle, DEFAULT_CONNECTION_BUFFER};
use crate::store::ChannelStore;

/// Shared state for the Axum application.
///
/// Wrapped in [`Arc`] and injected via Axum's `State` extractor.
#[derive(Debug, Clone)]
pub struct AppState {
    /// Latest record per channel.
    pub store: Arc<ChannelStore>,
    /// Live observer set.
    pub hub: Arc<BroadcastHub>,
    /// Connection state machine owner.
    pub lifecycle: Arc<ConnectionLifecycle>,
}

impl AppState {
    /// Create state with the default per-observer queue length.
    pub fn new() -> Self {
        Self::with_connection_buffer(DEFAULT_CONNECTION_BUFFER)
    }

    /// Create state with a custom per-observer queue length.
    pub fn with_connection_buffer(buffer: usize) -> Self {
        let store = Arc::new(ChannelStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let lifecycle = Arc::new(ConnectionLifecycle::new(
            Arc::clone(&store),
            Arc::clone(&hub),
            buffer,
        ));
        Self {
            store,
            hub,
            lifecycle,
        }
    }
}

impl Default for AppState {
    fn default() -> Self {
        Self::new()
    }
}
