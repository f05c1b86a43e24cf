//! Real-time telemetry relay server.
//!
//! This crate provides an Axum HTTP server that:
//!
//! - **accepts measurements** over `POST` from the scanning pipeline,
//!   validates them per channel, and caches the latest value per channel
//! - **pushes updates** to every connected `WebSocket` observer
//!   (`GET /ws`), replaying current state to each observer on connect
//! - **reports status** (`GET /health`, `GET /api/latest`) for health
//!   checks and for clients that can only poll
//!
//! # Architecture
//!
//! ```text
//! producer -> handlers -> ingest -> ChannelStore (set)
//!                                -> BroadcastHub (fan-out) -> observer queues -> ws
//! ws accept -> ConnectionLifecycle -> ChannelStore (read) -> replay -> BroadcastHub (admit)
//! ```
//!
//! The store and the hub are separate structures with separate locks,
//! injected through [`AppState`]. Broadcasting never awaits a socket:
//! each observer has a bounded queue drained by its own task.

pub mod error;
pub mod handlers;
pub mod hub;
pub mod ingest;
pub mod lifecycle;
pub mod router;
pub mod server;
pub mod startup;
pub mod state;
pub mod status;
pub mod store;
pub mod ws;

// Re-export primary types for convenience.
pub use hub::{BroadcastHub, BroadcastReport, Delivery};
pub use lifecycle::{ConnectionLifecycle, ConnectionState, ObserverSession};
pub use router::build_router;
pub use server::{start_server, ServerConfig, ServerError};
pub use startup::{spawn_relay, RunningRelay, StartupError};
pub use state::AppState;
pub use store::ChannelStore;
