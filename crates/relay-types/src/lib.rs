//! Shared type definitions for the telemetry relay.
//!
//! This crate is the single source of truth for the channel set, the
//! validated payload shapes, and the JSON wire format shared by the
//! ingestion endpoints, the status endpoints, and the `WebSocket` push
//! stream. Wire types flow to `TypeScript` via `ts-rs` for the dashboard.
//!
//! # Modules
//!
//! - [`channel`] -- The fixed set of measurement channels
//! - [`coerce`] -- Field coercion and [`ValidationError`]
//! - [`ids`] -- Type-safe UUID wrappers
//! - [`record`] -- Submissions, records, push events, status report

pub mod channel;
pub mod coerce;
pub mod ids;
pub mod record;

pub use channel::Channel;
pub use coerce::ValidationError;
pub use ids::ConnectionId;
pub use record::{
    ChannelEvent, LatestData, MOTION_PARAM_COUNT, Payload, Record, StatusReport, Submission,
};
