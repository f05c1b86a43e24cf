//! HTTP endpoint handlers for ingestion and status.
//!
//! # Endpoints
//!
//! | Method | Path | Description |
//! |--------|------|-------------|
//! | `POST` | `/clf_data` | Submit classifier output |
//! | `POST` | `/mc_data` | Submit motion correction parameters |
//! | `POST` | `/feedback_status` | Submit neurofeedback delivery status |
//! | `POST` | `/run_number` | Submit run number |
//! | `POST` | `/feedback_number` | Submit feedback number |
//! | `POST` | `/api/channels/{channel}` | Submit to any channel by wire name |
//! | `GET` | `/health` | Status report with all channels |
//! | `GET` | `/api/latest` | Latest record per channel |
//!
//! Ingestion bodies are taken as raw bytes and validated here rather
//! than through Axum's `Json` extractor, so every malformed body gets the
//! same `400 {"error": ..}` response shape.

use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::{Path, State};
use axum::Json;
use relay_types::{Channel, LatestData, StatusReport, Submission};
use tracing::warn;

use crate::error::ObserverError;
use crate::ingest;
use crate::state::AppState;
use crate::status;

/// Body of a successful ingestion response.
#[derive(Debug, serde::Serialize)]
pub struct SubmitResponse {
    /// Always `true`.
    pub success: bool,
    /// Human-readable confirmation.
    pub message: String,
}

// ---------------------------------------------------------------------------
// POST ingestion
// ---------------------------------------------------------------------------

/// Validate a body for `channel`, then store and broadcast it.
///
/// Invalid bodies are rejected before the store or hub is touched.
pub async fn submit(
    state: &AppState,
    channel: Channel,
    body: &[u8],
) -> Result<Json<SubmitResponse>, ObserverError> {
    let submission = Submission::from_slice(channel, body).inspect_err(|e| {
        warn!(%channel, error = %e, "Rejected submission");
    })?;

    let ack = ingest::submit(&state.store, &state.hub, submission).await;

    Ok(Json(SubmitResponse {
        success: true,
        message: ack.message(),
    }))
}

/// `POST /api/channels/{channel}`: submit by channel wire name.
pub async fn submit_named(
    State(state): State<Arc<AppState>>,
    Path(name): Path<String>,
    body: Bytes,
) -> Result<Json<SubmitResponse>, ObserverError> {
    let channel = name.parse::<Channel>()?;
    submit(&state, channel, &body).await
}

// ---------------------------------------------------------------------------
// GET status
// ---------------------------------------------------------------------------

/// `GET /health`: server time, live observer count, and all channels.
pub async fn health(State(state): State<Arc<AppState>>) -> Json<StatusReport> {
    Json(status::status(&state.store, &state.hub).await)
}

/// `GET /api/latest`: the channel mapping alone, for polling clients.
pub async fn latest(State(state): State<Arc<AppState>>) -> Json<LatestData> {
    Json(status::latest(&state.store).await)
}
