//! Axum router construction for the relay.
//!
//! Assembles the ingestion, status, and `WebSocket` routes into a single
//! [`Router`] with CORS, request tracing, and panic isolation.

use std::any::Any;
use std::sync::Arc;

use axum::body::Bytes;
use axum::extract::State;
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::Router;
use relay_types::Channel;
use tower_http::catch_panic::CatchPanicLayer;
use tower_http::cors::{Any as AnyOrigin, CorsLayer};
use tower_http::trace::TraceLayer;
use tracing::error;

use crate::error::ObserverError;
use crate::handlers;
use crate::state::AppState;
use crate::ws;

/// Build the complete Axum router for the relay.
///
/// The router includes:
/// - `POST /clf_data`, `/mc_data`, `/feedback_status`, `/run_number`,
///   `/feedback_number` -- per-channel ingestion
/// - `POST /api/channels/{channel}` -- ingestion by channel name
/// - `GET /health` -- status report
/// - `GET /api/latest` -- latest record per channel
/// - `GET /ws` -- `WebSocket` push stream
///
/// CORS allows any origin because the dashboard is served elsewhere.
pub fn build_router(state: Arc<AppState>) -> Router {
    let cors = CorsLayer::new()
        .allow_origin(AnyOrigin)
        .allow_methods(AnyOrigin)
        .allow_headers(AnyOrigin);

    let mut router: Router<Arc<AppState>> = Router::new();
    for channel in Channel::ALL {
        router = router.route(
            channel.ingest_path(),
            post(move |State(state): State<Arc<AppState>>, body: Bytes| async move {
                handlers::submit(&state, channel, &body).await
            }),
        );
    }

    // Axum path parameter, not a format string.
    #[allow(clippy::literal_string_with_formatting_args)]
    let router = router.route("/api/channels/{channel}", post(handlers::submit_named));

    router
        // Status
        .route("/health", get(handlers::health))
        .route("/api/latest", get(handlers::latest))
        // WebSocket
        .route("/ws", get(ws::ws_observe))
        .layer(CatchPanicLayer::custom(panic_response))
        .layer(cors)
        .layer(TraceLayer::new_for_http())
        .with_state(state)
}

/// Turn a handler panic into a 500 for that request only.
#[allow(clippy::needless_pass_by_value)]
fn panic_response(payload: Box<dyn Any + Send + 'static>) -> Response {
    let detail = payload
        .downcast_ref::<String>()
        .map(String::as_str)
        .or_else(|| payload.downcast_ref::<&str>().copied())
        .unwrap_or("unknown panic");
    error!(detail, "Request handler panicked");
    ObserverError::Internal(String::from("request handler panicked")).into_response()
}
