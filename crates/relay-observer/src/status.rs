//! Read-only views for health checks and polling clients.

use chrono::Utc;
use relay_types::{LatestData, StatusReport};

use crate::hub::BroadcastHub;
use crate::store::ChannelStore;

/// Snapshot of server time, live connection count, and every channel.
pub async fn status(store: &ChannelStore, hub: &BroadcastHub) -> StatusReport {
    let latest_data = store.get_all().await;
    let live_connection_count = hub.len().await;
    StatusReport {
        status: String::from("ok"),
        server_timestamp: Utc::now(),
        live_connection_count,
        latest_data,
    }
}

/// Every channel mapped to its latest record or `None`.
pub async fn latest(store: &ChannelStore) -> LatestData {
    store.get_all().await
}
