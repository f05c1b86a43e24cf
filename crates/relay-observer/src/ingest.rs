//! Ingestion of validated submissions.
//!
//! The order of effects is fixed: stamp, store, then broadcast. Because
//! the store write completes before the hub is touched, a consumer that
//! polls the status endpoint after seeing a pushed event always finds
//! that event's value (or a newer one) in the snapshot.

use chrono::Utc;
use relay_types::{Channel, Record, Submission};
use tracing::{debug, warn};

use crate::hub::{BroadcastHub, BroadcastReport};
use crate::store::ChannelStore;

/// What a successful submission did.
#[derive(Debug, Clone)]
pub struct Acknowledgment {
    /// The record now stored for its channel.
    pub record: Record,
    /// Per-connection outcome of the fan-out. Informational only.
    pub report: BroadcastReport,
}

impl Acknowledgment {
    /// The channel written.
    pub const fn channel(&self) -> Channel {
        self.record.channel()
    }

    /// Human-readable confirmation for the producer.
    pub fn message(&self) -> String {
        format!("{} data received for rep {}", self.channel(), self.record.rep)
    }
}

/// Stamp, store, and broadcast a validated submission.
///
/// Cannot fail: validation has already happened and fan-out is
/// best-effort.
pub async fn submit(
    store: &ChannelStore,
    hub: &BroadcastHub,
    submission: Submission,
) -> Acknowledgment {
    let record = submission.stamp(Utc::now());
    store.set(record.clone()).await;

    let report = hub.broadcast(&record.to_event()).await;
    debug!(
        channel = %record.channel(),
        rep = record.rep,
        delivered = report.delivered(),
        dropped = report.dropped(),
        closed = report.closed(),
        "Submission relayed"
    );
    if report.dropped() > 0 {
        warn!(
            channel = %record.channel(),
            rep = record.rep,
            lagging = report.dropped(),
            "Observers lagging; frame dropped for them"
        );
    }

    Acknowledgment { record, report }
}

#[cfg(test)]
mod tests {
    use std::sync::Arc;

    use relay_types::Payload;
    use serde_json::json;

    use super::*;
    use crate::lifecycle::ConnectionLifecycle;

    #[tokio::test]
    async fn submit_stores_then_broadcasts() {
        let store = Arc::new(ChannelStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let lifecycle = ConnectionLifecycle::new(Arc::clone(&store), Arc::clone(&hub), 8);
        let mut session = lifecycle.connect();
        lifecycle.open(&mut session).await.unwrap();

        let before = Utc::now();
        let submission = Submission::from_json(
            Channel::ClassifierOutput,
            &json!({ "value": 0.75, "rep": 42 }),
        )
        .unwrap();
        let ack = submit(&store, &hub, submission).await;

        let stored = store.get(Channel::ClassifierOutput).await.unwrap();
        assert_eq!(stored, ack.record);
        assert_eq!(stored.payload, Payload::ClassifierOutput { value: 0.75 });
        assert_eq!(stored.rep, 42);
        assert!(stored.timestamp >= before);
        assert_eq!(ack.report.delivered(), 1);

        let frame = session.next_frame().await.unwrap();
        let json: serde_json::Value = serde_json::from_str(frame.as_str()).unwrap();
        assert_eq!(json["type"], "classifier-output");
        assert_eq!(json["value"], 0.75);
        assert_eq!(json["rep"], 42);
        assert_eq!(json["timestamp"], serde_json::to_value(stored.timestamp).unwrap());
    }

    #[tokio::test]
    async fn message_names_channel_and_rep() {
        let store = ChannelStore::new();
        let hub = BroadcastHub::new();
        let submission = Submission {
            payload: Payload::FeedbackNumber { value: 12 },
            rep: 1,
        };
        let ack = submit(&store, &hub, submission).await;
        assert_eq!(ack.message(), "feedback-number data received for rep 1");
        assert!(ack.report.outcomes.is_empty());
    }
}
