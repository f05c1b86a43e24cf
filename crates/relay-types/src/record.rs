//! Payloads, stored records, and the pushed wire event.
//!
//! A [`Submission`] is what the producer sent, validated and coerced. The
//! relay stamps it with the server clock to make a [`Record`], which is
//! what the channel store keeps and what `latestData` reports. A
//! [`ChannelEvent`] is a record tagged with its channel, the exact shape
//! pushed to observers:
//!
//! ```json
//! {"type":"classifier-output","value":0.75,"rep":42,"timestamp":"2025-01-01T12:00:00Z"}
//! ```

use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use serde::Serialize;
use serde_json::Value;
use ts_rs::TS;

use crate::channel::Channel;
use crate::coerce::{self, ValidationError};

/// Number of rigid-body motion parameters (3 translations + 3 rotations).
pub const MOTION_PARAM_COUNT: usize = 6;

/// Canonical payload for one channel, after coercion.
///
/// Serialized untagged so the payload fields sit flat beside `rep` and
/// `timestamp` in both records and events.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[serde(untagged)]
#[ts(export, export_to = "bindings/")]
pub enum Payload {
    /// `classifier-output`
    ClassifierOutput {
        /// Classifier output value.
        value: f64,
    },
    /// `motion-correction`
    MotionCorrection {
        /// Translations then rotations.
        params: [f64; MOTION_PARAM_COUNT],
    },
    /// `feedback-status`
    FeedbackStatus {
        /// Whether feedback was delivered this repetition.
        sent: bool,
    },
    /// `run-number`
    RunNumber {
        /// Current run.
        #[ts(type = "number")]
        value: i64,
    },
    /// `feedback-number`
    FeedbackNumber {
        /// Current feedback trial.
        #[ts(type = "number")]
        value: i64,
    },
}

impl Payload {
    /// The channel this payload belongs to.
    pub const fn channel(&self) -> Channel {
        match self {
            Self::ClassifierOutput { .. } => Channel::ClassifierOutput,
            Self::MotionCorrection { .. } => Channel::MotionCorrection,
            Self::FeedbackStatus { .. } => Channel::FeedbackStatus,
            Self::RunNumber { .. } => Channel::RunNumber,
            Self::FeedbackNumber { .. } => Channel::FeedbackNumber,
        }
    }
}

/// A validated inbound measurement, not yet timestamped.
#[derive(Debug, Clone, PartialEq)]
pub struct Submission {
    /// Coerced payload.
    pub payload: Payload,
    /// Producer's repetition counter, echoed verbatim.
    pub rep: i64,
}

impl Submission {
    /// Validate a raw JSON body against the shape required by `channel`.
    ///
    /// Unknown fields are ignored. Nothing is mutated on failure, so a
    /// rejected body never reaches the store or the hub.
    pub fn from_json(channel: Channel, body: &Value) -> Result<Self, ValidationError> {
        let fields = coerce::as_object(body)?;

        let payload = match channel {
            Channel::ClassifierOutput => Payload::ClassifierOutput {
                value: coerce::float(coerce::require(fields, "value")?, "value")?,
            },
            Channel::MotionCorrection => Payload::MotionCorrection {
                params: coerce::float_array(coerce::require(fields, "params")?, "params")?,
            },
            Channel::FeedbackStatus => Payload::FeedbackStatus {
                sent: coerce::boolean(coerce::require(fields, "sent")?, "sent")?,
            },
            Channel::RunNumber => Payload::RunNumber {
                value: coerce::integer(coerce::require(fields, "value")?, "value")?,
            },
            Channel::FeedbackNumber => Payload::FeedbackNumber {
                value: coerce::integer(coerce::require(fields, "value")?, "value")?,
            },
        };
        let rep = coerce::integer(coerce::require(fields, "rep")?, "rep")?;

        Ok(Self { payload, rep })
    }

    /// Parse a raw request body and validate it for `channel`.
    pub fn from_slice(channel: Channel, bytes: &[u8]) -> Result<Self, ValidationError> {
        let body: Value = serde_json::from_slice(bytes)?;
        Self::from_json(channel, &body)
    }

    /// Stamp with the ingestion time, producing an immutable record.
    pub const fn stamp(self, timestamp: DateTime<Utc>) -> Record {
        Record {
            payload: self.payload,
            rep: self.rep,
            timestamp,
        }
    }

    /// The channel this submission targets.
    pub const fn channel(&self) -> Channel {
        self.payload.channel()
    }
}

/// The most recent value observed on a channel.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/", rename = "ChannelRecord")]
pub struct Record {
    /// Payload fields, flattened.
    #[serde(flatten)]
    pub payload: Payload,
    /// Producer's repetition counter.
    #[ts(type = "number")]
    pub rep: i64,
    /// Server time at which the record was accepted.
    pub timestamp: DateTime<Utc>,
}

impl Record {
    /// The channel this record belongs to.
    pub const fn channel(&self) -> Channel {
        self.payload.channel()
    }

    /// Tag this record as a push event.
    pub fn to_event(&self) -> ChannelEvent {
        ChannelEvent {
            channel: self.channel(),
            record: self.clone(),
        }
    }
}

/// A record tagged with its channel, as pushed to observers.
#[derive(Debug, Clone, PartialEq, Serialize, TS)]
#[ts(export, export_to = "bindings/")]
pub struct ChannelEvent {
    /// Channel wire name.
    #[serde(rename = "type")]
    pub channel: Channel,
    /// The record, flattened beside `type`.
    #[serde(flatten)]
    pub record: Record,
}

/// Every channel mapped to its latest record, or `None` if never written.
pub type LatestData = BTreeMap<Channel, Option<Record>>;

/// Response body of the status endpoint.
#[derive(Debug, Clone, Serialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export, export_to = "bindings/")]
pub struct StatusReport {
    /// Always `"ok"` while the process is serving.
    pub status: String,
    /// Server time at which the report was produced.
    pub server_timestamp: DateTime<Utc>,
    /// Observers currently in the live set.
    pub live_connection_count: usize,
    /// Full current channel contents.
    pub latest_data: LatestData,
}

#[cfg(test)]
#[allow(clippy::float_cmp)]
mod tests {
    use serde_json::json;

    use super::*;

    fn at_noon() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2025-01-01T12:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    #[test]
    fn classifier_output_validates_and_coerces() {
        let sub = Submission::from_json(
            Channel::ClassifierOutput,
            &json!({ "value": 0.75, "rep": 42 }),
        )
        .unwrap();
        assert_eq!(sub.payload, Payload::ClassifierOutput { value: 0.75 });
        assert_eq!(sub.rep, 42);
        assert_eq!(sub.channel(), Channel::ClassifierOutput);
    }

    #[test]
    fn motion_correction_requires_six_params() {
        let err = Submission::from_json(
            Channel::MotionCorrection,
            &json!({ "params": [0.001, -0.002, 0.003, 0.0001, -0.0002], "rep": 42 }),
        );
        assert!(matches!(err, Err(ValidationError::WrongLength { actual: 5, .. })));
    }

    #[test]
    fn missing_rep_is_rejected_for_every_channel() {
        let bodies = [
            json!({ "value": 1.0 }),
            json!({ "params": [0, 0, 0, 0, 0, 0] }),
            json!({ "sent": true }),
            json!({ "value": 3 }),
            json!({ "value": 12 }),
        ];
        for (channel, body) in Channel::ALL.into_iter().zip(bodies.iter()) {
            let err = Submission::from_json(channel, body);
            assert!(
                matches!(err, Err(ValidationError::MissingField { field: "rep" })),
                "{channel} accepted a body without rep"
            );
        }
    }

    #[test]
    fn run_number_rejects_fractional_value() {
        let err = Submission::from_json(Channel::RunNumber, &json!({ "value": 2.5, "rep": 1 }));
        assert!(matches!(err, Err(ValidationError::InvalidType { field: "value", .. })));
    }

    #[test]
    fn feedback_status_reads_sent_flag() {
        let sub =
            Submission::from_json(Channel::FeedbackStatus, &json!({ "sent": true, "rep": 1 }))
                .unwrap();
        assert_eq!(sub.payload, Payload::FeedbackStatus { sent: true });
    }

    #[test]
    fn from_slice_reports_malformed_json() {
        let err = Submission::from_slice(Channel::RunNumber, b"{not json");
        assert!(matches!(err, Err(ValidationError::Malformed(_))));
    }

    #[test]
    fn record_serializes_flat_without_type() {
        let record = Submission {
            payload: Payload::ClassifierOutput { value: 0.75 },
            rep: 42,
        }
        .stamp(at_noon());
        let json = serde_json::to_value(&record).unwrap();
        assert_eq!(
            json,
            json!({ "value": 0.75, "rep": 42, "timestamp": "2025-01-01T12:00:00Z" })
        );
    }

    #[test]
    fn event_carries_type_tag() {
        let record = Submission {
            payload: Payload::MotionCorrection {
                params: [0.001, -0.002, 0.003, 0.0001, -0.0002, 0.0003],
            },
            rep: 7,
        }
        .stamp(at_noon());
        let json = serde_json::to_value(record.to_event()).unwrap();
        assert_eq!(json["type"], "motion-correction");
        assert_eq!(json["params"][5], 0.0003);
        assert_eq!(json["rep"], 7);
        assert_eq!(json["timestamp"], "2025-01-01T12:00:00Z");
    }

    #[test]
    fn status_report_uses_camel_case_and_nulls() {
        let mut latest: LatestData = Channel::ALL.into_iter().map(|c| (c, None)).collect();
        latest.insert(
            Channel::RunNumber,
            Some(
                Submission {
                    payload: Payload::RunNumber { value: 3 },
                    rep: 1,
                }
                .stamp(at_noon()),
            ),
        );
        let report = StatusReport {
            status: String::from("ok"),
            server_timestamp: at_noon(),
            live_connection_count: 2,
            latest_data: latest,
        };
        let json = serde_json::to_value(&report).unwrap();
        assert_eq!(json["liveConnectionCount"], 2);
        assert_eq!(json["latestData"]["run-number"]["value"], 3);
        assert!(json["latestData"]["classifier-output"].is_null());
        assert_eq!(json["latestData"].as_object().map(serde_json::Map::len), Some(5));
    }
}
