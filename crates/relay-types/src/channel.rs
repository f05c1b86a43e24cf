//! The fixed set of measurement channels the relay understands.
//!
//! Each channel has one payload shape (see [`crate::record::Payload`]).
//! The wire name of a channel is its kebab-case form, e.g.
//! `classifier-output`, and is used both as the `type` tag on pushed
//! events and as the key in the `latestData` mapping.

use std::fmt;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::coerce::ValidationError;

/// A named measurement stream.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize, TS)]
#[serde(rename_all = "kebab-case")]
#[ts(export, export_to = "bindings/")]
pub enum Channel {
    /// Scalar classifier output for the latest volume.
    ClassifierOutput,
    /// Six rigid-body motion correction parameters.
    MotionCorrection,
    /// Whether neurofeedback was delivered to the participant.
    FeedbackStatus,
    /// Current scanner run number.
    RunNumber,
    /// Current feedback trial number.
    FeedbackNumber,
}

impl Channel {
    /// Every channel, in wire order.
    pub const ALL: [Self; 5] = [
        Self::ClassifierOutput,
        Self::MotionCorrection,
        Self::FeedbackStatus,
        Self::RunNumber,
        Self::FeedbackNumber,
    ];

    /// Number of channels.
    pub const COUNT: usize = Self::ALL.len();

    /// The kebab-case wire name.
    pub const fn as_str(self) -> &'static str {
        match self {
            Self::ClassifierOutput => "classifier-output",
            Self::MotionCorrection => "motion-correction",
            Self::FeedbackStatus => "feedback-status",
            Self::RunNumber => "run-number",
            Self::FeedbackNumber => "feedback-number",
        }
    }

    /// The ingestion path the scanning pipeline posts to for this channel.
    pub const fn ingest_path(self) -> &'static str {
        match self {
            Self::ClassifierOutput => "/clf_data",
            Self::MotionCorrection => "/mc_data",
            Self::FeedbackStatus => "/feedback_status",
            Self::RunNumber => "/run_number",
            Self::FeedbackNumber => "/feedback_number",
        }
    }
}

impl fmt::Display for Channel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for Channel {
    type Err = ValidationError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL
            .into_iter()
            .find(|c| c.as_str() == s)
            .ok_or_else(|| ValidationError::UnknownChannel(s.to_owned()))
    }
}
