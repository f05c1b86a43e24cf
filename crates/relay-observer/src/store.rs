//! Latest-value cache, one slot per channel.
//!
//! The store never merges: a new record replaces the previous one for its
//! channel wholesale. Entries are created on the first valid write and
//! live until the process exits.

use std::collections::BTreeMap;

use relay_types::{Channel, LatestData, Record};
use tokio::sync::RwLock;

/// Most recent [`Record`] per [`Channel`].
///
/// Writes take the lock for the duration of a single map insert, so a
/// reader sees either the previous record or the new one, never a mix.
#[derive(Debug, Default)]
pub struct ChannelStore {
    records: RwLock<BTreeMap<Channel, Record>>,
}

impl ChannelStore {
    /// Create an empty store. Every channel starts absent.
    pub fn new() -> Self {
        Self::default()
    }

    /// Replace the record for the record's channel, returning the old one.
    pub async fn set(&self, record: Record) -> Option<Record> {
        self.records.write().await.insert(record.channel(), record)
    }

    /// Latest record for `channel`, if any has been written.
    pub async fn get(&self, channel: Channel) -> Option<Record> {
        self.records.read().await.get(&channel).cloned()
    }

    /// Every channel mapped to its latest record or `None`.
    ///
    /// All channels are present as keys so consumers can tell "never
    /// written" apart from "unknown channel".
    pub async fn get_all(&self) -> LatestData {
        let records = self.records.read().await;
        Channel::ALL
            .into_iter()
            .map(|channel| (channel, records.get(&channel).cloned()))
            .collect()
    }

    /// Records for populated channels only, in channel order.
    pub async fn populated(&self) -> Vec<Record> {
        self.records.read().await.values().cloned().collect()
    }
}
