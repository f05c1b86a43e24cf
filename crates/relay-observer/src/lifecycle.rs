//! Observer connection lifecycle.
//!
//! Every observer moves through `Connecting -> Open -> Closed` and only
//! [`ConnectionLifecycle`] performs the transitions:
//!
//! - [`ConnectionLifecycle::connect`] allocates an identity and outbound
//!   queue (`Connecting`).
//! - [`ConnectionLifecycle::open`] queues one replay frame per populated
//!   channel and admits the connection to the live set (`Open`). Both
//!   happen while the hub's live set is held exclusively, so a broadcast
//!   for a newer value can never be queued ahead of a stale replay.
//! - [`ConnectionLifecycle::close`] removes the connection from the live
//!   set (`Closed`). It is idempotent and safe to run while a broadcast
//!   is in flight.

use std::fmt;
use std::sync::Arc;

use relay_types::{Channel, ConnectionId};
use tokio::sync::mpsc;
use tokio::sync::mpsc::error::TrySendError;
use tracing::debug;

use crate::hub::{self, BroadcastHub, Frame};
use crate::store::ChannelStore;

/// Default outbound queue length per observer.
pub const DEFAULT_CONNECTION_BUFFER: usize = 64;

/// Where a connection is in its life.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ConnectionState {
    /// Accepted but not yet replayed or admitted to the live set.
    Connecting,
    /// In the live set, receiving broadcasts.
    Open,
    /// Removed from the live set; terminal.
    Closed,
}

impl fmt::Display for ConnectionState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            Self::Connecting => "connecting",
            Self::Open => "open",
            Self::Closed => "closed",
        };
        f.write_str(s)
    }
}

/// Errors from lifecycle transitions.
#[derive(Debug, thiserror::Error)]
pub enum LifecycleError {
    /// The requested transition is not allowed from the current state.
    #[error("cannot move connection {id} from {from} to {to}")]
    InvalidTransition {
        /// The connection.
        id: ConnectionId,
        /// Current state.
        from: ConnectionState,
        /// Requested state.
        to: ConnectionState,
    },

    /// A stored record could not be serialized for replay.
    #[error("replay to connection {id} failed to encode: {source}")]
    ReplayEncode {
        /// The connection.
        id: ConnectionId,
        /// The serialization error.
        #[source]
        source: serde_json::Error,
    },

    /// A replay frame did not fit the connection's queue.
    #[error("replay to connection {id} could not be queued: {source}")]
    ReplayEnqueue {
        /// The connection.
        id: ConnectionId,
        /// The queue error, carrying the rejected frame.
        #[source]
        source: TrySendError<Frame>,
    },
}

/// One observer's side of the relay: its identity, state, and the
/// receiving end of its outbound queue.
#[derive(Debug)]
pub struct ObserverSession {
    id: ConnectionId,
    state: ConnectionState,
    sender: Option<mpsc::Sender<Frame>>,
    receiver: mpsc::Receiver<Frame>,
}

impl ObserverSession {
    /// The connection's identity.
    pub const fn id(&self) -> ConnectionId {
        self.id
    }

    /// Current lifecycle state.
    pub const fn state(&self) -> ConnectionState {
        self.state
    }

    /// Wait for the next outbound frame.
    ///
    /// Returns `None` once the session is closed or the hub has dropped
    /// the connection.
    pub async fn next_frame(&mut self) -> Option<Frame> {
        self.receiver.recv().await
    }

    /// Take a queued frame without waiting.
    pub fn try_next_frame(&mut self) -> Option<Frame> {
        self.receiver.try_recv().ok()
    }
}

/// Owner of every connection's state transitions.
#[derive(Debug)]
pub struct ConnectionLifecycle {
    store: Arc<ChannelStore>,
    hub: Arc<BroadcastHub>,
    buffer: usize,
}

impl ConnectionLifecycle {
    /// Create a lifecycle manager over the given store and hub.
    ///
    /// `buffer` is the outbound queue length per observer. It is raised
    /// to at least [`Channel::COUNT`] so a full replay always fits.
    pub fn new(store: Arc<ChannelStore>, hub: Arc<BroadcastHub>, buffer: usize) -> Self {
        Self {
            store,
            hub,
            buffer: buffer.max(Channel::COUNT),
        }
    }

    /// Effective per-observer queue length.
    pub const fn buffer(&self) -> usize {
        self.buffer
    }

    /// Accept a new observer in the `Connecting` state.
    pub fn connect(&self) -> ObserverSession {
        let (sender, receiver) = mpsc::channel(self.buffer);
        ObserverSession {
            id: ConnectionId::new(),
            state: ConnectionState::Connecting,
            sender: Some(sender),
            receiver,
        }
    }

    /// Replay current state to the session and admit it to the live set.
    ///
    /// Returns the number of replayed events, one per channel that has
    /// data. Channels never written are skipped.
    pub async fn open(&self, session: &mut ObserverSession) -> Result<usize, LifecycleError> {
        let sender = match (session.state, session.sender.take()) {
            (ConnectionState::Connecting, Some(sender)) => sender,
            (from, sender) => {
                session.sender = sender;
                return Err(LifecycleError::InvalidTransition {
                    id: session.id,
                    from,
                    to: ConnectionState::Open,
                });
            }
        };

        let registration = self.hub.begin_registration().await;

        let records = self.store.populated().await;
        for record in &records {
            let frame = hub::encode(&record.to_event()).map_err(|source| {
                LifecycleError::ReplayEncode {
                    id: session.id,
                    source,
                }
            })?;
            sender
                .try_send(frame)
                .map_err(|source| LifecycleError::ReplayEnqueue {
                    id: session.id,
                    source,
                })?;
        }

        let live = registration.admit(session.id, sender);
        session.state = ConnectionState::Open;
        debug!(
            connection = %session.id,
            replayed = records.len(),
            live,
            "Observer opened"
        );

        Ok(records.len())
    }

    /// Remove the session from the live set and mark it closed.
    ///
    /// Returns `true` if the connection was live. Closing an already
    /// closed session is a no-op.
    pub async fn close(&self, session: &mut ObserverSession) -> bool {
        if session.state == ConnectionState::Closed {
            return false;
        }
        let was_live = self.hub.remove(session.id).await;
        session.state = ConnectionState::Closed;
        session.sender = None;
        session.receiver.close();
        debug!(connection = %session.id, was_live, "Observer closed");
        was_live
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use relay_types::{Payload, Submission};

    use super::*;

    fn lifecycle() -> (Arc<ChannelStore>, Arc<BroadcastHub>, ConnectionLifecycle) {
        let store = Arc::new(ChannelStore::new());
        let hub = Arc::new(BroadcastHub::new());
        let lifecycle = ConnectionLifecycle::new(Arc::clone(&store), Arc::clone(&hub), 8);
        (store, hub, lifecycle)
    }

    #[tokio::test]
    async fn open_with_empty_store_replays_nothing() {
        let (_, hub, lifecycle) = lifecycle();
        let mut session = lifecycle.connect();
        assert_eq!(session.state(), ConnectionState::Connecting);

        assert_eq!(lifecycle.open(&mut session).await.unwrap(), 0);
        assert_eq!(session.state(), ConnectionState::Open);
        assert_eq!(hub.len().await, 1);
        assert!(session.try_next_frame().is_none());
    }

    #[tokio::test]
    async fn open_replays_each_populated_channel_once() {
        let (store, _, lifecycle) = lifecycle();
        let run = Submission {
            payload: Payload::RunNumber { value: 3 },
            rep: 5,
        }
        .stamp(Utc::now());
        store.set(run.clone()).await;
        store
            .set(
                Submission {
                    payload: Payload::FeedbackStatus { sent: true },
                    rep: 5,
                }
                .stamp(Utc::now()),
            )
            .await;

        let mut session = lifecycle.connect();
        assert_eq!(lifecycle.open(&mut session).await.unwrap(), 2);

        let mut types = Vec::new();
        while let Some(frame) = session.try_next_frame() {
            let json: serde_json::Value = serde_json::from_str(frame.as_str()).unwrap();
            if json["type"] == "run-number" {
                assert_eq!(json["value"], 3);
                assert_eq!(json["timestamp"], serde_json::to_value(run.timestamp).unwrap());
            }
            types.push(json["type"].as_str().unwrap().to_owned());
        }
        types.sort();
        assert_eq!(types, vec!["feedback-status", "run-number"]);
    }

    #[tokio::test]
    async fn open_twice_is_rejected() {
        let (_, _, lifecycle) = lifecycle();
        let mut session = lifecycle.connect();
        lifecycle.open(&mut session).await.unwrap();
        let err = lifecycle.open(&mut session).await;
        assert!(matches!(
            err,
            Err(LifecycleError::InvalidTransition {
                from: ConnectionState::Open,
                to: ConnectionState::Open,
                ..
            })
        ));
    }

    #[tokio::test]
    async fn close_removes_and_is_idempotent() {
        let (_, hub, lifecycle) = lifecycle();
        let mut session = lifecycle.connect();
        lifecycle.open(&mut session).await.unwrap();

        assert!(lifecycle.close(&mut session).await);
        assert_eq!(session.state(), ConnectionState::Closed);
        assert!(hub.is_empty().await);
        assert!(!lifecycle.close(&mut session).await);
        assert!(session.next_frame().await.is_none());
    }

    #[tokio::test]
    async fn closed_session_cannot_reopen() {
        let (_, _, lifecycle) = lifecycle();
        let mut session = lifecycle.connect();
        lifecycle.close(&mut session).await;
        assert!(lifecycle.open(&mut session).await.is_err());
    }

    #[test]
    fn buffer_fits_full_replay() {
        let lifecycle = ConnectionLifecycle::new(
            Arc::new(ChannelStore::new()),
            Arc::new(BroadcastHub::new()),
            1,
        );
        assert_eq!(lifecycle.buffer(), Channel::COUNT);
    }

    #[test]
    fn replay_errors_keep_their_cause() {
        use std::error::Error as _;

        let id = ConnectionId::new();
        let enqueue = LifecycleError::ReplayEnqueue {
            id,
            source: TrySendError::Full(Frame::from(String::from("{}"))),
        };
        let cause = enqueue.source().unwrap();
        assert_eq!(cause.to_string(), TrySendError::Full(()).to_string());

        let encode = LifecycleError::ReplayEncode {
            id,
            source: serde_json::from_str::<serde_json::Value>("{").unwrap_err(),
        };
        assert!(encode.source().unwrap().is::<serde_json::Error>());
        assert!(encode.to_string().contains(&id.to_string()));
    }
}
