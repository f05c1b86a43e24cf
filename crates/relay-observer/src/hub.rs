//! Fan-out of serialized events to every live observer.
//!
//! Each live connection is represented by the sending half of a bounded
//! queue. The connection's own `WebSocket` task drains the other half, so
//! the hub never awaits a socket write. A broadcast serializes the event
//! once and offers the same [`Frame`] to every queue with `try_send`:
//!
//! - queue has room: [`Delivery::Delivered`]
//! - queue is full (slow consumer): the frame is dropped for that
//!   connection only, [`Delivery::Dropped`]
//! - queue is closed (consumer gone): the connection is removed from the
//!   live set, [`Delivery::Closed`]
//!
//! None of these outcomes is an error for the caller.

use std::collections::HashMap;

use axum::extract::ws::Utf8Bytes;
use relay_types::{ChannelEvent, ConnectionId};
use tokio::sync::mpsc::error::TrySendError;
use tokio::sync::{mpsc, RwLock, RwLockWriteGuard};
use tracing::{debug, warn};

/// One serialized text frame, cheap to clone across connections.
pub type Frame = Utf8Bytes;

/// Serialize an event into a frame.
pub fn encode(event: &ChannelEvent) -> Result<Frame, serde_json::Error> {
    serde_json::to_string(event).map(Frame::from)
}

/// Outcome of offering one frame to one connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Queued for the connection's writer.
    Delivered,
    /// The connection's queue was full; this frame was skipped.
    Dropped,
    /// The connection had gone away and was removed.
    Closed,
}

/// Per-connection results of a single broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct BroadcastReport {
    /// Delivery outcome for each connection live at broadcast time.
    pub outcomes: Vec<(ConnectionId, Delivery)>,
}

impl BroadcastReport {
    /// Number of connections the frame was queued for.
    pub fn delivered(&self) -> usize {
        self.count(Delivery::Delivered)
    }

    /// Number of connections that skipped the frame because they lag.
    pub fn dropped(&self) -> usize {
        self.count(Delivery::Dropped)
    }

    /// Number of connections found closed and evicted.
    pub fn closed(&self) -> usize {
        self.count(Delivery::Closed)
    }

    fn count(&self, kind: Delivery) -> usize {
        self.outcomes.iter().filter(|(_, d)| *d == kind).count()
    }
}

/// The live connection set.
#[derive(Debug, Default)]
pub struct BroadcastHub {
    connections: RwLock<HashMap<ConnectionId, mpsc::Sender<Frame>>>,
}

impl BroadcastHub {
    /// Create a hub with no connections.
    pub fn new() -> Self {
        Self::default()
    }

    /// Serialize `event` once and offer it to every live connection.
    ///
    /// Never fails from the caller's point of view. A serialization
    /// failure is logged and yields an empty report.
    pub async fn broadcast(&self, event: &ChannelEvent) -> BroadcastReport {
        match encode(event) {
            Ok(frame) => self.fan_out(&frame).await,
            Err(e) => {
                warn!(channel = %event.channel, error = %e, "Failed to serialize channel event");
                BroadcastReport::default()
            }
        }
    }

    /// Offer an already-serialized frame to every live connection.
    pub async fn fan_out(&self, frame: &Frame) -> BroadcastReport {
        let outcomes: Vec<(ConnectionId, Delivery)> = {
            let connections = self.connections.read().await;
            connections
                .iter()
                .map(|(id, tx)| (*id, offer(tx, frame)))
                .collect()
        };

        let closed: Vec<ConnectionId> = outcomes
            .iter()
            .filter(|(_, d)| *d == Delivery::Closed)
            .map(|(id, _)| *id)
            .collect();
        if !closed.is_empty() {
            let mut connections = self.connections.write().await;
            for id in &closed {
                connections.remove(id);
            }
            debug!(evicted = closed.len(), "Removed closed observers during broadcast");
        }

        BroadcastReport { outcomes }
    }

    /// Take exclusive access to the live set to admit a new connection.
    ///
    /// While the returned [`Registration`] is held no broadcast can run,
    /// so anything queued to the new connection before
    /// [`Registration::admit`] is ordered ahead of every later broadcast.
    pub async fn begin_registration(&self) -> Registration<'_> {
        Registration {
            connections: self.connections.write().await,
        }
    }

    /// Remove a connection. Returns `false` if it was not live.
    pub async fn remove(&self, id: ConnectionId) -> bool {
        self.connections.write().await.remove(&id).is_some()
    }

    /// Number of live connections.
    pub async fn len(&self) -> usize {
        self.connections.read().await.len()
    }

    /// Whether no observer is connected.
    pub async fn is_empty(&self) -> bool {
        self.connections.read().await.is_empty()
    }
}

/// Exclusive hold on the live set, obtained from
/// [`BroadcastHub::begin_registration`].
pub struct Registration<'a> {
    connections: RwLockWriteGuard<'a, HashMap<ConnectionId, mpsc::Sender<Frame>>>,
}

impl Registration<'_> {
    /// Insert the connection into the live set and release the lock.
    ///
    /// Returns the live connection count after admission.
    pub fn admit(mut self, id: ConnectionId, sender: mpsc::Sender<Frame>) -> usize {
        self.connections.insert(id, sender);
        self.connections.len()
    }
}

fn offer(tx: &mpsc::Sender<Frame>, frame: &Frame) -> Delivery {
    match tx.try_send(frame.clone()) {
        Ok(()) => Delivery::Delivered,
        Err(TrySendError::Full(_)) => Delivery::Dropped,
        Err(TrySendError::Closed(_)) => Delivery::Closed,
    }
}
