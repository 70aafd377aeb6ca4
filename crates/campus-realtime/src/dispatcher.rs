//! Frame dispatcher
//!
//! Resolves emission targets to live outbound queues. Holds the only mapping
//! from connection id to transport sender; the registry and groups stay
//! transport-free. A target with no live sender is logged and skipped -
//! delivery is best-effort end to end.

use dashmap::DashMap;
use serde::Serialize;
use serde_json::Value;
use std::sync::Arc;
use tokio::sync::mpsc;

use crate::connection::ConnectionId;
use crate::events::{EmitTarget, Emission, EventName};
use crate::groups::BroadcastGroups;

/// One outbound wire frame: `{"event": ..., "data": ...}`
#[derive(Debug, Clone, Serialize)]
pub struct OutboundFrame {
    pub event: String,
    pub data: Value,
}

impl OutboundFrame {
    #[must_use]
    pub fn new(event: EventName, data: Value) -> Self {
        Self {
            event: event.as_str().to_string(),
            data,
        }
    }
}

/// Fan-out of emissions onto per-connection outbound queues
pub struct FrameDispatcher {
    senders: DashMap<ConnectionId, mpsc::Sender<OutboundFrame>>,
    groups: Arc<BroadcastGroups>,
}

impl FrameDispatcher {
    #[must_use]
    pub fn new(groups: Arc<BroadcastGroups>) -> Self {
        Self {
            senders: DashMap::new(),
            groups,
        }
    }

    /// Attach a connection's outbound queue
    pub fn attach(&self, conn: ConnectionId, sender: mpsc::Sender<OutboundFrame>) {
        self.senders.insert(conn, sender);
    }

    /// Detach a connection's outbound queue; no-op when absent
    pub fn detach(&self, conn: &ConnectionId) {
        self.senders.remove(conn);
    }

    /// Number of attached connections
    pub fn connection_count(&self) -> usize {
        self.senders.len()
    }

    /// Deliver a batch of emissions in order
    pub async fn deliver(&self, emissions: Vec<Emission>) {
        for emission in emissions {
            self.deliver_one(emission).await;
        }
    }

    async fn deliver_one(&self, emission: Emission) {
        let Emission { target, event, payload } = emission;
        let frame = OutboundFrame::new(event, payload);

        // Resolve to concrete senders before awaiting; sends must not run
        // while map shards are held.
        let recipients: Vec<(ConnectionId, mpsc::Sender<OutboundFrame>)> = match &target {
            EmitTarget::Connection(conn) => self
                .senders
                .get(conn)
                .map(|s| vec![(conn.clone(), s.value().clone())])
                .unwrap_or_else(|| {
                    tracing::debug!(connection = %conn, event = %event, "No live sender, dropping");
                    Vec::new()
                }),
            EmitTarget::Group { group, exclude } => self
                .groups
                .members(group)
                .into_iter()
                .filter(|c| Some(c) != exclude.as_ref())
                .filter_map(|c| {
                    self.senders
                        .get(&c)
                        .map(|s| (c.clone(), s.value().clone()))
                })
                .collect(),
            EmitTarget::AllExcept(excluded) => self
                .senders
                .iter()
                .filter(|entry| entry.key() != excluded)
                .map(|entry| (entry.key().clone(), entry.value().clone()))
                .collect(),
        };

        let mut sent = 0;
        for (conn, sender) in recipients {
            if sender.send(frame.clone()).await.is_err() {
                tracing::debug!(connection = %conn, event = %event, "Receiver dropped, skipping");
            } else {
                sent += 1;
            }
        }

        tracing::trace!(event = %event, sent = sent, "Emission delivered");
    }
}

impl std::fmt::Debug for FrameDispatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FrameDispatcher")
            .field("connections", &self.senders.len())
            .finish()
    }
}
