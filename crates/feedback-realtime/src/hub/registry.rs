//! Set of live connections for one hub.

use std::collections::HashMap;

use tracing::warn;

use crate::connection::handle::{ConnectionHandle, ConnectionId, DeliveryError, Frame};

/// Live connections keyed by id.
///
/// Removing a handle drops the only sender of its delivery queue, which
/// closes the queue. Only the owning hub task ever touches a registry.
#[derive(Debug, Default)]
pub struct Registry {
    connections: HashMap<ConnectionId, ConnectionHandle>,
}

/// Result of enqueuing one frame to many connections.
#[derive(Debug, Default)]
pub struct FanOut {
    /// Connections the frame was queued for.
    pub delivered: usize,
    /// Connections dropped because their queue was full or closed.
    pub dropped: Vec<ConnectionId>,
}

impl Registry {
    /// Create an empty registry.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub fn insert(&mut self, handle: ConnectionHandle) {
        self.connections.insert(handle.id, handle);
    }

    /// Remove a connection, closing its delivery queue. Absent ids are a no-op.
    pub fn remove(&mut self, id: &ConnectionId) -> Option<ConnectionHandle> {
        self.connections.remove(id)
    }

    /// Whether the connection is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.connections.contains_key(id)
    }

    /// Number of live connections.
    pub fn len(&self) -> usize {
        self.connections.len()
    }

    /// Whether no connections are registered.
    pub fn is_empty(&self) -> bool {
        self.connections.is_empty()
    }

    /// Enqueue one frame to a single connection, dropping it if it cannot keep up.
    pub fn deliver_to(&mut self, id: &ConnectionId, frame: Frame) -> Result<(), DeliveryError> {
        let Some(handle) = self.connections.get(id) else {
            return Err(DeliveryError::Closed);
        };
        let result = handle.try_deliver(frame);
        if let Err(reason) = result {
            self.drop_connection(id, reason);
        }
        result
    }

    /// Enqueue one frame to every connection.
    ///
    /// A connection whose queue is full (or already closed) is removed
    /// immediately; the rest still receive the frame.
    pub fn fan_out(&mut self, frame: &Frame) -> FanOut {
        let mut outcome = FanOut::default();
        let mut failed = Vec::new();

        for (id, handle) in &self.connections {
            match handle.try_deliver(frame.clone()) {
                Ok(()) => outcome.delivered += 1,
                Err(reason) => failed.push((*id, reason)),
            }
        }

        for (id, reason) in failed {
            self.drop_connection(&id, reason);
            outcome.dropped.push(id);
        }

        outcome
    }

    /// Remove every connection, closing all delivery queues.
    pub fn clear(&mut self) -> usize {
        let count = self.connections.len();
        self.connections.clear();
        count
    }

    fn drop_connection(&mut self, id: &ConnectionId, reason: DeliveryError) {
        if let Some(handle) = self.connections.remove(id) {
            warn!(
                conn_id = %id,
                user_id = %handle.identity.user_id,
                connected_at = %handle.connected_at,
                reason = %reason,
                "Dropping slow connection"
            );
        }
    }
}
