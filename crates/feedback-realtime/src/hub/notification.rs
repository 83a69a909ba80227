//! Notification hub: targeted delivery to the newest connection of a user.

use std::collections::HashMap;

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, trace, warn};

use feedback_core::config::RealtimeConfig;
use feedback_core::error::AppError;

use crate::connection::handle::{
    ConnectionHandle, ConnectionId, DeliveryError, DeliveryQueue, Frame, Identity,
};
use crate::connection::pump::FrameHandler;
use crate::message::types::NotifMessage;

use super::registry::Registry;
use super::submit;

/// Commands processed by the notification hub task.
#[derive(Debug)]
pub enum NotificationCommand {
    /// Add a connection and index it under its user id.
    Register(ConnectionHandle),
    /// Remove a connection and close its queue.
    Unregister(ConnectionId),
    /// Send a notification to one user's indexed connection.
    Deliver {
        /// Target user id.
        user_id: String,
        /// Payload.
        message: NotifMessage,
    },
    /// Report registry and index sizes.
    Snapshot(oneshot::Sender<NotificationHubSnapshot>),
    /// Close every connection and stop the task.
    Shutdown,
}

/// Point-in-time view of the notification hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct NotificationHubSnapshot {
    /// Registered connections, including superseded ones.
    pub connections: usize,
    /// Users with an indexed connection.
    pub indexed_users: usize,
}

/// What a targeted delivery did.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum DeliveryOutcome {
    /// Queued for the target's connection.
    Delivered(ConnectionId),
    /// The user has no indexed connection.
    NoTarget,
    /// The target's queue was full or closed; the connection was dropped.
    Dropped(ConnectionId),
}

/// Notification hub state, owned by exactly one task.
#[derive(Debug, Default)]
pub struct NotificationHubState {
    registry: Registry,
    index: HashMap<String, ConnectionId>,
}

impl NotificationHubState {
    /// An empty hub.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection; it replaces any earlier index entry for the same user.
    pub fn register(&mut self, handle: ConnectionHandle) -> Option<ConnectionId> {
        let previous = self.index.insert(handle.user_id().to_string(), handle.id);
        self.registry.insert(handle);
        previous
    }

    /// Remove a connection. The index entry goes too, unless a newer
    /// connection has already taken it over.
    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        let Some(handle) = self.registry.remove(id) else {
            return false;
        };
        self.unindex(handle.user_id(), id);
        true
    }

    /// Enqueue a notification for one user.
    pub fn deliver(&mut self, user_id: &str, message: &NotifMessage) -> Result<DeliveryOutcome, AppError> {
        let Some(&conn_id) = self.index.get(user_id) else {
            return Ok(DeliveryOutcome::NoTarget);
        };

        let frame = Frame::from(serde_json::to_string(message)?);
        match self.registry.deliver_to(&conn_id, frame) {
            Ok(()) => Ok(DeliveryOutcome::Delivered(conn_id)),
            Err(DeliveryError::Full | DeliveryError::Closed) => {
                self.unindex(user_id, &conn_id);
                Ok(DeliveryOutcome::Dropped(conn_id))
            }
        }
    }

    /// Connection currently indexed for a user.
    pub fn target(&self, user_id: &str) -> Option<ConnectionId> {
        self.index.get(user_id).copied()
    }

    /// Whether the connection is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.registry.contains(id)
    }

    /// Current registry and index sizes.
    pub fn snapshot(&self) -> NotificationHubSnapshot {
        NotificationHubSnapshot {
            connections: self.registry.len(),
            indexed_users: self.index.len(),
        }
    }

    /// Close every connection and clear the index.
    pub fn close_all(&mut self) -> usize {
        self.index.clear();
        self.registry.clear()
    }

    fn unindex(&mut self, user_id: &str, id: &ConnectionId) {
        if self.index.get(user_id) == Some(id) {
            self.index.remove(user_id);
        }
    }
}

/// Cloneable handle to the notification hub task.
#[derive(Debug, Clone)]
pub struct NotificationHub {
    commands: mpsc::Sender<NotificationCommand>,
    delivery_capacity: usize,
}

impl NotificationHub {
    /// Spawn the hub task.
    pub fn spawn(config: &RealtimeConfig) -> (Self, JoinHandle<()>) {
        let (commands, rx) = mpsc::channel(config.hub_command_capacity.max(1));
        let task = tokio::spawn(run(rx));
        let hub = Self {
            commands,
            delivery_capacity: config.delivery_queue_capacity,
        };
        (hub, task)
    }

    /// Register a new connection and return the receiving end of its queue.
    pub async fn register(
        &self,
        identity: Identity,
    ) -> Result<(ConnectionId, DeliveryQueue), AppError> {
        let (handle, queue) = ConnectionHandle::new(identity, self.delivery_capacity);
        let id = handle.id;
        submit(&self.commands, NotificationCommand::Register(handle), "Notification").await?;
        Ok((id, queue))
    }

    /// Unregister a connection. Unknown ids are ignored by the hub.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), AppError> {
        submit(&self.commands, NotificationCommand::Unregister(id), "Notification").await
    }

    /// Queue a notification for a user. Completes without confirming delivery.
    pub async fn deliver(
        &self,
        user_id: impl Into<String>,
        message: NotifMessage,
    ) -> Result<(), AppError> {
        let command = NotificationCommand::Deliver {
            user_id: user_id.into(),
            message,
        };
        submit(&self.commands, command, "Notification").await
    }

    /// Ask the hub for its current state.
    pub async fn snapshot(&self) -> Result<NotificationHubSnapshot, AppError> {
        let (tx, rx) = oneshot::channel();
        submit(&self.commands, NotificationCommand::Snapshot(tx), "Notification").await?;
        rx.await
            .map_err(|_| AppError::service_unavailable("Notification hub is not running"))
    }

    /// Stop the hub, closing every connection's queue.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(NotificationCommand::Shutdown).await;
    }

    /// Inbound frame handler for one notification connection.
    pub fn frame_handler(&self, conn_id: ConnectionId) -> NotificationFrameHandler {
        NotificationFrameHandler {
            conn_id,
            hub: self.clone(),
        }
    }
}

async fn run(mut commands: mpsc::Receiver<NotificationCommand>) {
    let mut state = NotificationHubState::new();
    info!("Notification hub started");

    while let Some(command) = commands.recv().await {
        match command {
            NotificationCommand::Register(handle) => {
                let conn_id = handle.id;
                let user_id = handle.user_id().to_string();
                if let Some(previous) = state.register(handle) {
                    debug!(conn_id = %conn_id, previous = %previous, user_id = %user_id, "Notification connection superseded");
                } else {
                    debug!(conn_id = %conn_id, user_id = %user_id, "Notification connection registered");
                }
            }
            NotificationCommand::Unregister(id) => {
                if state.unregister(&id) {
                    debug!(conn_id = %id, "Notification connection unregistered");
                }
            }
            NotificationCommand::Deliver { user_id, message } => {
                match state.deliver(&user_id, &message) {
                    Ok(DeliveryOutcome::Delivered(conn_id)) => {
                        debug!(conn_id = %conn_id, user_id = %user_id, "Notification queued");
                    }
                    Ok(DeliveryOutcome::NoTarget) => {
                        debug!(user_id = %user_id, "No connection for notification target");
                    }
                    Ok(DeliveryOutcome::Dropped(conn_id)) => {
                        warn!(conn_id = %conn_id, user_id = %user_id, "Notification target dropped");
                    }
                    Err(e) => error!(error = %e, "Failed to serialize notification"),
                }
            }
            NotificationCommand::Snapshot(reply) => {
                let _ = reply.send(state.snapshot());
            }
            NotificationCommand::Shutdown => break,
        }
    }

    let closed = state.close_all();
    info!(closed, "Notification hub stopped");
}

/// Notification connections are push-only; inbound text is ignored.
#[derive(Debug)]
pub struct NotificationFrameHandler {
    conn_id: ConnectionId,
    hub: NotificationHub,
}

#[async_trait]
impl FrameHandler for NotificationFrameHandler {
    async fn on_text(&self, _text: &str) {
        trace!(conn_id = %self.conn_id, "Ignoring inbound frame on notification connection");
    }

    async fn on_disconnect(&self) {
        if let Err(e) = self.hub.unregister(self.conn_id).await {
            debug!(conn_id = %self.conn_id, error = %e, "Unregister after hub stop");
        }
    }
}
