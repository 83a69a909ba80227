//! Hub-side handle to a single WebSocket connection.

use axum::extract::ws::Utf8Bytes;
use chrono::{DateTime, Utc};
use thiserror::Error;
use tokio::sync::{mpsc, oneshot};
use uuid::Uuid;

use feedback_entity::user::Role;

/// Unique connection identifier
pub type ConnectionId = Uuid;

/// A serialized outbound text frame. Cloning shares the buffer.
pub type Frame = Utf8Bytes;

/// Authenticated identity bound to a connection at upgrade time.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Identity {
    /// Opaque user id from the token.
    pub user_id: String,
    /// Role from the token.
    pub role: Role,
}

/// Why a frame could not be placed on a delivery queue.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Error)]
pub enum DeliveryError {
    /// The consumer is too slow; the queue is at capacity.
    #[error("delivery queue full")]
    Full,
    /// The send pump has already exited.
    #[error("delivery queue closed")]
    Closed,
}

/// The hub's routing reference to a connection.
///
/// The handle holds the only sender of the connection's delivery queue and
/// the session's release signal. Dropping it (which only the owning hub
/// does) closes the queue and tells the session to tear down, even if the
/// send pump is stuck writing to a stalled peer.
#[derive(Debug)]
pub struct ConnectionHandle {
    /// Unique connection ID
    pub id: ConnectionId,
    /// Who is on the other end
    pub identity: Identity,
    /// When the connection was established
    pub connected_at: DateTime<Utc>,
    sender: mpsc::Sender<Frame>,
    _release: oneshot::Sender<()>,
}

/// Session side of a connection: queued frames plus the release signal.
#[derive(Debug)]
pub struct DeliveryQueue {
    frames: mpsc::Receiver<Frame>,
    released: oneshot::Receiver<()>,
}

impl DeliveryQueue {
    /// Wait for the next frame. `None` once the hub has dropped the connection
    /// and the queue is drained.
    pub async fn recv(&mut self) -> Option<Frame> {
        self.frames.recv().await
    }

    /// Take a frame if one is queued.
    pub fn try_recv(&mut self) -> Result<Frame, mpsc::error::TryRecvError> {
        self.frames.try_recv()
    }

    /// Split into the frame receiver and the release signal, which resolves
    /// once the hub drops the handle.
    pub fn into_parts(self) -> (mpsc::Receiver<Frame>, oneshot::Receiver<()>) {
        (self.frames, self.released)
    }
}

impl ConnectionHandle {
    /// Create a handle and the receiving end of its delivery queue.
    pub fn new(identity: Identity, capacity: usize) -> (Self, DeliveryQueue) {
        let (sender, frames) = mpsc::channel(capacity.max(1));
        let (release, released) = oneshot::channel();
        let handle = Self {
            id: Uuid::new_v4(),
            identity,
            connected_at: Utc::now(),
            sender,
            _release: release,
        };
        (handle, DeliveryQueue { frames, released })
    }

    /// Enqueue a frame without waiting.
    pub fn try_deliver(&self, frame: Frame) -> Result<(), DeliveryError> {
        self.sender.try_send(frame).map_err(|e| match e {
            mpsc::error::TrySendError::Full(_) => DeliveryError::Full,
            mpsc::error::TrySendError::Closed(_) => DeliveryError::Closed,
        })
    }

    /// User id shortcut.
    pub fn user_id(&self) -> &str {
        &self.identity.user_id
    }
}
