//! Hub state machines.
//!
//! A hub is one task that owns a [`registry::Registry`] and handles
//! commands from its queue strictly in arrival order. The `*HubState`
//! types hold the pure transition logic; the `*Hub` types are cloneable
//! handles that feed the queue.

pub mod chat;
pub mod notification;
pub mod registry;

use tokio::sync::mpsc;

use feedback_core::error::AppError;

/// Sends a command to a hub task, failing if the hub has stopped.
pub(crate) async fn submit<C>(
    commands: &mpsc::Sender<C>,
    command: C,
    hub: &'static str,
) -> Result<(), AppError> {
    commands
        .send(command)
        .await
        .map_err(|_| AppError::service_unavailable(format!("{hub} hub is not running")))
}
