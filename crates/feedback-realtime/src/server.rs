//! Top-level real-time engine that owns both hubs and the persistence sink.

use std::fmt::Display;
use std::sync::Arc;

use axum::extract::ws::Message;
use futures::{Sink, Stream};
use tokio::sync::{Mutex, watch};
use tokio::task::JoinHandle;
use tracing::{info, warn};

use feedback_core::config::{PersistenceConfig, RealtimeConfig};
use feedback_core::error::AppError;
use feedback_database::MessageStore;

use crate::connection::handle::Identity;
use crate::connection::pump::run_session;
use crate::hub::chat::{ChatHub, ChatHubSnapshot};
use crate::hub::notification::{NotificationHub, NotificationHubSnapshot};
use crate::message::types::NotifMessage;
use crate::persistence::sink::PersistenceSink;

/// Explicitly started hubs plus the chat persistence sink.
pub struct RealtimeEngine {
    /// Chat hub handle.
    pub chat: ChatHub,
    /// Notification hub handle.
    pub notifications: NotificationHub,
    persistence: PersistenceSink,
    channel_id: String,
    shutdown_tx: watch::Sender<bool>,
    tasks: Mutex<Vec<JoinHandle<()>>>,
}

impl std::fmt::Debug for RealtimeEngine {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RealtimeEngine")
            .field("channel_id", &self.channel_id)
            .finish()
    }
}

impl RealtimeEngine {
    /// Spawn the hub tasks and the persistence dispatcher.
    pub fn start(
        realtime: &RealtimeConfig,
        persistence: &PersistenceConfig,
        store: Arc<dyn MessageStore>,
    ) -> Self {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);

        let (chat, chat_task) = ChatHub::spawn(realtime);
        let (notifications, notification_task) = NotificationHub::spawn(realtime);
        let (sink, sink_task) = PersistenceSink::spawn(persistence, store, shutdown_rx);

        info!(
            delivery_queue = realtime.delivery_queue_capacity,
            channel_id = %realtime.channel_id,
            "Real-time engine started"
        );

        Self {
            chat,
            notifications,
            persistence: sink,
            channel_id: realtime.channel_id.clone(),
            shutdown_tx,
            tasks: Mutex::new(vec![chat_task, notification_task, sink_task]),
        }
    }

    /// Register an authenticated socket with the chat hub and pump it until
    /// it disconnects.
    pub async fn serve_chat<W, E>(&self, socket: W, identity: Identity) -> Result<(), AppError>
    where
        W: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
        <W as Sink<Message>>::Error: Display,
        E: Display,
    {
        let (conn_id, queue) = self.chat.register(identity.clone()).await?;
        info!(conn_id = %conn_id, user_id = %identity.user_id, role = %identity.role, "Chat connection opened");

        let handler = self.chat.frame_handler(
            conn_id,
            identity,
            self.persistence.clone(),
            self.channel_id.as_str(),
        );
        run_session(conn_id, socket, queue, handler).await;

        info!(conn_id = %conn_id, "Chat connection closed");
        Ok(())
    }

    /// Register an authenticated socket with the notification hub and pump
    /// it until it disconnects.
    pub async fn serve_notifications<W, E>(
        &self,
        socket: W,
        identity: Identity,
    ) -> Result<(), AppError>
    where
        W: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
        <W as Sink<Message>>::Error: Display,
        E: Display,
    {
        let user_id = identity.user_id.clone();
        let (conn_id, queue) = self.notifications.register(identity).await?;
        info!(conn_id = %conn_id, user_id = %user_id, "Notification connection opened");

        let handler = self.notifications.frame_handler(conn_id);
        run_session(conn_id, socket, queue, handler).await;

        info!(conn_id = %conn_id, "Notification connection closed");
        Ok(())
    }

    /// Fire-and-forget notification to one user.
    pub async fn notify(&self, user_id: &str, message: NotifMessage) -> Result<(), AppError> {
        self.notifications.deliver(user_id, message).await
    }

    /// Chat hub state.
    pub async fn chat_snapshot(&self) -> Result<ChatHubSnapshot, AppError> {
        self.chat.snapshot().await
    }

    /// Notification hub state.
    pub async fn notification_snapshot(&self) -> Result<NotificationHubSnapshot, AppError> {
        self.notifications.snapshot().await
    }

    /// Stop both hubs, closing every connection, then drain persistence.
    pub async fn shutdown(&self) {
        info!("Shutting down real-time engine");

        self.chat.shutdown().await;
        self.notifications.shutdown().await;
        let _ = self.shutdown_tx.send(true);

        let tasks = std::mem::take(&mut *self.tasks.lock().await);
        for task in tasks {
            if let Err(e) = task.await {
                warn!(error = %e, "Real-time task ended abnormally");
            }
        }

        info!("Real-time engine stopped");
    }
}
