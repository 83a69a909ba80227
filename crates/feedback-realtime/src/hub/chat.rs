//! Chat hub: broadcast with an admin-controlled gate on staff messages.

use async_trait::async_trait;
use serde::Serialize;
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use feedback_core::config::RealtimeConfig;
use feedback_core::error::AppError;
use feedback_entity::message::PersistedMessage;

use crate::connection::handle::{ConnectionHandle, ConnectionId, DeliveryQueue, Frame, Identity};
use crate::connection::pump::FrameHandler;
use crate::message::types::{ChatKind, ChatMessage, InboundChatFrame};
use crate::persistence::sink::PersistenceSink;

use super::registry::Registry;
use super::submit;

/// Commands processed by the chat hub task.
#[derive(Debug)]
pub enum ChatCommand {
    /// Add a connection.
    Register(ConnectionHandle),
    /// Remove a connection and close its queue.
    Unregister(ConnectionId),
    /// Apply gate policy and fan a message out.
    Broadcast(ChatMessage),
    /// Report registry size and gate state.
    Snapshot(oneshot::Sender<ChatHubSnapshot>),
    /// Close every connection and stop the task.
    Shutdown,
}

/// Point-in-time view of the chat hub.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct ChatHubSnapshot {
    /// Registered connections.
    pub connections: usize,
    /// Whether staff messages are currently delivered.
    pub chat_open: bool,
}

/// What a broadcast command did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BroadcastOutcome {
    /// An admin command was consumed; `open` is the resulting gate state.
    Control {
        /// Gate state after the command.
        open: bool,
    },
    /// A staff message arrived while the gate was closed.
    Gated,
    /// The message was queued for `delivered` connections; `dropped` slow
    /// connections were removed.
    Sent {
        /// Connections the message was queued for.
        delivered: usize,
        /// Connections removed for being too slow.
        dropped: usize,
    },
}

/// Chat hub state, owned by exactly one task.
#[derive(Debug, Default)]
pub struct ChatHubState {
    registry: Registry,
    chat_open: bool,
}

impl ChatHubState {
    /// A hub with no connections and the gate closed.
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a connection.
    pub fn register(&mut self, handle: ConnectionHandle) {
        self.registry.insert(handle);
    }

    /// Remove a connection. Returns `false` if it was not registered.
    pub fn unregister(&mut self, id: &ConnectionId) -> bool {
        self.registry.remove(id).is_some()
    }

    /// Apply the gate policy to one message and fan it out if eligible.
    pub fn broadcast(&mut self, msg: &ChatMessage) -> Result<BroadcastOutcome, AppError> {
        if msg.is_admin_command() {
            if let Some(open) = msg.gate_command() {
                self.chat_open = open;
            }
            return Ok(BroadcastOutcome::Control {
                open: self.chat_open,
            });
        }

        if msg.role.is_staff() && !self.chat_open {
            return Ok(BroadcastOutcome::Gated);
        }

        let frame = Frame::from(serde_json::to_string(msg)?);
        let fan_out = self.registry.fan_out(&frame);
        Ok(BroadcastOutcome::Sent {
            delivered: fan_out.delivered,
            dropped: fan_out.dropped.len(),
        })
    }

    /// Whether staff messages are currently delivered.
    pub fn is_open(&self) -> bool {
        self.chat_open
    }

    /// Whether the connection is registered.
    pub fn contains(&self, id: &ConnectionId) -> bool {
        self.registry.contains(id)
    }

    /// Current registry size and gate state.
    pub fn snapshot(&self) -> ChatHubSnapshot {
        ChatHubSnapshot {
            connections: self.registry.len(),
            chat_open: self.chat_open,
        }
    }

    /// Close every connection.
    pub fn close_all(&mut self) -> usize {
        self.registry.clear()
    }
}

/// Cloneable handle to the chat hub task.
#[derive(Debug, Clone)]
pub struct ChatHub {
    commands: mpsc::Sender<ChatCommand>,
    delivery_capacity: usize,
}

impl ChatHub {
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
        submit(&self.commands, ChatCommand::Register(handle), "Chat").await?;
        Ok((id, queue))
    }

    /// Unregister a connection. Unknown ids are ignored by the hub.
    pub async fn unregister(&self, id: ConnectionId) -> Result<(), AppError> {
        submit(&self.commands, ChatCommand::Unregister(id), "Chat").await
    }

    /// Submit a stamped message for gating and fan-out.
    pub async fn broadcast(&self, msg: ChatMessage) -> Result<(), AppError> {
        submit(&self.commands, ChatCommand::Broadcast(msg), "Chat").await
    }

    /// Ask the hub for its current state.
    pub async fn snapshot(&self) -> Result<ChatHubSnapshot, AppError> {
        let (tx, rx) = oneshot::channel();
        submit(&self.commands, ChatCommand::Snapshot(tx), "Chat").await?;
        rx.await
            .map_err(|_| AppError::service_unavailable("Chat hub is not running"))
    }

    /// Stop the hub, closing every connection's queue.
    pub async fn shutdown(&self) {
        let _ = self.commands.send(ChatCommand::Shutdown).await;
    }

    /// Inbound frame handler for one chat connection.
    pub fn frame_handler(
        &self,
        conn_id: ConnectionId,
        identity: Identity,
        persistence: PersistenceSink,
        channel_id: impl Into<String>,
    ) -> ChatFrameHandler {
        ChatFrameHandler {
            conn_id,
            identity,
            hub: self.clone(),
            persistence,
            channel_id: channel_id.into(),
        }
    }
}

async fn run(mut commands: mpsc::Receiver<ChatCommand>) {
    let mut state = ChatHubState::new();
    info!("Chat hub started");

    while let Some(command) = commands.recv().await {
        match command {
            ChatCommand::Register(handle) => {
                debug!(
                    conn_id = %handle.id,
                    user_id = %handle.identity.user_id,
                    role = %handle.identity.role,
                    "Chat connection registered"
                );
                state.register(handle);
            }
            ChatCommand::Unregister(id) => {
                if state.unregister(&id) {
                    debug!(conn_id = %id, "Chat connection unregistered");
                }
            }
            ChatCommand::Broadcast(msg) => match state.broadcast(&msg) {
                Ok(BroadcastOutcome::Control { open }) => {
                    info!(sender = %msg.sender, content = %msg.content, chat_open = open, "Admin chat command");
                }
                Ok(BroadcastOutcome::Gated) => {
                    debug!(sender = %msg.sender, "Staff message suppressed while chat is closed");
                }
                Ok(BroadcastOutcome::Sent { delivered, dropped }) => {
                    if dropped > 0 {
                        warn!(delivered, dropped, "Chat broadcast dropped slow connections");
                    }
                }
                Err(e) => error!(error = %e, "Failed to serialize chat message"),
            },
            ChatCommand::Snapshot(reply) => {
                let _ = reply.send(state.snapshot());
            }
            ChatCommand::Shutdown => break,
        }
    }

    let closed = state.close_all();
    info!(closed, "Chat hub stopped");
}

/// Routes a chat connection's inbound frames to persistence and the hub.
#[derive(Debug)]
pub struct ChatFrameHandler {
    conn_id: ConnectionId,
    identity: Identity,
    hub: ChatHub,
    persistence: PersistenceSink,
    channel_id: String,
}

#[async_trait]
impl FrameHandler for ChatFrameHandler {
    async fn on_text(&self, text: &str) {
        let frame = match InboundChatFrame::parse(text) {
            Ok(frame) => frame,
            Err(e) => {
                debug!(conn_id = %self.conn_id, error = %e, "Discarding undecodable chat frame");
                return;
            }
        };

        let msg = frame.stamp(&self.identity);

        if msg.kind == ChatKind::Msg {
            self.persistence.submit(PersistedMessage::new(
                self.channel_id.as_str(),
                msg.sender.as_str(),
                msg.role,
                msg.content.as_str(),
            ));
        }

        if let Err(e) = self.hub.broadcast(msg).await {
            warn!(conn_id = %self.conn_id, error = %e, "Chat message not delivered");
        }
    }

    async fn on_disconnect(&self) {
        if let Err(e) = self.hub.unregister(self.conn_id).await {
            debug!(conn_id = %self.conn_id, error = %e, "Unregister after hub stop");
        }
    }
}

#[cfg(test)]
mod tests {
    use feedback_entity::user::Role;

    use super::*;

    fn identity(user: &str, role: Role) -> Identity {
        Identity {
            user_id: user.to_string(),
            role,
        }
    }

    fn msg(kind: ChatKind, content: &str, sender: &str, role: Role) -> ChatMessage {
        ChatMessage {
            kind,
            content: content.to_string(),
            sender: sender.to_string(),
            role,
        }
    }

    fn connect(state: &mut ChatHubState, user: &str, role: Role) -> DeliveryQueue {
        let (handle, rx) = ConnectionHandle::new(identity(user, role), 16);
        state.register(handle);
        rx
    }

    #[test]
    fn test_gate_defaults_closed() {
        assert!(!ChatHubState::new().is_open());
    }

    #[test]
    fn test_staff_message_suppressed_while_closed() {
        let mut state = ChatHubState::new();
        let mut rx = connect(&mut state, "u1", Role::User);

        let outcome = state
            .broadcast(&msg(ChatKind::Msg, "hi", "s1", Role::Staff))
            .unwrap();

        assert_eq!(outcome, BroadcastOutcome::Gated);
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_admin_and_user_messages_pass_closed_gate() {
        let mut state = ChatHubState::new();
        let mut rx = connect(&mut state, "u1", Role::User);

        for role in [Role::Admin, Role::User] {
            let outcome = state
                .broadcast(&msg(ChatKind::Msg, "hello", "x", role))
                .unwrap();
            assert_eq!(
                outcome,
                BroadcastOutcome::Sent {
                    delivered: 1,
                    dropped: 0
                }
            );
        }
        assert!(rx.try_recv().is_ok());
        assert!(rx.try_recv().is_ok());
    }

    #[test]
    fn test_open_close_scenario() {
        let mut state = ChatHubState::new();
        let mut staff_rx = connect(&mut state, "s1", Role::Staff);
        let mut user_rx = connect(&mut state, "u1", Role::User);
        let hi = msg(ChatKind::Msg, "hi", "s1", Role::Staff);

        state.broadcast(&hi).unwrap();
        assert!(staff_rx.try_recv().is_err());
        assert!(user_rx.try_recv().is_err());

        let open = state
            .broadcast(&msg(ChatKind::Cmd, "open", "a1", Role::Admin))
            .unwrap();
        assert_eq!(open, BroadcastOutcome::Control { open: true });
        assert!(state.is_open());
        assert!(staff_rx.try_recv().is_err());
        assert!(user_rx.try_recv().is_err());

        state.broadcast(&hi).unwrap();
        let expected = r#"{"type":"msg","content":"hi","sender":"s1","role":"staff"}"#;
        assert_eq!(staff_rx.try_recv().unwrap().as_str(), expected);
        assert_eq!(user_rx.try_recv().unwrap().as_str(), expected);

        state
            .broadcast(&msg(ChatKind::Cmd, "close", "a1", Role::Admin))
            .unwrap();
        assert!(!state.is_open());
        assert_eq!(state.broadcast(&hi).unwrap(), BroadcastOutcome::Gated);
    }

    #[test]
    fn test_unknown_admin_command_is_swallowed() {
        let mut state = ChatHubState::new();
        let mut rx = connect(&mut state, "u1", Role::User);

        let outcome = state
            .broadcast(&msg(ChatKind::Cmd, "reboot", "a1", Role::Admin))
            .unwrap();

        assert_eq!(outcome, BroadcastOutcome::Control { open: false });
        assert!(rx.try_recv().is_err());
    }

    #[test]
    fn test_non_admin_command_is_not_a_gate_change() {
        let mut state = ChatHubState::new();
        let mut rx = connect(&mut state, "u1", Role::User);

        state
            .broadcast(&msg(ChatKind::Cmd, "open", "u1", Role::User))
            .unwrap();
        assert!(!state.is_open());
        assert!(rx.try_recv().is_ok());

        let staff_cmd = state
            .broadcast(&msg(ChatKind::Cmd, "open", "s1", Role::Staff))
            .unwrap();
        assert_eq!(staff_cmd, BroadcastOutcome::Gated);
        assert!(!state.is_open());
    }

    #[test]
    fn test_slow_consumer_is_dropped() {
        let mut state = ChatHubState::new();
        let (slow, _slow_rx) = ConnectionHandle::new(identity("slow", Role::User), 1);
        let slow_id = slow.id;
        state.register(slow);
        let mut fast_rx = connect(&mut state, "fast", Role::User);

        let m = msg(ChatKind::Msg, "x", "a1", Role::Admin);
        state.broadcast(&m).unwrap();
        let outcome = state.broadcast(&m).unwrap();

        assert_eq!(
            outcome,
            BroadcastOutcome::Sent {
                delivered: 1,
                dropped: 1
            }
        );
        assert!(!state.contains(&slow_id));
        assert_eq!(state.snapshot().connections, 1);
        assert!(fast_rx.try_recv().is_ok());
        assert!(fast_rx.try_recv().is_ok());
    }

    #[test]
    fn test_register_unregister_any_order() {
        let mut state = ChatHubState::new();
        let handles: Vec<_> = (0..5)
            .map(|i| ConnectionHandle::new(identity(&format!("u{i}"), Role::User), 4))
            .collect();
        let ids: Vec<_> = handles.iter().map(|(h, _)| h.id).collect();
        let mut receivers = Vec::new();
        for (handle, rx) in handles {
            state.register(handle);
            receivers.push(rx);
        }

        assert!(state.unregister(&ids[3]));
        assert!(state.unregister(&ids[0]));
        assert!(!state.unregister(&ids[3]));

        assert_eq!(state.snapshot().connections, 3);
        for id in [&ids[1], &ids[2], &ids[4]] {
            assert!(state.contains(id));
        }
    }

    #[tokio::test]
    async fn test_hub_task_serializes_commands() {
        let (hub, task) = ChatHub::spawn(&RealtimeConfig::default());

        let (staff_id, mut staff_rx) = hub.register(identity("s1", Role::Staff)).await.unwrap();
        let (_user_id, mut user_rx) = hub.register(identity("u1", Role::User)).await.unwrap();

        hub.broadcast(msg(ChatKind::Msg, "early", "s1", Role::Staff))
            .await
            .unwrap();
        hub.broadcast(msg(ChatKind::Cmd, "open", "a1", Role::Admin))
            .await
            .unwrap();
        hub.broadcast(msg(ChatKind::Msg, "late", "s1", Role::Staff))
            .await
            .unwrap();

        let snapshot = hub.snapshot().await.unwrap();
        assert_eq!(
            snapshot,
            ChatHubSnapshot {
                connections: 2,
                chat_open: true
            }
        );

        let frame = user_rx.recv().await.unwrap();
        assert!(frame.as_str().contains("\"late\""));
        assert!(user_rx.try_recv().is_err());

        hub.unregister(staff_id).await.unwrap();
        assert!(staff_rx.recv().await.is_some());
        assert!(staff_rx.recv().await.is_none());

        hub.shutdown().await;
        task.await.unwrap();
        assert!(user_rx.recv().await.is_none());
        assert!(hub.snapshot().await.is_err());
    }

    #[tokio::test(flavor = "multi_thread", worker_threads = 4)]
    async fn test_concurrent_register_unregister() {
        let (hub, task) = ChatHub::spawn(&RealtimeConfig::default());

        let workers: Vec<_> = (0..60)
            .map(|i| {
                let hub = hub.clone();
                tokio::spawn(async move {
                    let (id, queue) = hub
                        .register(identity(&format!("u{i}"), Role::User))
                        .await
                        .unwrap();
                    let keep = i % 3 == 0;
                    if !keep {
                        hub.unregister(id).await.unwrap();
                        if i % 2 == 0 {
                            hub.unregister(id).await.unwrap();
                        }
                    }
                    (keep, queue)
                })
            })
            .collect();

        // Unregister racing the register of the same id.
        let racers: Vec<_> = (0..20)
            .map(|i| {
                let (handle, queue) =
                    ConnectionHandle::new(identity(&format!("r{i}"), Role::User), 4);
                let id = handle.id;
                let register = {
                    let commands = hub.commands.clone();
                    tokio::spawn(async move { commands.send(ChatCommand::Register(handle)).await })
                };
                let unregister = {
                    let commands = hub.commands.clone();
                    tokio::spawn(async move { commands.send(ChatCommand::Unregister(id)).await })
                };
                (id, queue, register, unregister)
            })
            .collect();

        let mut kept = Vec::new();
        let mut removed = Vec::new();
        for worker in workers {
            let (keep, queue) = worker.await.unwrap();
            if keep {
                kept.push(queue);
            } else {
                removed.push(queue);
            }
        }
        for (id, queue, register, unregister) in racers {
            register.await.unwrap().unwrap();
            unregister.await.unwrap().unwrap();
            hub.unregister(id).await.unwrap();
            removed.push(queue);
        }

        assert_eq!(hub.snapshot().await.unwrap().connections, kept.len());
        for queue in &mut removed {
            assert!(queue.recv().await.is_none());
        }
        for queue in &mut kept {
            assert!(matches!(
                queue.try_recv(),
                Err(mpsc::error::TryRecvError::Empty)
            ));
        }

        hub.shutdown().await;
        task.await.unwrap();
    }
}
