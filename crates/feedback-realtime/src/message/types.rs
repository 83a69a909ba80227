//! Inbound and outbound WebSocket message type definitions.

use serde::{Deserialize, Serialize};

use feedback_entity::user::Role;

use crate::connection::handle::Identity;

/// Title used for notifications raised without one.
pub const DEFAULT_NOTIFICATION_TITLE: &str = "Alert";

/// Kind of a chat frame.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatKind {
    /// Ordinary chat text.
    Msg,
    /// Control command; only admin commands change the gate.
    Cmd,
}

/// A chat message as broadcast to clients.
///
/// `sender` and `role` always come from the authenticated connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Frame kind.
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Text body, or `"open"` / `"close"` for gate commands.
    pub content: String,
    /// Sender user id.
    pub sender: String,
    /// Sender role.
    pub role: Role,
}

impl ChatMessage {
    /// Returns `Some(open)` if this is an admin gate command.
    pub fn gate_command(&self) -> Option<bool> {
        if !(self.role.is_admin() && self.kind == ChatKind::Cmd) {
            return None;
        }
        match self.content.as_str() {
            "open" => Some(true),
            "close" => Some(false),
            _ => None,
        }
    }

    /// Whether this is an admin control message (never forwarded).
    pub fn is_admin_command(&self) -> bool {
        self.role.is_admin() && self.kind == ChatKind::Cmd
    }
}

/// A chat frame as read from the wire.
///
/// Any `sender` or `role` fields the client sends are ignored.
#[derive(Debug, Clone, Deserialize)]
pub struct InboundChatFrame {
    /// Frame kind.
    #[serde(rename = "type")]
    pub kind: ChatKind,
    /// Text body.
    #[serde(default)]
    pub content: String,
}

impl InboundChatFrame {
    /// Decode a text frame.
    pub fn parse(text: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(text)
    }

    /// Attach the authenticated identity of the connection it arrived on.
    pub fn stamp(self, identity: &Identity) -> ChatMessage {
        ChatMessage {
            kind: self.kind,
            content: self.content,
            sender: identity.user_id.clone(),
            role: identity.role,
        }
    }
}

/// Notification severity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum NotifKind {
    /// Informational.
    #[default]
    Info,
    /// Error.
    Error,
}

/// A notification pushed to one user's connection.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct NotifMessage {
    /// Title.
    pub title: String,
    /// Body.
    pub content: String,
    /// Severity.
    #[serde(rename = "type")]
    pub kind: NotifKind,
}

impl NotifMessage {
    /// An informational notification with the default title.
    pub fn alert(content: impl Into<String>) -> Self {
        Self {
            title: DEFAULT_NOTIFICATION_TITLE.to_string(),
            content: content.into(),
            kind: NotifKind::Info,
        }
    }
}
