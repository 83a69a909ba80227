//! Wire message shapes for the chat and notification sockets.

pub mod types;

pub use types::{ChatKind, ChatMessage, InboundChatFrame, NotifKind, NotifMessage};
