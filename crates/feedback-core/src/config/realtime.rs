//! Hub and delivery queue configuration.

use serde::{Deserialize, Serialize};

/// Real-time hub configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RealtimeConfig {
    /// Capacity of each connection's outbound delivery queue. A connection
    /// whose queue is full when the hub enqueues is dropped.
    #[serde(default = "default_delivery_queue")]
    pub delivery_queue_capacity: usize,
    /// Capacity of each hub's command queue.
    #[serde(default = "default_hub_commands")]
    pub hub_command_capacity: usize,
    /// Channel id recorded on persisted chat messages.
    #[serde(default = "default_channel_id")]
    pub channel_id: String,
}

impl Default for RealtimeConfig {
    fn default() -> Self {
        Self {
            delivery_queue_capacity: default_delivery_queue(),
            hub_command_capacity: default_hub_commands(),
            channel_id: default_channel_id(),
        }
    }
}

fn default_delivery_queue() -> usize {
    256
}

fn default_hub_commands() -> usize {
    1024
}

fn default_channel_id() -> String {
    "global".to_string()
}
