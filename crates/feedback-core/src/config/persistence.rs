//! Chat persistence sink configuration.

use serde::{Deserialize, Serialize};

/// Bounds for the best-effort chat message writer.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PersistenceConfig {
    /// Messages waiting to be written. Submissions beyond this are dropped.
    #[serde(default = "default_queue_capacity")]
    pub queue_capacity: usize,
    /// Maximum number of writes in flight at once.
    #[serde(default = "default_max_concurrent_writes")]
    pub max_concurrent_writes: usize,
}

impl Default for PersistenceConfig {
    fn default() -> Self {
        Self {
            queue_capacity: default_queue_capacity(),
            max_concurrent_writes: default_max_concurrent_writes(),
        }
    }
}

fn default_queue_capacity() -> usize {
    1024
}

fn default_max_concurrent_writes() -> usize {
    8
}
