//! Bounded writer that stores chat messages off the delivery path.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::{Semaphore, mpsc, watch};
use tokio::task::JoinHandle;
use tracing::{debug, error, info, warn};

use feedback_core::config::PersistenceConfig;
use feedback_database::MessageStore;
use feedback_entity::message::PersistedMessage;

/// How long shutdown waits for in-flight writes.
const DRAIN_TIMEOUT: Duration = Duration::from_secs(10);

/// Handle used by chat connections to submit messages for storage.
///
/// Submitting never waits: when the queue is full the message is dropped
/// and a warning is logged.
#[derive(Debug, Clone)]
pub struct PersistenceSink {
    queue: mpsc::Sender<PersistedMessage>,
}

impl PersistenceSink {
    /// Spawn the dispatcher task. It stops when `shutdown` flips to `true`,
    /// after waiting for writes already in flight.
    pub fn spawn(
        config: &PersistenceConfig,
        store: Arc<dyn MessageStore>,
        shutdown: watch::Receiver<bool>,
    ) -> (Self, JoinHandle<()>) {
        let (sink, queue) = Self::with_capacity(config.queue_capacity);
        let task = tokio::spawn(dispatch(
            queue,
            store,
            config.max_concurrent_writes.max(1),
            shutdown,
        ));
        (sink, task)
    }

    fn with_capacity(capacity: usize) -> (Self, mpsc::Receiver<PersistedMessage>) {
        let (queue, rx) = mpsc::channel(capacity.max(1));
        (Self { queue }, rx)
    }

    /// Queue a message for storage. Returns `false` if it was dropped.
    pub fn submit(&self, message: PersistedMessage) -> bool {
        match self.queue.try_send(message) {
            Ok(()) => true,
            Err(mpsc::error::TrySendError::Full(message)) => {
                warn!(
                    message_id = %message.id,
                    sender_id = %message.sender_id,
                    "Persistence queue full, dropping chat message"
                );
                false
            }
            Err(mpsc::error::TrySendError::Closed(message)) => {
                debug!(message_id = %message.id, "Persistence sink stopped, dropping chat message");
                false
            }
        }
    }
}

async fn dispatch(
    mut queue: mpsc::Receiver<PersistedMessage>,
    store: Arc<dyn MessageStore>,
    max_concurrent: usize,
    mut shutdown: watch::Receiver<bool>,
) {
    info!(max_concurrent, "Persistence sink started");
    let semaphore = Arc::new(Semaphore::new(max_concurrent));

    loop {
        let message = tokio::select! {
            biased;
            message = queue.recv() => match message {
                Some(message) => message,
                None => break,
            },
            changed = shutdown.changed() => {
                if changed.is_err() || *shutdown.borrow() {
                    break;
                }
                continue;
            }
        };

        let Ok(permit) = semaphore.clone().acquire_owned().await else {
            break;
        };
        let store = Arc::clone(&store);

        tokio::spawn(async move {
            let _permit = permit;
            if let Err(e) = store.append(&message).await {
                error!(
                    message_id = %message.id,
                    channel_id = %message.channel_id,
                    error = %e,
                    "Failed to persist chat message"
                );
            }
        });
    }

    queue.close();
    let dropped = std::iter::from_fn(|| queue.try_recv().ok()).count();
    if dropped > 0 {
        warn!(dropped, "Persistence sink stopped with queued messages");
    }

    let permits = u32::try_from(max_concurrent).unwrap_or(u32::MAX);
    if tokio::time::timeout(DRAIN_TIMEOUT, semaphore.acquire_many(permits))
        .await
        .is_err()
    {
        warn!("Timed out waiting for in-flight chat writes");
    }
    info!("Persistence sink stopped");
}
