//! Per-connection send and receive pumps.
//!
//! The send pump drains the delivery queue onto the socket. The receive
//! pump reads frames and hands text to a [`FrameHandler`]. Either pump
//! ending, or the hub dropping the connection, tears the session down and
//! unregisters it.

use std::fmt::Display;
use std::time::Duration;

use async_trait::async_trait;
use axum::extract::ws::Message;
use futures::{Sink, SinkExt, Stream, StreamExt};
use tokio::sync::mpsc;
use tracing::{debug, trace};

use super::handle::{ConnectionId, DeliveryQueue, Frame};

/// How long a released session lets the send pump flush and close the
/// socket before aborting it.
const RELEASE_GRACE: Duration = Duration::from_millis(500);

/// Hub-specific handling of inbound frames and disconnects.
#[async_trait]
pub trait FrameHandler: Send + Sync {
    /// Called for every inbound text frame, in arrival order.
    async fn on_text(&self, text: &str);

    /// Called once when the session ends, whichever pump stopped first.
    async fn on_disconnect(&self);
}

/// Writes queued frames to the socket in FIFO order.
///
/// Returns when the queue is closed by the hub or a write fails; the sink
/// is closed either way.
pub async fn send_pump<S>(conn_id: ConnectionId, mut queue: mpsc::Receiver<Frame>, mut sink: S)
where
    S: Sink<Message> + Unpin,
    S::Error: Display,
{
    while let Some(frame) = queue.recv().await {
        if let Err(e) = sink.send(Message::Text(frame)).await {
            debug!(conn_id = %conn_id, error = %e, "WebSocket write failed");
            break;
        }
    }

    if let Err(e) = sink.close().await {
        trace!(conn_id = %conn_id, error = %e, "WebSocket close failed");
    }
}

/// Reads frames until the peer closes or the stream errors.
///
/// Text frames (and binary frames holding valid UTF-8) go to the handler;
/// everything else is ignored. Transport errors end the loop quietly.
pub async fn receive_pump<S, E, H>(conn_id: ConnectionId, mut stream: S, handler: &H)
where
    S: Stream<Item = Result<Message, E>> + Unpin,
    E: Display,
    H: FrameHandler + ?Sized,
{
    while let Some(result) = stream.next().await {
        match result {
            Ok(Message::Text(text)) => handler.on_text(text.as_str()).await,
            Ok(Message::Binary(bytes)) => match std::str::from_utf8(&bytes) {
                Ok(text) => handler.on_text(text).await,
                Err(_) => trace!(conn_id = %conn_id, "Ignoring non-UTF-8 binary frame"),
            },
            Ok(Message::Close(_)) => break,
            Ok(_) => {}
            Err(e) => {
                debug!(conn_id = %conn_id, error = %e, "WebSocket read failed");
                break;
            }
        }
    }
}

/// Runs both pumps for a registered connection until either one stops or
/// the hub releases the connection.
///
/// On release the receive pump stops at once, so a dropped connection can
/// no longer reach the hub. The send pump gets [`RELEASE_GRACE`] to close
/// the socket and is aborted after that.
pub async fn run_session<W, E, H>(
    conn_id: ConnectionId,
    socket: W,
    queue: DeliveryQueue,
    handler: H,
) where
    W: Stream<Item = Result<Message, E>> + Sink<Message> + Send + 'static,
    <W as Sink<Message>>::Error: Display,
    E: Display,
    H: FrameHandler,
{
    let (frames, mut released) = queue.into_parts();
    let (sink, stream) = socket.split();
    let mut send_task = tokio::spawn(send_pump(conn_id, frames, sink));

    let receive = receive_pump(conn_id, stream, &handler);
    tokio::pin!(receive);

    tokio::select! {
        _ = &mut receive => {
            trace!(conn_id = %conn_id, "Receive pump finished");
        }
        _ = &mut send_task => {
            trace!(conn_id = %conn_id, "Send pump finished");
        }
        _ = &mut released => {
            debug!(conn_id = %conn_id, "Connection released by hub");
            if tokio::time::timeout(RELEASE_GRACE, &mut send_task).await.is_err() {
                send_task.abort();
                debug!(conn_id = %conn_id, "Send pump aborted on stalled socket");
            }
        }
    }

    // Unregistering drops the hub's handle, which closes the queue and lets
    // a still-running send pump drain and close the socket. Already-released
    // connections make this a no-op.
    handler.on_disconnect().await;
}
