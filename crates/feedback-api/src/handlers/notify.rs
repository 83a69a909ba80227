//! Internal notification trigger.
//!
//! Callers get the same answer whatever they send: the body is parsed
//! leniently and the content type is not checked.

use axum::Json;
use axum::body::Bytes;
use axum::extract::State;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use feedback_realtime::message::{NotifKind, NotifMessage};
use feedback_realtime::message::types::DEFAULT_NOTIFICATION_TITLE;

use crate::state::AppState;

/// Body of an internal notification trigger.
#[derive(Debug, Default, Deserialize)]
pub struct NotifyRequest {
    /// User to notify.
    #[serde(default)]
    pub target_id: String,
    /// Notification body.
    #[serde(default)]
    pub content: String,
    /// Title, `"Alert"` when omitted.
    #[serde(default)]
    pub title: Option<String>,
    /// Severity, `"info"` when omitted.
    #[serde(default, rename = "type")]
    pub kind: Option<NotifKind>,
}

/// Trigger acknowledgement. Never reveals whether anyone received it.
#[derive(Debug, Serialize)]
pub struct NotifyResponse {
    /// Always `"sent"`.
    pub status: &'static str,
}

/// POST /internal/notify
pub async fn notify(
    State(state): State<AppState>,
    body: Bytes,
) -> Json<NotifyResponse> {
    let req: NotifyRequest = serde_json::from_slice(&body).unwrap_or_else(|e| {
        debug!(error = %e, "Undecodable notify body, nothing to deliver");
        NotifyRequest::default()
    });

    let message = NotifMessage {
        title: req
            .title
            .unwrap_or_else(|| DEFAULT_NOTIFICATION_TITLE.to_string()),
        content: req.content,
        kind: req.kind.unwrap_or_default(),
    };

    if let Err(e) = state.realtime.notify(&req.target_id, message).await {
        warn!(target_id = %req.target_id, error = %e, "Notification not queued");
    }

    Json(NotifyResponse { status: "sent" })
}
