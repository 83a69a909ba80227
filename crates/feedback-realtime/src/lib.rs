//! # feedback-realtime
//!
//! Real-time hub subsystem for the feedback service. Provides:
//!
//! - A chat hub: broadcast to every connection, with staff messages gated
//!   by an admin-controlled open/closed flag
//! - A notification hub: targeted delivery to the single connection
//!   indexed under a user id
//! - Per-connection send/receive pumps over bounded delivery queues
//! - Pre-upgrade authentication against the token and the user directory
//! - A bounded, best-effort chat persistence sink
//!
//! Each hub is a single task that exclusively owns its registry and
//! processes commands one at a time, so no locks guard hub state.

pub mod connection;
pub mod hub;
pub mod message;
pub mod persistence;
pub mod server;

pub use connection::authenticator::WsAuthenticator;
pub use connection::handle::{ConnectionHandle, ConnectionId, Frame, Identity};
pub use connection::pump::run_session;
pub use hub::chat::ChatHub;
pub use hub::notification::NotificationHub;
pub use persistence::sink::PersistenceSink;
pub use server::RealtimeEngine;
