//! WebSocket connections: handles, pre-upgrade authentication, and pumps.

pub mod authenticator;
pub mod handle;
pub mod pump;

pub use handle::{ConnectionHandle, ConnectionId, Identity};
