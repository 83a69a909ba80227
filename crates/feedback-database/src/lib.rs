//! # feedback-database
//!
//! PostgreSQL connection management, migrations, and the repositories
//! behind the hub's two external collaborators: the chat message store
//! and the user identity directory.

pub mod connection;
pub mod migration;
pub mod repositories;

pub use connection::DatabasePool;
pub use repositories::{MessageRepository, MessageStore, UserDirectory, UserRepository};
