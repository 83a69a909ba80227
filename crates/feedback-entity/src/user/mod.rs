//! User identity entities.

pub mod role;

pub use role::Role;
