//! # feedback-auth
//!
//! Verifies bearer tokens issued by the auth service and decodes them into
//! a fixed [`Claims`] record. Tokens are consumed here, never issued.

pub mod jwt;

pub use jwt::{Claims, JwtDecoder};
