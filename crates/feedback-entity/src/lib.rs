//! # feedback-entity
//!
//! Domain entity models for the feedback service. Database rows derive
//! `sqlx::FromRow`; value objects derive `Serialize`/`Deserialize`.

pub mod message;
pub mod user;
