//! Best-effort chat persistence.

pub mod sink;
