//! Persistent registry of cluster objects and the read-only per-pass view of it.

pub mod client;
pub mod lease;
pub mod snapshot;
