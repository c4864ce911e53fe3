//! Core types and configuration shared across all certsync crates

pub mod config;
pub mod types;

pub use config::SyncConfig;
pub use types::{NamespacedName, UtcDateTime};

// Re-export external dependencies so downstream crates agree on versions
pub use async_trait;
pub use chrono;
pub use serde;
pub use serde_json;
pub use thiserror;
pub use tokio;
pub use tracing;
