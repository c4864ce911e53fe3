//! Resource store interfaces for certsync
//!
//! The declarative store holding certificate intents and the derived DNS
//! endpoint objects is an external system; this crate defines the capability
//! interfaces the controller depends on, plus an in-memory implementation in
//! [`test_utils`] with the same optimistic-concurrency semantics.

pub mod error;
pub mod store;
pub mod test_utils;

pub use error::StoreError;
pub use store::{DnsEndpointStore, IntentStore, IntentWatch, WatchEvent};

/// Field-manager identity used for forced server-side merges on the status
/// channel.
pub const FIELD_MANAGER: &str = "certsync";
