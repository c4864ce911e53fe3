//! Store error types

use thiserror::Error;

/// Errors surfaced by the resource store.
///
/// `Conflict` models an optimistic-concurrency rejection; the controller
/// resolves it by re-fetching on the next reconcile, never by retrying inline.
#[derive(Error, Debug, Clone)]
pub enum StoreError {
    #[error("not found: {0}")]
    NotFound(String),

    #[error("already exists: {0}")]
    AlreadyExists(String),

    #[error("conflict: {0}")]
    Conflict(String),

    #[error("store error: {0}")]
    Internal(String),
}

impl StoreError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, StoreError::NotFound(_))
    }

    pub fn is_conflict(&self) -> bool {
        matches!(self, StoreError::Conflict(_))
    }
}
