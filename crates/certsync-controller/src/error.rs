//! Controller error types

use certsync_acm::AcmError;
use certsync_store::StoreError;
use thiserror::Error;

/// Errors surfaced by a reconcile pass. These are returned to the worker
/// loop, which applies its own requeue backoff; nothing is retried inline.
#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("certificate authority error: {0}")]
    Acm(#[from] AcmError),

    #[error("store error: {0}")]
    Store(#[from] StoreError),
}
