//! Certificate authority error types

use thiserror::Error;

/// Errors surfaced by a certificate authority client.
///
/// `NotFound` is a first-class signal, not a failure: callers use it as input
/// to comparison and deletion logic. Everything else is transient from the
/// controller's point of view and is retried by requeueing, never inline.
#[derive(Error, Debug, Clone)]
pub enum AcmError {
    #[error("certificate not found: {0}")]
    NotFound(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("rate limited: {0}")]
    Throttling(String),

    #[error("configuration error: {0}")]
    Configuration(String),
}

impl AcmError {
    pub fn is_not_found(&self) -> bool {
        matches!(self, AcmError::NotFound(_))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn not_found_is_typed() {
        assert!(AcmError::NotFound("arn-1".to_string()).is_not_found());
        assert!(!AcmError::Api("ResourceNotFoundException".to_string()).is_not_found());
    }
}
