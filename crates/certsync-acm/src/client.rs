//! Certificate authority capability interface

use std::collections::HashMap;

use async_trait::async_trait;

use crate::error::AcmError;
use crate::types::{CertificateDetail, CertificateSummary};

/// Remote certificate authority operations the controller depends on.
///
/// The controller only ever talks to this interface; the production
/// implementation is [`crate::AwsAcmClient`] and tests inject
/// [`crate::test_utils::MockCertificateAuthority`].
#[async_trait]
pub trait CertificateAuthority: Send + Sync {
    /// Requests a new DNS-validated certificate and returns its arn.
    async fn request_certificate(
        &self,
        common_name: &str,
        subject_alternative_names: &[String],
        tags: &HashMap<String, String>,
    ) -> Result<String, AcmError>;

    /// Describes a certificate by arn. Returns [`AcmError::NotFound`] when the
    /// CA no longer knows the arn.
    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail, AcmError>;

    /// Deletes a certificate by arn. Returns [`AcmError::NotFound`] when the
    /// certificate is already gone; callers treat that as success.
    async fn delete_certificate(&self, arn: &str) -> Result<(), AcmError>;

    /// Lists every certificate visible to this account.
    async fn list_certificates(&self) -> Result<Vec<CertificateSummary>, AcmError>;

    /// Fetches the tags attached to a certificate.
    async fn list_tags(&self, arn: &str) -> Result<HashMap<String, String>, AcmError>;
}
