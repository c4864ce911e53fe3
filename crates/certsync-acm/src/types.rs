//! CA-neutral certificate types
//!
//! The controller compares and copies these; they are never persisted.

use certsync_core::UtcDateTime;

/// Full description of a CA-side certificate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateDetail {
    pub arn: String,
    pub domain_name: String,
    pub subject_alternative_names: Vec<String>,
    pub validation_options: Vec<DomainValidation>,
    pub status: CaCertificateStatus,
    pub not_before: Option<UtcDateTime>,
    pub not_after: Option<UtcDateTime>,
}

/// One domain the CA validates, optionally carrying the DNS record to publish
/// once the CA has computed it.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct DomainValidation {
    pub domain_name: String,
    pub resource_record: Option<ValidationRecord>,
}

/// DNS record the CA requires published to prove control of a domain.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ValidationRecord {
    pub name: String,
    pub record_type: String,
    pub value: String,
}

/// Listing entry for a CA-side certificate.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct CertificateSummary {
    pub arn: String,
    pub domain_name: String,
}

/// CA-native certificate status.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum CaCertificateStatus {
    #[default]
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    ValidationTimedOut,
    Revoked,
    Failed,
    Unknown,
}

impl CertificateDetail {
    /// Whether the CA has computed a validation record for every domain.
    pub fn validation_records_ready(&self) -> bool {
        self.validation_options
            .iter()
            .all(|option| option.resource_record.is_some())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn validation_records_ready() {
        let mut detail = CertificateDetail {
            arn: "arn-1".to_string(),
            domain_name: "test.example.com".to_string(),
            validation_options: vec![DomainValidation {
                domain_name: "test.example.com".to_string(),
                resource_record: None,
            }],
            ..Default::default()
        };
        assert!(!detail.validation_records_ready());

        detail.validation_options[0].resource_record = Some(ValidationRecord {
            name: "_abc.example.com".to_string(),
            record_type: "CNAME".to_string(),
            value: "xyz.validations.example".to_string(),
        });
        assert!(detail.validation_records_ready());

        // a certificate with no validation options has nothing left to wait for
        detail.validation_options.clear();
        assert!(detail.validation_records_ready());
    }
}
