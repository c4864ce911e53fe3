//! In-memory certificate authority for tests

use std::collections::{BTreeMap, HashMap, VecDeque};

use async_trait::async_trait;
use tokio::sync::RwLock;

use crate::client::CertificateAuthority;
use crate::error::AcmError;
use crate::types::{
    CaCertificateStatus, CertificateDetail, CertificateSummary, DomainValidation, ValidationRecord,
};

/// A certificate held by the mock CA, with its tags.
#[derive(Debug, Clone)]
pub struct StoredCertificate {
    pub detail: CertificateDetail,
    pub tags: HashMap<String, String>,
}

#[derive(Default)]
struct MockState {
    certificates: BTreeMap<String, StoredCertificate>,
    next_arn: u32,
    request_count: u32,
    delete_log: Vec<String>,
    new_status: Option<CaCertificateStatus>,
    records_ready: bool,
    record_template: Option<ValidationRecord>,
    fail_request: VecDeque<AcmError>,
    fail_describe: VecDeque<AcmError>,
    fail_delete: VecDeque<AcmError>,
    fail_list_tags: HashMap<String, AcmError>,
}

/// Scriptable in-memory certificate authority.
///
/// New certificates get arns `arn-1`, `arn-2`, ... in request order. By
/// default a new certificate is `PendingValidation` with no validation records
/// computed yet; tests flip behavior through the helper methods.
#[derive(Default)]
pub struct MockCertificateAuthority {
    inner: RwLock<MockState>,
}

impl MockCertificateAuthority {
    pub fn new() -> Self {
        Self::default()
    }

    /// Status assigned to newly requested certificates (default
    /// `PendingValidation`).
    pub async fn set_new_certificate_status(&self, status: CaCertificateStatus) {
        self.inner.write().await.new_status = Some(status);
    }

    /// Whether newly requested certificates immediately carry validation
    /// records (default false).
    pub async fn set_records_ready(&self, ready: bool) {
        self.inner.write().await.records_ready = ready;
    }

    /// Fixed validation record applied to every validation option instead of
    /// the generated `_validate.<domain>` one.
    pub async fn set_record_template(&self, record: ValidationRecord) {
        self.inner.write().await.record_template = Some(record);
    }

    pub async fn fail_next_request(&self, err: AcmError) {
        self.inner.write().await.fail_request.push_back(err);
    }

    pub async fn fail_next_describe(&self, err: AcmError) {
        self.inner.write().await.fail_describe.push_back(err);
    }

    pub async fn fail_next_delete(&self, err: AcmError) {
        self.inner.write().await.fail_delete.push_back(err);
    }

    /// Makes the next `list_tags` call for the given arn fail.
    pub async fn fail_list_tags(&self, arn: &str, err: AcmError) {
        self.inner
            .write()
            .await
            .fail_list_tags
            .insert(arn.to_string(), err);
    }

    /// Seeds a certificate directly, bypassing the request path.
    pub async fn insert_certificate(&self, detail: CertificateDetail, tags: HashMap<String, String>) {
        let mut state = self.inner.write().await;
        state
            .certificates
            .insert(detail.arn.clone(), StoredCertificate { detail, tags });
    }

    /// Fills in the validation records of an existing certificate, as the CA
    /// does asynchronously after a request.
    pub async fn publish_validation_records(&self, arn: &str) {
        let mut state = self.inner.write().await;
        let template = state.record_template.clone();
        if let Some(stored) = state.certificates.get_mut(arn) {
            for option in &mut stored.detail.validation_options {
                if option.resource_record.is_none() {
                    option.resource_record = Some(record_for(&option.domain_name, template.as_ref()));
                }
            }
        }
    }

    pub async fn set_status(&self, arn: &str, status: CaCertificateStatus) {
        let mut state = self.inner.write().await;
        if let Some(stored) = state.certificates.get_mut(arn) {
            stored.detail.status = status;
        }
    }

    pub async fn certificate(&self, arn: &str) -> Option<StoredCertificate> {
        self.inner.read().await.certificates.get(arn).cloned()
    }

    pub async fn certificate_count(&self) -> usize {
        self.inner.read().await.certificates.len()
    }

    pub async fn request_count(&self) -> u32 {
        self.inner.read().await.request_count
    }

    /// Every arn a delete was attempted for, in call order.
    pub async fn delete_log(&self) -> Vec<String> {
        self.inner.read().await.delete_log.clone()
    }
}

fn record_for(domain: &str, template: Option<&ValidationRecord>) -> ValidationRecord {
    match template {
        Some(record) => record.clone(),
        None => ValidationRecord {
            name: format!("_validate.{domain}"),
            record_type: "CNAME".to_string(),
            value: format!("{domain}.acm-validations.example"),
        },
    }
}

#[async_trait]
impl CertificateAuthority for MockCertificateAuthority {
    async fn request_certificate(
        &self,
        common_name: &str,
        subject_alternative_names: &[String],
        tags: &HashMap<String, String>,
    ) -> Result<String, AcmError> {
        let mut state = self.inner.write().await;
        if let Some(err) = state.fail_request.pop_front() {
            return Err(err);
        }

        state.next_arn += 1;
        state.request_count += 1;
        let arn = format!("arn-{}", state.next_arn);

        // one validation option per distinct domain, common name first
        let mut domains = vec![common_name.to_string()];
        for san in subject_alternative_names {
            if !domains.contains(san) {
                domains.push(san.clone());
            }
        }
        let template = state.record_template.clone();
        let records_ready = state.records_ready;
        let validation_options = domains
            .into_iter()
            .map(|domain| {
                let resource_record =
                    records_ready.then(|| record_for(&domain, template.as_ref()));
                DomainValidation {
                    domain_name: domain,
                    resource_record,
                }
            })
            .collect();

        let detail = CertificateDetail {
            arn: arn.clone(),
            domain_name: common_name.to_string(),
            subject_alternative_names: subject_alternative_names.to_vec(),
            validation_options,
            status: state
                .new_status
                .unwrap_or(CaCertificateStatus::PendingValidation),
            not_before: None,
            not_after: None,
        };
        state.certificates.insert(
            arn.clone(),
            StoredCertificate {
                detail,
                tags: tags.clone(),
            },
        );
        Ok(arn)
    }

    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail, AcmError> {
        let mut state = self.inner.write().await;
        if let Some(err) = state.fail_describe.pop_front() {
            return Err(err);
        }
        state
            .certificates
            .get(arn)
            .map(|stored| stored.detail.clone())
            .ok_or_else(|| AcmError::NotFound(arn.to_string()))
    }

    async fn delete_certificate(&self, arn: &str) -> Result<(), AcmError> {
        let mut state = self.inner.write().await;
        if let Some(err) = state.fail_delete.pop_front() {
            return Err(err);
        }
        state.delete_log.push(arn.to_string());
        state
            .certificates
            .remove(arn)
            .map(|_| ())
            .ok_or_else(|| AcmError::NotFound(arn.to_string()))
    }

    async fn list_certificates(&self) -> Result<Vec<CertificateSummary>, AcmError> {
        let state = self.inner.read().await;
        Ok(state
            .certificates
            .values()
            .map(|stored| CertificateSummary {
                arn: stored.detail.arn.clone(),
                domain_name: stored.detail.domain_name.clone(),
            })
            .collect())
    }

    async fn list_tags(&self, arn: &str) -> Result<HashMap<String, String>, AcmError> {
        let mut state = self.inner.write().await;
        if let Some(err) = state.fail_list_tags.remove(arn) {
            return Err(err);
        }
        state
            .certificates
            .get(arn)
            .map(|stored| stored.tags.clone())
            .ok_or_else(|| AcmError::NotFound(arn.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn request_creates_pending_certificate_without_records() {
        let ca = MockCertificateAuthority::new();
        let arn = ca
            .request_certificate("test.example.com", &["test.example.com".to_string()], &HashMap::new())
            .await
            .unwrap();
        assert_eq!(arn, "arn-1");

        let detail = ca.describe_certificate(&arn).await.unwrap();
        assert_eq!(detail.status, CaCertificateStatus::PendingValidation);
        assert_eq!(detail.validation_options.len(), 1);
        assert!(!detail.validation_records_ready());

        ca.publish_validation_records(&arn).await;
        let detail = ca.describe_certificate(&arn).await.unwrap();
        assert!(detail.validation_records_ready());
    }

    #[tokio::test]
    async fn record_template_applies_to_every_option() {
        let ca = MockCertificateAuthority::new();
        ca.set_records_ready(true).await;
        ca.set_record_template(ValidationRecord {
            name: "_abc.example.com".to_string(),
            record_type: "CNAME".to_string(),
            value: "xyz.validations.example".to_string(),
        })
        .await;

        let arn = ca
            .request_certificate("test1.example.com", &["test1.example.com".to_string()], &HashMap::new())
            .await
            .unwrap();
        let detail = ca.describe_certificate(&arn).await.unwrap();
        let record = detail.validation_options[0].resource_record.as_ref().unwrap();
        assert_eq!(record.name, "_abc.example.com");
        assert_eq!(record.value, "xyz.validations.example");
    }

    #[tokio::test]
    async fn delete_is_logged_and_reports_not_found() {
        let ca = MockCertificateAuthority::new();
        let err = ca.delete_certificate("arn-ghost").await.unwrap_err();
        assert!(err.is_not_found());
        assert_eq!(ca.delete_log().await, vec!["arn-ghost"]);
    }
}
