//! AWS Certificate Manager implementation of the certificate authority
//! interface

use std::collections::HashMap;

use async_trait::async_trait;
use aws_sdk_acm::types::{
    CertificateDetail as SdkCertificateDetail, CertificateStatus as SdkCertificateStatus,
    CertificateSummary as SdkCertificateSummary, DomainValidation as SdkDomainValidation,
    Tag, ValidationMethod,
};
use tracing::debug;

use crate::client::CertificateAuthority;
use crate::error::AcmError;
use crate::types::{
    CaCertificateStatus, CertificateDetail, CertificateSummary, DomainValidation, ValidationRecord,
};

/// Certificate authority backed by AWS Certificate Manager.
///
/// Not-found responses are detected through the SDK's typed service errors,
/// never by comparing error-code strings.
#[derive(Clone)]
pub struct AwsAcmClient {
    client: aws_sdk_acm::Client,
}

impl AwsAcmClient {
    pub fn new(client: aws_sdk_acm::Client) -> Self {
        Self { client }
    }

    /// Builds a client from the ambient AWS environment (credentials chain,
    /// region resolution).
    pub async fn from_env() -> Self {
        let config = aws_config::load_defaults(aws_config::BehaviorVersion::latest()).await;
        Self::new(aws_sdk_acm::Client::new(&config))
    }
}

#[async_trait]
impl CertificateAuthority for AwsAcmClient {
    async fn request_certificate(
        &self,
        common_name: &str,
        subject_alternative_names: &[String],
        tags: &HashMap<String, String>,
    ) -> Result<String, AcmError> {
        let mut request = self
            .client
            .request_certificate()
            .domain_name(common_name)
            .validation_method(ValidationMethod::Dns);
        for san in subject_alternative_names {
            request = request.subject_alternative_names(san);
        }
        for (key, value) in tags {
            let tag = Tag::builder()
                .key(key)
                .value(value)
                .build()
                .map_err(|err| AcmError::Configuration(err.to_string()))?;
            request = request.tags(tag);
        }

        let output = request
            .send()
            .await
            .map_err(|err| AcmError::Api(err.into_service_error().to_string()))?;

        let arn = output
            .certificate_arn()
            .ok_or_else(|| AcmError::Api("request returned no certificate arn".to_string()))?;
        debug!("requested certificate {} for {}", arn, common_name);
        Ok(arn.to_string())
    }

    async fn describe_certificate(&self, arn: &str) -> Result<CertificateDetail, AcmError> {
        let output = self
            .client
            .describe_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(|err| {
                let service = err.into_service_error();
                if service.is_resource_not_found_exception() {
                    AcmError::NotFound(arn.to_string())
                } else {
                    AcmError::Api(service.to_string())
                }
            })?;

        let detail = output
            .certificate()
            .ok_or_else(|| AcmError::Api(format!("describe returned no certificate for {arn}")))?;
        Ok(detail_from_sdk(detail))
    }

    async fn delete_certificate(&self, arn: &str) -> Result<(), AcmError> {
        self.client
            .delete_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map(|_| ())
            .map_err(|err| {
                let service = err.into_service_error();
                if service.is_resource_not_found_exception() {
                    AcmError::NotFound(arn.to_string())
                } else {
                    AcmError::Api(service.to_string())
                }
            })
    }

    async fn list_certificates(&self) -> Result<Vec<CertificateSummary>, AcmError> {
        let mut summaries = Vec::new();
        let mut next_token: Option<String> = None;
        loop {
            let mut request = self.client.list_certificates();
            if let Some(token) = &next_token {
                request = request.next_token(token);
            }
            let output = request
                .send()
                .await
                .map_err(|err| AcmError::Api(err.into_service_error().to_string()))?;

            summaries.extend(output.certificate_summary_list().iter().map(summary_from_sdk));

            next_token = output.next_token().map(str::to_string);
            if next_token.is_none() {
                break;
            }
        }
        Ok(summaries)
    }

    async fn list_tags(&self, arn: &str) -> Result<HashMap<String, String>, AcmError> {
        let output = self
            .client
            .list_tags_for_certificate()
            .certificate_arn(arn)
            .send()
            .await
            .map_err(|err| {
                let service = err.into_service_error();
                if service.is_resource_not_found_exception() {
                    AcmError::NotFound(arn.to_string())
                } else {
                    AcmError::Api(service.to_string())
                }
            })?;

        Ok(output
            .tags()
            .iter()
            .map(|tag| {
                (
                    tag.key().to_string(),
                    tag.value().unwrap_or_default().to_string(),
                )
            })
            .collect())
    }
}

fn detail_from_sdk(detail: &SdkCertificateDetail) -> CertificateDetail {
    CertificateDetail {
        arn: detail.certificate_arn().unwrap_or_default().to_string(),
        domain_name: detail.domain_name().unwrap_or_default().to_string(),
        subject_alternative_names: detail.subject_alternative_names().to_vec(),
        validation_options: detail
            .domain_validation_options()
            .iter()
            .map(validation_from_sdk)
            .collect(),
        status: detail
            .status()
            .map(status_from_sdk)
            .unwrap_or(CaCertificateStatus::Unknown),
        not_before: detail.not_before().and_then(|t| {
            chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
        }),
        not_after: detail.not_after().and_then(|t| {
            chrono::DateTime::from_timestamp(t.secs(), t.subsec_nanos())
        }),
    }
}

fn validation_from_sdk(validation: &SdkDomainValidation) -> DomainValidation {
    DomainValidation {
        domain_name: validation.domain_name().to_string(),
        resource_record: validation.resource_record().map(|record| ValidationRecord {
            name: record.name().to_string(),
            record_type: record.r#type().as_str().to_string(),
            value: record.value().to_string(),
        }),
    }
}

fn summary_from_sdk(summary: &SdkCertificateSummary) -> CertificateSummary {
    CertificateSummary {
        arn: summary.certificate_arn().unwrap_or_default().to_string(),
        domain_name: summary.domain_name().unwrap_or_default().to_string(),
    }
}

fn status_from_sdk(status: &SdkCertificateStatus) -> CaCertificateStatus {
    match status {
        SdkCertificateStatus::PendingValidation => CaCertificateStatus::PendingValidation,
        SdkCertificateStatus::Issued => CaCertificateStatus::Issued,
        SdkCertificateStatus::Inactive => CaCertificateStatus::Inactive,
        SdkCertificateStatus::Expired => CaCertificateStatus::Expired,
        SdkCertificateStatus::ValidationTimedOut => CaCertificateStatus::ValidationTimedOut,
        SdkCertificateStatus::Revoked => CaCertificateStatus::Revoked,
        SdkCertificateStatus::Failed => CaCertificateStatus::Failed,
        _ => CaCertificateStatus::Unknown,
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use aws_sdk_acm::types::{RecordType, ResourceRecord as SdkResourceRecord};

    #[test]
    fn converts_certificate_detail() {
        let record = SdkResourceRecord::builder()
            .name("_abc.example.com")
            .r#type(RecordType::Cname)
            .value("xyz.validations.example")
            .build()
            .unwrap();
        let validation = SdkDomainValidation::builder()
            .domain_name("test.example.com")
            .resource_record(record)
            .build()
            .unwrap();
        let detail = SdkCertificateDetail::builder()
            .certificate_arn("arn-1")
            .domain_name("test.example.com")
            .subject_alternative_names("test.example.com")
            .subject_alternative_names("www.example.com")
            .domain_validation_options(validation)
            .status(SdkCertificateStatus::Issued)
            .build();

        let converted = detail_from_sdk(&detail);
        assert_eq!(converted.arn, "arn-1");
        assert_eq!(converted.domain_name, "test.example.com");
        assert_eq!(
            converted.subject_alternative_names,
            vec!["test.example.com", "www.example.com"]
        );
        assert_eq!(converted.status, CaCertificateStatus::Issued);
        assert!(converted.validation_records_ready());

        let validation_record = converted.validation_options[0]
            .resource_record
            .as_ref()
            .unwrap();
        assert_eq!(validation_record.name, "_abc.example.com");
        assert_eq!(validation_record.record_type, "CNAME");
        assert_eq!(validation_record.value, "xyz.validations.example");
    }

    #[test]
    fn missing_validation_record_is_not_ready() {
        let validation = SdkDomainValidation::builder()
            .domain_name("test.example.com")
            .build()
            .unwrap();
        let detail = SdkCertificateDetail::builder()
            .certificate_arn("arn-1")
            .domain_name("test.example.com")
            .domain_validation_options(validation)
            .status(SdkCertificateStatus::PendingValidation)
            .build();

        let converted = detail_from_sdk(&detail);
        assert!(!converted.validation_records_ready());
        assert_eq!(converted.status, CaCertificateStatus::PendingValidation);
    }
}
