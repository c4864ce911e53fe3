//! Certificate intent resource

use std::collections::HashSet;

use certsync_core::UtcDateTime;
use serde::{Deserialize, Serialize};

use crate::meta::ObjectMeta;

/// Declarative record of a desired certificate plus the observed CA state.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateIntent {
    pub metadata: ObjectMeta,
    pub spec: CertificateSpec,
    #[serde(default)]
    pub status: CertificateStatus,
}

impl CertificateIntent {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>, spec: CertificateSpec) -> Self {
        Self {
            metadata: ObjectMeta::new(namespace, name),
            spec,
            status: CertificateStatus::default(),
        }
    }
}

/// Desired certificate identity.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateSpec {
    /// DNS common name.
    pub common_name: String,
    /// DNS subject alternative names. Ordered on the wire, semantically a set.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub subject_alternative_names: Vec<String>,
}

impl CertificateSpec {
    /// The subject alternative names as a set; ordering and duplicates on the
    /// wire are irrelevant for comparison against the CA.
    pub fn san_set(&self) -> HashSet<&str> {
        self.subject_alternative_names
            .iter()
            .map(String::as_str)
            .collect()
    }
}

/// Observed state of a certificate intent.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CertificateStatus {
    /// Opaque CA identifier of the active certificate; empty until requested.
    #[serde(default, skip_serializing_if = "String::is_empty")]
    pub certificate_arn: String,
    /// DNS records the CA requires published to prove domain control.
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub resource_records: Vec<ResourceRecord>,
    #[serde(default)]
    pub status: CertificateStatusType,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_before: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub not_after: Option<UtcDateTime>,
}

/// DNS name/type/value triple required by the CA for domain validation.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ResourceRecord {
    pub name: String,
    /// The DNS record type; currently always CNAME.
    #[serde(rename = "type")]
    pub record_type: String,
    pub value: String,
}

/// Lifecycle state of a certificate intent. CA-native statuses map onto this
/// set; anything unmapped becomes `Unknown`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
pub enum CertificateStatusType {
    Requested,
    PendingValidation,
    Issued,
    Inactive,
    Expired,
    ValidationTimedOut,
    Revoked,
    Failed,
    Error,
    #[default]
    Unknown,
}

impl std::fmt::Display for CertificateStatusType {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let s = match self {
            CertificateStatusType::Requested => "Requested",
            CertificateStatusType::PendingValidation => "PendingValidation",
            CertificateStatusType::Issued => "Issued",
            CertificateStatusType::Inactive => "Inactive",
            CertificateStatusType::Expired => "Expired",
            CertificateStatusType::ValidationTimedOut => "ValidationTimedOut",
            CertificateStatusType::Revoked => "Revoked",
            CertificateStatusType::Failed => "Failed",
            CertificateStatusType::Error => "Error",
            CertificateStatusType::Unknown => "Unknown",
        };
        f.write_str(s)
    }
}
