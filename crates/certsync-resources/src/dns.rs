//! DNS endpoint resource published for the external DNS-sync agent

use serde::{Deserialize, Serialize};

use crate::certificate::ResourceRecord;
use crate::meta::ObjectMeta;

/// DNS record-set object derived from a certificate intent's validation
/// records. One per intent, same identity, owned by the intent. Its content is
/// a pure function of `status.resourceRecords` and is never hand-edited.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEndpoint {
    pub metadata: ObjectMeta,
    #[serde(default)]
    pub spec: DnsEndpointSpec,
}

#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct DnsEndpointSpec {
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub endpoints: Vec<Endpoint>,
}

/// A single DNS record to publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct Endpoint {
    pub dns_name: String,
    pub record_type: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub targets: Vec<String>,
}

impl Endpoint {
    pub fn new(
        dns_name: impl Into<String>,
        record_type: impl Into<String>,
        target: impl Into<String>,
    ) -> Self {
        Self {
            dns_name: dns_name.into(),
            record_type: record_type.into(),
            targets: vec![target.into()],
        }
    }
}

impl From<&ResourceRecord> for Endpoint {
    fn from(record: &ResourceRecord) -> Self {
        Endpoint::new(
            record.name.clone(),
            record.record_type.clone(),
            record.value.clone(),
        )
    }
}
