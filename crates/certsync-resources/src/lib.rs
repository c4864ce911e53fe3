//! Declarative resource model for certsync
//!
//! These are the wire-shaped objects held in the resource store: the
//! certificate intent (desired certificate identity plus observed status)
//! and the DNS endpoint object derived from its validation records.

pub mod certificate;
pub mod dns;
pub mod meta;

pub use certificate::{
    CertificateIntent, CertificateSpec, CertificateStatus, CertificateStatusType, ResourceRecord,
};
pub use dns::{DnsEndpoint, DnsEndpointSpec, Endpoint};
pub use meta::{ObjectMeta, OwnerReference};
