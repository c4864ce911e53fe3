//! Certificate authority client for certsync
//!
//! Defines the `CertificateAuthority` capability interface the controller
//! depends on, CA-neutral detail/summary types, and the production
//! implementation backed by AWS Certificate Manager. Test doubles live in
//! [`test_utils`].

pub mod aws;
pub mod client;
pub mod error;
pub mod test_utils;
pub mod types;

pub use aws::AwsAcmClient;
pub use client::CertificateAuthority;
pub use error::AcmError;
pub use types::{
    CaCertificateStatus, CertificateDetail, CertificateSummary, DomainValidation, ValidationRecord,
};
