//! Certificate reconciliation engine and orphan sweeper
//!
//! The engine converges each certificate intent toward the desired state at
//! the certificate authority and republishes validation challenges as DNS
//! endpoint objects; the sweeper periodically reclaims CA certificates whose
//! owning intent has disappeared outside the normal deletion path.

pub mod error;
pub mod events;
pub mod reconciler;
pub mod sweeper;
pub mod worker;

pub use error::ControllerError;
pub use events::{EventKind, EventRecorder, TracingEventRecorder};
pub use reconciler::{CertificateReconciler, CleanupReport, Reconciliation};
pub use sweeper::{OrphanSweeper, SweepReport};
pub use worker::{Controller, WorkQueue};

/// Finalizer installed on every intent; blocks removal until the CA-side
/// certificate has been deleted.
pub const FINALIZER: &str = "certificate.certsync.io/finalizer";

/// Tags written onto every certificate this system requests. The triple is
/// the sole ownership-attribution mechanism; a certificate missing any of the
/// three is not managed by this system.
pub const TAG_OWNER: &str = "certsync/owner";
pub const TAG_CERTIFICATE_NAMESPACE: &str = "certsync/certificate-namespace";
pub const TAG_CERTIFICATE_NAME: &str = "certsync/certificate-name";
