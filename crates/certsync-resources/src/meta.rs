//! Object metadata shared by all stored resources

use certsync_core::{NamespacedName, UtcDateTime};
use serde::{Deserialize, Serialize};

/// Metadata carried by every stored resource: identity, optimistic-concurrency
/// version, the deletion marker, finalizers and owner references.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ObjectMeta {
    pub name: String,
    pub namespace: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
    #[serde(default)]
    pub resource_version: u64,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub deletion_timestamp: Option<UtcDateTime>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub finalizers: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub owner_references: Vec<OwnerReference>,
}

impl ObjectMeta {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            namespace: namespace.into(),
            ..Default::default()
        }
    }

    pub fn namespaced_name(&self) -> NamespacedName {
        NamespacedName::new(self.namespace.clone(), self.name.clone())
    }

    /// Whether the deletion marker is set and the object is waiting for
    /// finalizers to clear.
    pub fn is_deleting(&self) -> bool {
        self.deletion_timestamp.is_some()
    }

    pub fn has_finalizer(&self, finalizer: &str) -> bool {
        self.finalizers.iter().any(|f| f == finalizer)
    }

    /// Adds the finalizer if not already present.
    pub fn add_finalizer(&mut self, finalizer: &str) {
        if !self.has_finalizer(finalizer) {
            self.finalizers.push(finalizer.to_string());
        }
    }

    pub fn remove_finalizer(&mut self, finalizer: &str) {
        self.finalizers.retain(|f| f != finalizer);
    }
}

/// Reference to the object that owns this one; deletion of the owner cascades
/// to owned objects (enforced by the store, not by this system).
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct OwnerReference {
    pub kind: String,
    pub name: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub uid: Option<String>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn finalizer_round_trip() {
        let mut meta = ObjectMeta::new("default", "test-cert");
        assert!(!meta.has_finalizer("certsync.io/finalizer"));

        meta.add_finalizer("certsync.io/finalizer");
        meta.add_finalizer("certsync.io/finalizer");
        assert_eq!(meta.finalizers.len(), 1);
        assert!(meta.has_finalizer("certsync.io/finalizer"));

        meta.remove_finalizer("certsync.io/finalizer");
        assert!(meta.finalizers.is_empty());
    }

    #[test]
    fn deletion_marker() {
        let mut meta = ObjectMeta::new("default", "test-cert");
        assert!(!meta.is_deleting());

        meta.deletion_timestamp = Some(chrono::Utc::now());
        assert!(meta.is_deleting());
    }
}
