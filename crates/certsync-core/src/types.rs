//! Common identity and time types

use std::fmt;

use serde::{Deserialize, Serialize};

/// Standard UTC datetime type used across all certsync crates.
///
/// Serializes as ISO 8601 with a 'Z' suffix, which is also the wire format
/// of the resource objects this system manages.
pub type UtcDateTime = chrono::DateTime<chrono::Utc>;

/// Namespaced identity of a stored resource.
///
/// This is the key handed to the reconciliation engine and the unit of
/// deduplication in the work queue.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub struct NamespacedName {
    pub namespace: String,
    pub name: String,
}

impl NamespacedName {
    pub fn new(namespace: impl Into<String>, name: impl Into<String>) -> Self {
        Self {
            namespace: namespace.into(),
            name: name.into(),
        }
    }
}

impl fmt::Display for NamespacedName {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}/{}", self.namespace, self.name)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn namespaced_name_display() {
        let key = NamespacedName::new("default", "test-cert");
        assert_eq!(key.to_string(), "default/test-cert");
    }

    #[test]
    fn namespaced_name_usable_as_map_key() {
        use std::collections::HashMap;

        let mut map = HashMap::new();
        map.insert(NamespacedName::new("default", "a"), 1);
        map.insert(NamespacedName::new("default", "b"), 2);

        assert_eq!(map.get(&NamespacedName::new("default", "a")), Some(&1));
        assert_eq!(map.get(&NamespacedName::new("other", "a")), None);
    }
}
