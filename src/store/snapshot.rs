//! Immutable credential snapshots.

use std::collections::BTreeMap;
use std::fmt;
use std::path::PathBuf;

use chrono::{DateTime, Utc};

/// A single credential read from a file.
#[derive(Clone, PartialEq, Eq)]
pub struct Credential {
    /// File name the credential was read from.
    pub key: String,
    /// Trimmed file contents.
    pub value: String,
    /// Full path of the file that won for this key.
    pub source: PathBuf,
}

impl fmt::Debug for Credential {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Credential")
            .field("key", &self.key)
            .field("value", &"<redacted>")
            .field("source", &self.source)
            .finish()
    }
}

/// Keys that differ between two snapshots.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SnapshotDiff {
    pub added: Vec<String>,
    pub removed: Vec<String>,
    /// Keys whose value or source file changed.
    pub changed: Vec<String>,
}

impl SnapshotDiff {
    pub fn is_empty(&self) -> bool {
        self.added.is_empty() && self.removed.is_empty() && self.changed.is_empty()
    }
}

/// One fully-formed version of a store's credential map.
///
/// Snapshots are never mutated after publication. Reading several keys from
/// the same snapshot gives a mutually consistent view.
#[derive(Debug, Clone)]
pub struct Snapshot {
    generation: u64,
    loaded_at: DateTime<Utc>,
    credentials: BTreeMap<String, Credential>,
}

impl Snapshot {
    pub(crate) fn empty() -> Self {
        Self {
            generation: 0,
            loaded_at: Utc::now(),
            credentials: BTreeMap::new(),
        }
    }

    pub(crate) fn new(generation: u64, credentials: BTreeMap<String, Credential>) -> Self {
        Self {
            generation,
            loaded_at: Utc::now(),
            credentials,
        }
    }

    /// Load counter; 0 means nothing has been loaded yet.
    pub fn generation(&self) -> u64 {
        self.generation
    }

    pub fn loaded_at(&self) -> DateTime<Utc> {
        self.loaded_at
    }

    pub fn get(&self, key: &str) -> Option<&str> {
        self.credentials.get(key).map(|c| c.value.as_str())
    }

    pub fn credential(&self, key: &str) -> Option<&Credential> {
        self.credentials.get(key)
    }

    pub fn contains(&self, key: &str) -> bool {
        self.credentials.contains_key(key)
    }

    /// Keys in sorted order.
    pub fn keys(&self) -> impl Iterator<Item = &str> {
        self.credentials.keys().map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.credentials.len()
    }

    pub fn is_empty(&self) -> bool {
        self.credentials.is_empty()
    }

    /// True when both snapshots hold the same keys, values and sources.
    pub fn same_contents(&self, other: &Snapshot) -> bool {
        self.credentials == other.credentials
    }

    /// Compare against a newer snapshot.
    pub fn diff(&self, newer: &Snapshot) -> SnapshotDiff {
        let mut diff = SnapshotDiff::default();
        for (key, credential) in &newer.credentials {
            match self.credentials.get(key) {
                None => diff.added.push(key.clone()),
                Some(old) if old != credential => diff.changed.push(key.clone()),
                Some(_) => {}
            }
        }
        for key in self.credentials.keys() {
            if !newer.credentials.contains_key(key) {
                diff.removed.push(key.clone());
            }
        }
        diff
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn credential(key: &str, value: &str) -> Credential {
        Credential {
            key: key.to_string(),
            value: value.to_string(),
            source: PathBuf::from("/secrets").join(key),
        }
    }

    fn snapshot(generation: u64, pairs: &[(&str, &str)]) -> Snapshot {
        let map = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), credential(k, v)))
            .collect();
        Snapshot::new(generation, map)
    }

    #[test]
    fn test_credential_debug_redacts_value() {
        let debug = format!("{:?}", credential("MYSQL_PASSWORD", "hunter2"));
        assert!(debug.contains("MYSQL_PASSWORD"));
        assert!(!debug.contains("hunter2"));
        assert!(debug.contains("<redacted>"));
    }

    #[test]
    fn test_snapshot_accessors() {
        let snap = snapshot(3, &[("B", "2"), ("A", "1")]);
        assert_eq!(snap.generation(), 3);
        assert_eq!(snap.get("A"), Some("1"));
        assert_eq!(snap.get("C"), None);
        assert!(snap.contains("B"));
        assert_eq!(snap.keys().collect::<Vec<_>>(), vec!["A", "B"]);
        assert_eq!(snap.len(), 2);
        assert!(!snap.is_empty());
        assert!(Snapshot::empty().is_empty());
    }

    #[test]
    fn test_diff_reports_added_removed_changed() {
        let old = snapshot(1, &[("HOST", "a"), ("PORT", "3306"), ("USER", "root")]);
        let new = snapshot(2, &[("HOST", "b"), ("PORT", "3306"), ("DB", "app")]);

        let diff = old.diff(&new);
        assert_eq!(diff.added, vec!["DB".to_string()]);
        assert_eq!(diff.removed, vec!["USER".to_string()]);
        assert_eq!(diff.changed, vec!["HOST".to_string()]);
        assert!(!diff.is_empty());
    }

    #[test]
    fn test_diff_of_identical_contents_is_empty() {
        let a = snapshot(1, &[("HOST", "a")]);
        let b = snapshot(2, &[("HOST", "a")]);
        assert!(a.diff(&b).is_empty());
        assert!(a.same_contents(&b));
    }
}
