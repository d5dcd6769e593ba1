//! In-memory credential store backed by secret directories.
//!
//! Each regular file directly inside a source directory becomes one
//! credential: the file name is the key, the trimmed contents the value.
//! Directories are scanned in configured order and later directories win.
//!
//! Every load builds a complete new [`Snapshot`] and publishes it with a
//! single atomic pointer swap, so readers only ever see a whole generation.
//! Nothing in here fails hard: missing directories and unreadable files are
//! logged, collected into the [`LoadReport`], and skipped.

mod snapshot;

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

use arc_swap::ArcSwap;

pub use snapshot::{Credential, Snapshot, SnapshotDiff};

use crate::config::DomainConfig;
use crate::error::CredwatchError;

/// Outcome of a single [`CredentialStore::load`].
#[derive(Debug)]
pub struct LoadReport {
    /// Generation of the snapshot that was published.
    pub generation: u64,
    /// Number of credentials in the new snapshot.
    pub keys: usize,
    /// Difference from the previous snapshot.
    pub diff: SnapshotDiff,
    /// Advisory problems hit while scanning.
    pub warnings: Vec<CredwatchError>,
}

impl LoadReport {
    pub fn is_clean(&self) -> bool {
        self.warnings.is_empty()
    }
}

/// Credential store for one domain.
pub struct CredentialStore {
    name: String,
    directories: Vec<PathBuf>,
    expected_keys: Vec<String>,
    current: ArcSwap<Snapshot>,
    load_lock: Mutex<()>,
}

impl std::fmt::Debug for CredentialStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CredentialStore")
            .field("name", &self.name)
            .field("directories", &self.directories)
            .field("expected_keys", &self.expected_keys)
            .field("generation", &self.generation())
            .finish()
    }
}

impl CredentialStore {
    /// Create an empty store. Nothing is read until [`load`](Self::load).
    pub fn new<I, P>(name: impl Into<String>, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        Self {
            name: name.into(),
            directories: directories.into_iter().map(Into::into).collect(),
            expected_keys: Vec::new(),
            current: ArcSwap::from_pointee(Snapshot::empty()),
            load_lock: Mutex::new(()),
        }
    }

    /// Create a store from a domain configuration.
    pub fn from_config(config: &DomainConfig) -> Self {
        Self::new(config.name.clone(), config.directories.iter().cloned())
            .with_expected_keys(config.expected_keys.iter().cloned())
    }

    /// Set the keys checked by [`validate`](Self::validate).
    pub fn with_expected_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    pub fn directories(&self) -> &[PathBuf] {
        &self.directories
    }

    pub fn expected_keys(&self) -> &[String] {
        &self.expected_keys
    }

    /// Current value for `key`, if any.
    pub fn get(&self, key: &str) -> Option<String> {
        self.current.load().get(key).map(str::to_string)
    }

    /// The current snapshot. Hold on to it to read several keys consistently.
    pub fn snapshot(&self) -> Arc<Snapshot> {
        self.current.load_full()
    }

    pub fn generation(&self) -> u64 {
        self.current.load().generation()
    }

    /// Rescan all source directories and publish the result.
    ///
    /// Concurrent calls on the same store are serialized; readers are never
    /// blocked and keep seeing the previous snapshot until the swap.
    pub fn load(&self) -> LoadReport {
        let _guard = self.load_lock.lock().unwrap_or_else(PoisonError::into_inner);

        tracing::debug!(
            domain = %self.name,
            directories = self.directories.len(),
            "Loading credentials"
        );

        let mut credentials = BTreeMap::new();
        let mut warnings = Vec::new();
        for dir in &self.directories {
            self.scan_directory(dir, &mut credentials, &mut warnings);
        }

        let previous = self.current.load_full();
        let next = Arc::new(Snapshot::new(previous.generation() + 1, credentials));
        let diff = previous.diff(&next);
        self.current.store(Arc::clone(&next));

        tracing::info!(
            domain = %self.name,
            generation = next.generation(),
            keys = next.len(),
            added = diff.added.len(),
            removed = diff.removed.len(),
            changed = diff.changed.len(),
            warnings = warnings.len(),
            "Credentials loaded"
        );
        if !diff.is_empty() {
            tracing::debug!(
                domain = %self.name,
                added = ?diff.added,
                removed = ?diff.removed,
                changed = ?diff.changed,
                "Credential keys changed"
            );
        }

        LoadReport {
            generation: next.generation(),
            keys: next.len(),
            diff,
            warnings,
        }
    }

    fn scan_directory(
        &self,
        dir: &Path,
        credentials: &mut BTreeMap<String, Credential>,
        warnings: &mut Vec<CredwatchError>,
    ) {
        let entries = match fs::read_dir(dir) {
            Ok(entries) => entries,
            Err(source) => {
                let err = CredwatchError::DirectoryUnreadable {
                    path: dir.to_path_buf(),
                    source,
                };
                tracing::warn!(domain = %self.name, error = %err, "Skipping credential directory");
                warnings.push(err);
                return;
            }
        };

        let mut paths = Vec::new();
        for entry in entries {
            match entry {
                Ok(entry) => paths.push(entry.path()),
                Err(source) => {
                    let err = CredwatchError::DirectoryUnreadable {
                        path: dir.to_path_buf(),
                        source,
                    };
                    tracing::warn!(domain = %self.name, error = %err, "Skipping unreadable directory entry");
                    warnings.push(err);
                }
            }
        }
        paths.sort();

        for path in paths {
            // Follows symlinks, so mounted secrets that link into a data dir still count.
            let metadata = match fs::metadata(&path) {
                Ok(metadata) => metadata,
                Err(source) => {
                    let err = CredwatchError::FileUnreadable { path, source };
                    tracing::warn!(domain = %self.name, error = %err, "Skipping credential file");
                    warnings.push(err);
                    continue;
                }
            };
            if !metadata.is_file() {
                tracing::trace!(domain = %self.name, path = %path.display(), "Ignoring non-file entry");
                continue;
            }

            let Some(key) = path.file_name().and_then(|name| name.to_str()).map(str::to_string)
            else {
                let err = CredwatchError::InvalidKey { path };
                tracing::warn!(domain = %self.name, error = %err, "Skipping credential file");
                warnings.push(err);
                continue;
            };

            match fs::read_to_string(&path) {
                Ok(raw) => {
                    tracing::debug!(
                        domain = %self.name,
                        key = %key,
                        path = %path.display(),
                        "Loaded credential"
                    );
                    let credential = Credential {
                        key: key.clone(),
                        value: raw.trim().to_string(),
                        source: path,
                    };
                    if let Some(overridden) = credentials.insert(key.clone(), credential) {
                        tracing::debug!(
                            domain = %self.name,
                            key = %key,
                            overridden = %overridden.source.display(),
                            "Credential overridden by later directory"
                        );
                    }
                }
                Err(source) => {
                    let err = CredwatchError::FileUnreadable { path, source };
                    tracing::warn!(domain = %self.name, error = %err, "Skipping credential file");
                    warnings.push(err);
                }
            }
        }
    }

    /// Report configured expected keys that are absent.
    pub fn validate(&self) -> Vec<String> {
        self.validate_against(&self.expected_keys)
    }

    /// Report which of `expected` are absent from the current snapshot.
    ///
    /// Advisory only: a warning is logged, nothing fails.
    pub fn validate_against<I, S>(&self, expected: I) -> Vec<String>
    where
        I: IntoIterator<Item = S>,
        S: AsRef<str>,
    {
        let snapshot = self.current.load();
        let mut checked = 0usize;
        let mut missing = Vec::new();
        for key in expected {
            checked += 1;
            let key = key.as_ref();
            if !snapshot.contains(key) {
                missing.push(key.to_string());
            }
        }

        if !missing.is_empty() {
            tracing::warn!(
                domain = %self.name,
                generation = snapshot.generation(),
                missing = %missing.join(", "),
                "Missing expected credentials"
            );
        } else if checked > 0 {
            tracing::info!(
                domain = %self.name,
                generation = snapshot.generation(),
                "All expected credentials present"
            );
        }
        missing
    }
}
