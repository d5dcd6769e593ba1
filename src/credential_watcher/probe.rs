//! Directory fingerprint provider for dependency injection.
//!
//! Allows testing the poller without touching real directories.
//!
//! # Usage
//!
//! ```rust,ignore
//! // Production: fingerprint real directories
//! spawn_directory_poller("db", dirs, interval, tx);
//!
//! // Testing: use MockProbe
//! let probe = Arc::new(MockProbe::new(1));
//! spawn_directory_poller_with_probe("db", dirs, interval, tx, probe.clone());
//! probe.set_fingerprint(2); // Simulate a change
//! ```

use std::collections::hash_map::DefaultHasher;
use std::fs;
use std::hash::{Hash, Hasher};
use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};

/// Trait for fingerprinting a set of credential directories.
///
/// Two calls return the same value exactly when no file was added, removed
/// or rewritten with different content in between.
pub trait DirectoryProbe: Send + Sync {
    fn fingerprint(&self, directories: &[PathBuf]) -> u64;
}

/// Production implementation - hashes file names and contents.
#[derive(Debug, Default)]
pub struct RealDirectories;

impl DirectoryProbe for RealDirectories {
    fn fingerprint(&self, directories: &[PathBuf]) -> u64 {
        let mut hasher = DefaultHasher::new();
        for dir in directories {
            dir.hash(&mut hasher);
            let entries = match fs::read_dir(dir) {
                Ok(entries) => entries,
                Err(_) => {
                    "<unreadable>".hash(&mut hasher);
                    continue;
                }
            };

            let mut paths: Vec<PathBuf> = entries.filter_map(|e| e.ok().map(|e| e.path())).collect();
            paths.sort();
            for path in paths {
                if !path.is_file() {
                    continue;
                }
                path.file_name().hash(&mut hasher);
                match fs::read(&path) {
                    Ok(contents) => contents.hash(&mut hasher),
                    Err(_) => "<unreadable>".hash(&mut hasher),
                }
            }
        }
        hasher.finish()
    }
}

/// Mock implementation for testing.
///
/// Returns whatever fingerprint was last set, regardless of directories.
#[derive(Debug)]
pub struct MockProbe {
    fingerprint: Mutex<u64>,
}

impl MockProbe {
    pub fn new(fingerprint: u64) -> Self {
        Self {
            fingerprint: Mutex::new(fingerprint),
        }
    }

    /// Change the reported fingerprint (simulates a directory change).
    pub fn set_fingerprint(&self, fingerprint: u64) {
        *self.fingerprint.lock().unwrap_or_else(PoisonError::into_inner) = fingerprint;
    }
}

impl DirectoryProbe for MockProbe {
    fn fingerprint(&self, _directories: &[PathBuf]) -> u64 {
        *self.fingerprint.lock().unwrap_or_else(PoisonError::into_inner)
    }
}
