//! Common test utilities for integration tests.
//!
//! # Example
//!
//! ```ignore
//! let secrets = SecretsDir::new();
//! secrets.write("MYSQL_HOSTNAME", "db.internal");
//! let store = CredentialStore::new("db", [secrets.path()]);
//! ```

pub mod mocks;

pub use mocks::*;

use std::fs;
use std::path::Path;
use std::time::Duration;

use credwatch::credential_watcher::{ReloadCoordinator, ReloadStatus};
use tempfile::TempDir;

/// A throwaway secrets directory.
pub struct SecretsDir {
    dir: TempDir,
}

impl SecretsDir {
    pub fn new() -> Self {
        Self {
            dir: TempDir::new().expect("create temp dir"),
        }
    }

    pub fn path(&self) -> &Path {
        self.dir.path()
    }

    /// Write one credential file.
    pub fn write(&self, key: &str, value: &str) {
        fs::write(self.dir.path().join(key), value).expect("write credential");
    }

    #[allow(dead_code)]
    pub fn remove(&self, key: &str) {
        fs::remove_file(self.dir.path().join(key)).expect("remove credential");
    }
}

/// Wait until the coordinator status satisfies `predicate`.
#[allow(dead_code)]
pub async fn wait_for_status<F>(coordinator: &ReloadCoordinator, predicate: F) -> ReloadStatus
where
    F: FnMut(&ReloadStatus) -> bool,
{
    let mut rx = coordinator.subscribe_status();
    let status = tokio::time::timeout(Duration::from_secs(10), rx.wait_for(predicate))
        .await
        .expect("timed out waiting for coordinator status")
        .expect("status channel closed")
        .clone();
    status
}
