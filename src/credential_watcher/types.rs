//! Shared types for credential change detection.

use std::collections::BTreeSet;
use std::path::{Path, PathBuf};

use notify::event::{CreateKind, EventKind, RemoveKind};

/// Where a change event came from.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum CredentialSource {
    /// Filesystem notification for a specific entry
    File(PathBuf),
    /// Directory fingerprint changed between two polls
    Poll,
}

impl CredentialSource {
    pub fn is_file(&self) -> bool {
        matches!(self, Self::File(_))
    }

    pub fn is_poll(&self) -> bool {
        matches!(self, Self::Poll)
    }

    /// Human-readable description for logging
    pub fn description(&self) -> String {
        match self {
            Self::File(path) => format!("file: {}", path.display()),
            Self::Poll => "directory poll".to_string(),
        }
    }
}

/// What happened to the entry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ChangeKind {
    Created,
    Modified,
    Removed,
}

/// A single raw change, before debouncing.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CredentialChangeEvent {
    pub source: CredentialSource,
    pub kind: ChangeKind,
}

impl CredentialChangeEvent {
    pub fn file(path: PathBuf, kind: ChangeKind) -> Self {
        Self {
            source: CredentialSource::File(path),
            kind,
        }
    }

    pub fn poll() -> Self {
        Self {
            source: CredentialSource::Poll,
            kind: ChangeKind::Modified,
        }
    }

    /// Translate a notify event into credential change events.
    ///
    /// Events about directories (the watched roots themselves, or folders
    /// created/removed inside them) and pure access events produce nothing.
    pub fn from_notify(event: &notify::Event, roots: &[PathBuf]) -> Vec<Self> {
        let kind = match event.kind {
            EventKind::Create(CreateKind::Folder) | EventKind::Remove(RemoveKind::Folder) => {
                return Vec::new()
            }
            EventKind::Create(_) => ChangeKind::Created,
            EventKind::Modify(_) => ChangeKind::Modified,
            EventKind::Remove(_) => ChangeKind::Removed,
            EventKind::Access(_) | EventKind::Any | EventKind::Other => return Vec::new(),
        };

        event
            .paths
            .iter()
            .filter(|path| !is_root(path, roots))
            .filter(|path| kind == ChangeKind::Removed || !path.is_dir())
            .map(|path| Self::file(path.clone(), kind))
            .collect()
    }
}

fn is_root(path: &Path, roots: &[PathBuf]) -> bool {
    roots.iter().any(|root| root == path)
}

/// Everything that happened during one debounce window.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ChangeBatch {
    /// Number of raw events absorbed.
    pub events: usize,
    /// Distinct file paths touched.
    pub paths: BTreeSet<PathBuf>,
    /// Whether any event came from the poller.
    pub polled: bool,
}

impl ChangeBatch {
    pub fn record(&mut self, event: &CredentialChangeEvent) {
        self.events += 1;
        match &event.source {
            CredentialSource::File(path) => {
                self.paths.insert(path.clone());
            }
            CredentialSource::Poll => self.polled = true,
        }
    }

    pub fn is_empty(&self) -> bool {
        self.events == 0
    }

    /// Short summary for logging.
    pub fn describe(&self) -> String {
        let mut parts: Vec<String> = self
            .paths
            .iter()
            .map(|p| p.display().to_string())
            .collect();
        if self.polled {
            parts.push("directory poll".to_string());
        }
        parts.join(", ")
    }
}
