//! Credential change detection and reload coordination.
//!
//! # Architecture
//!
//! ```text
//! ┌─────────────────┐     ┌─────────────────┐
//! │  File Watcher   │     │ Directory Poller│
//! │  (notify crate) │     │  (poll mode)    │
//! └────────┬────────┘     └────────┬────────┘
//!          │                       │
//!          └───────────┬───────────┘
//!                      ▼
//!              ┌───────────────┐
//!              │   Debouncer   │
//!              │ (3s, max 30s) │
//!              └───────┬───────┘
//!                      ▼
//!              ┌───────────────┐
//!              │  Coordinator  │
//!              │  (collapsing) │
//!              └───────┬───────┘
//!                      ▼
//!              ┌───────────────┐
//!              │ ReloadHandler │
//!              └───────────────┘
//! ```
//!
//! # Usage
//!
//! ```rust,ignore
//! let store = CredentialStore::from_config(&domain);
//! let coordinator =
//!     ReloadCoordinator::start(store, handler, ChangeSource::from_config(&domain)).await?;
//!
//! // ... on Ctrl+C:
//! coordinator.shutdown().await;
//! ```

// Submodules
mod coordinator;
mod debouncer;
mod file_watcher;
mod poller;
mod probe;
mod state;
mod types;
mod watcher;

// Public exports
pub use coordinator::{ChangeSource, ReloadCoordinator};
pub use debouncer::Debouncer;
pub use file_watcher::{
    spawn_file_watcher, spawn_file_watcher_with_retry, FileWatcher, REWATCH_INTERVAL,
};
pub use poller::{spawn_directory_poller, spawn_directory_poller_with_probe};
pub use probe::{DirectoryProbe, MockProbe, RealDirectories};
pub use state::{CredentialWatchState, ReloadAction, ReloadPhase, ReloadStatus};
pub use types::{ChangeBatch, ChangeKind, CredentialChangeEvent, CredentialSource};
pub use watcher::ChangeWatcher;
