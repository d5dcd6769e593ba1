//! Prelude module for convenient imports.
//!
//! # Usage
//!
//! ```ignore
//! use credwatch::prelude::*;
//! ```

// Configuration
pub use crate::config::{AppConfig, DomainConfig, WatchMode, WatchOptions};

// Store
pub use crate::store::{CredentialStore, LoadReport, Snapshot};

// Coordination
pub use crate::credential_watcher::{ChangeSource, ReloadCoordinator, ReloadPhase, ReloadStatus};

// Consumers
pub use crate::consumer::{ApiTokens, DatabaseSettings, FromCredentials, SettingsPublisher};
pub use crate::traits::{FnHandler, ReloadHandler};

// Errors
pub use crate::error::{CredwatchError, CredwatchResult, ErrorCategory, HandlerError};
