//! Trait abstractions for dependency injection and testability.
//!
//! # Traits
//!
//! - [`ReloadHandler`] - Consumer reaction to a credential reload
//! - [`DirectoryProbe`] - Directory fingerprinting for poll mode
//! - [`FromCredentials`] - Typed settings derived from a snapshot

pub mod reload_handler;

pub use crate::consumer::FromCredentials;
pub use crate::credential_watcher::DirectoryProbe;
pub use reload_handler::{FnHandler, ReloadHandler};
