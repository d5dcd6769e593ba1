//! credwatch - hot-reloading credentials from mounted secret directories
//!
//! Each secret domain gets a [`store::CredentialStore`] that is rebuilt
//! whenever its directories change, and a
//! [`credential_watcher::ReloadCoordinator`] that serializes those reloads and
//! tells dependents about them.

pub mod config;
pub mod consumer;
pub mod credential_watcher;
pub mod error;
pub mod prelude;
pub mod store;
pub mod traits;
