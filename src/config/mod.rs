//! Configuration for credential domains.
//!
//! A domain is one independent set of secret directories (database
//! credentials, API tokens, ...) with its own store, watcher and coordinator.
//! Domains come either from environment variables ([`AppConfig::from_env`])
//! or from a JSON file ([`AppConfig::load_file`]).
//!
//! # Example
//!
//! ```ignore
//! use credwatch::config::{DomainConfig, WatchOptions};
//! use std::time::Duration;
//!
//! let config = DomainConfig::new("database")
//!     .with_directories(["/run/secrets/db", "/run/secrets/override"])
//!     .with_expected_keys(["MYSQL_HOSTNAME", "MYSQL_PORT"])
//!     .with_watch(WatchOptions::default().with_debounce(Duration::from_secs(1)));
//! ```

mod env;
mod file;

use std::path::PathBuf;
use std::time::Duration;

pub use env::{parse_directory_list, DEFAULT_DELIMITER, SECRETS_ENV_PREFIX, TOKEN_SECRETS_ENV_PREFIX};

/// Default quiescence window before a burst of changes is reported.
pub const DEFAULT_DEBOUNCE: Duration = Duration::from_secs(3);

/// Default upper bound on how long a continuous burst can postpone a reload.
pub const DEFAULT_MAX_WAIT: Duration = Duration::from_secs(30);

/// Directory used for the database domain when `SECRETS_DIRS` is unset.
pub const DEFAULT_SECRETS_DIR: &str = "./secrets";

/// How changes in the source directories are detected.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WatchMode {
    /// Native filesystem notifications via the `notify` crate.
    ///
    /// Directories missing at startup are retried every few seconds, so a
    /// late mount is picked up shortly after it appears.
    Notify,
    /// Periodic fingerprinting of the directories.
    ///
    /// Works where notifications are unreliable, such as network or
    /// container-projected filesystems.
    Poll { interval: Duration },
}

/// Change detection settings for one domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct WatchOptions {
    /// Quiescence window; every new event in a burst restarts it.
    pub debounce: Duration,
    /// Longest a burst may delay its notification, measured from its first event.
    pub max_wait: Duration,
    /// Watch nested directories too. Loading is never recursive.
    pub recursive: bool,
    /// Detection backend.
    pub mode: WatchMode,
}

impl Default for WatchOptions {
    fn default() -> Self {
        Self {
            debounce: DEFAULT_DEBOUNCE,
            max_wait: DEFAULT_MAX_WAIT,
            recursive: false,
            mode: WatchMode::Notify,
        }
    }
}

impl WatchOptions {
    /// Set the debounce window.
    pub fn with_debounce(mut self, debounce: Duration) -> Self {
        self.debounce = debounce;
        self
    }

    /// Set the maximum delay for a continuous burst.
    pub fn with_max_wait(mut self, max_wait: Duration) -> Self {
        self.max_wait = max_wait;
        self
    }

    /// Set whether nested directories are watched.
    pub fn with_recursive(mut self, recursive: bool) -> Self {
        self.recursive = recursive;
        self
    }

    /// Switch to polling with the given interval.
    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.mode = WatchMode::Poll { interval };
        self
    }
}

/// Configuration for one credential domain.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct DomainConfig {
    /// Domain name used in logs ("database", "tokens", ...).
    pub name: String,
    /// Source directories in precedence order; later ones win on collisions.
    pub directories: Vec<PathBuf>,
    /// Keys whose absence is reported after each load.
    pub expected_keys: Vec<String>,
    /// Change detection settings.
    pub watch: WatchOptions,
}

impl DomainConfig {
    /// Create an empty domain configuration.
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            directories: Vec::new(),
            expected_keys: Vec::new(),
            watch: WatchOptions::default(),
        }
    }

    /// Set the source directories.
    pub fn with_directories<I, P>(mut self, directories: I) -> Self
    where
        I: IntoIterator<Item = P>,
        P: Into<PathBuf>,
    {
        self.directories = directories.into_iter().map(Into::into).collect();
        self
    }

    /// Set the expected keys.
    pub fn with_expected_keys<I, S>(mut self, keys: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        self.expected_keys = keys.into_iter().map(Into::into).collect();
        self
    }

    /// Set the watch options.
    pub fn with_watch(mut self, watch: WatchOptions) -> Self {
        self.watch = watch;
        self
    }
}

/// All domains the process manages.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub struct AppConfig {
    pub domains: Vec<DomainConfig>,
}

impl AppConfig {
    /// Look up a domain by name.
    pub fn domain(&self, name: &str) -> Option<&DomainConfig> {
        self.domains.iter().find(|d| d.name == name)
    }
}
