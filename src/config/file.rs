//! JSON config file support.
//!
//! ```json
//! {
//!   "domains": [
//!     {
//!       "name": "database",
//!       "directories": ["/run/secrets/db", "/run/secrets/override"],
//!       "expected_keys": ["MYSQL_HOSTNAME", "MYSQL_PORT"],
//!       "debounce_ms": 3000,
//!       "recursive": false
//!     },
//!     {
//!       "name": "tokens",
//!       "directories": ["/run/secrets/tokens"],
//!       "poll_interval_secs": 30
//!     }
//!   ]
//! }
//! ```

use std::collections::HashSet;
use std::path::{Path, PathBuf};
use std::time::Duration;

use serde::Deserialize;

use super::{AppConfig, DomainConfig, WatchOptions};
use crate::error::{CredwatchError, CredwatchResult};

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct ConfigFile {
    domains: Vec<DomainEntry>,
}

#[derive(Debug, Deserialize)]
#[serde(deny_unknown_fields)]
struct DomainEntry {
    name: String,
    directories: Vec<PathBuf>,
    #[serde(default)]
    expected_keys: Vec<String>,
    #[serde(default)]
    debounce_ms: Option<u64>,
    #[serde(default)]
    max_wait_ms: Option<u64>,
    #[serde(default)]
    recursive: bool,
    #[serde(default)]
    poll_interval_secs: Option<u64>,
}

impl DomainEntry {
    fn into_config(self) -> CredwatchResult<DomainConfig> {
        if self.directories.is_empty() {
            return Err(CredwatchError::InvalidConfig {
                message: format!("domain '{}' lists no directories", self.name),
            });
        }

        let mut watch = WatchOptions::default().with_recursive(self.recursive);
        if let Some(ms) = self.debounce_ms {
            watch = watch.with_debounce(Duration::from_millis(ms));
        }
        if let Some(ms) = self.max_wait_ms {
            watch = watch.with_max_wait(Duration::from_millis(ms));
        }
        match self.poll_interval_secs {
            Some(0) => {
                return Err(CredwatchError::InvalidConfig {
                    message: format!("domain '{}' has a zero poll interval", self.name),
                })
            }
            Some(secs) => watch = watch.with_poll_interval(Duration::from_secs(secs)),
            None => {}
        }

        Ok(DomainConfig {
            name: self.name,
            directories: self.directories,
            expected_keys: self.expected_keys,
            watch,
        })
    }
}

impl AppConfig {
    /// Parse a JSON configuration document.
    ///
    /// `origin` is only used for error messages.
    pub fn from_json(raw: &str, origin: &Path) -> CredwatchResult<Self> {
        let file: ConfigFile =
            serde_json::from_str(raw).map_err(|source| CredwatchError::ConfigParse {
                path: origin.to_path_buf(),
                source,
            })?;

        let mut seen = HashSet::new();
        let mut domains = Vec::with_capacity(file.domains.len());
        for entry in file.domains {
            if !seen.insert(entry.name.clone()) {
                return Err(CredwatchError::InvalidConfig {
                    message: format!("domain '{}' is defined twice", entry.name),
                });
            }
            domains.push(entry.into_config()?);
        }

        Ok(AppConfig { domains })
    }

    /// Load the configuration from a JSON file.
    pub fn load_file(path: impl AsRef<Path>) -> CredwatchResult<Self> {
        let path = path.as_ref();
        let raw = std::fs::read_to_string(path).map_err(|source| CredwatchError::ConfigRead {
            path: path.to_path_buf(),
            source,
        })?;
        let config = Self::from_json(&raw, path)?;
        tracing::info!(
            path = %path.display(),
            domains = config.domains.len(),
            "Configuration file loaded"
        );
        Ok(config)
    }
}
