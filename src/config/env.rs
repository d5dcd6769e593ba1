//! Environment-driven configuration.
//!
//! Each domain reads a family of variables sharing a prefix:
//!
//! | Variable | Meaning |
//! |----------|---------|
//! | `{PREFIX}_DIRS` | delimiter-separated source directories |
//! | `{PREFIX}_DIRS_DELIMITER` | single-character delimiter (default `,`) |
//! | `{PREFIX}_EXPECTED_KEYS` | comma-separated keys to validate |
//! | `{PREFIX}_DEBOUNCE_MS` | debounce window in milliseconds |
//! | `{PREFIX}_MAX_WAIT_MS` | burst cap in milliseconds |
//! | `{PREFIX}_POLL_INTERVAL_SECS` | poll instead of using notifications |
//! | `{PREFIX}_RECURSIVE` | watch nested directories |

use std::env::VarError;
use std::path::PathBuf;
use std::time::Duration;

use super::{AppConfig, DomainConfig, DEFAULT_SECRETS_DIR};
use crate::consumer::{ApiTokens, DatabaseSettings};
use crate::error::{CredwatchError, CredwatchResult};

/// Prefix for the database domain (`SECRETS_DIRS`, ...).
pub const SECRETS_ENV_PREFIX: &str = "SECRETS";

/// Prefix for the optional token domain (`TOKEN_SECRETS_DIRS`, ...).
pub const TOKEN_SECRETS_ENV_PREFIX: &str = "TOKEN_SECRETS";

/// Delimiter used between directories when none is configured.
pub const DEFAULT_DELIMITER: char = ',';

/// Split a delimiter-separated directory list.
///
/// Entries are trimmed; empty entries are dropped.
pub fn parse_directory_list(raw: &str, delimiter: char) -> Vec<PathBuf> {
    raw.split(delimiter)
        .map(str::trim)
        .filter(|entry| !entry.is_empty())
        .map(PathBuf::from)
        .collect()
}

fn parse_key_list(raw: &str) -> Vec<String> {
    raw.split(',')
        .map(str::trim)
        .filter(|key| !key.is_empty())
        .map(str::to_string)
        .collect()
}

/// Read a variable; unset and blank values are treated alike.
fn read_var(variable: &str) -> CredwatchResult<Option<String>> {
    match std::env::var(variable) {
        Ok(value) if value.trim().is_empty() => Ok(None),
        Ok(value) => Ok(Some(value)),
        Err(VarError::NotPresent) => Ok(None),
        Err(VarError::NotUnicode(_)) => Err(CredwatchError::Environment {
            variable: variable.to_string(),
            message: "value is not valid unicode".to_string(),
        }),
    }
}

fn read_u64(variable: &str) -> CredwatchResult<Option<u64>> {
    read_var(variable)?
        .map(|raw| {
            raw.trim()
                .parse::<u64>()
                .map_err(|e| CredwatchError::Environment {
                    variable: variable.to_string(),
                    message: format!("expected a non-negative integer, got '{}': {}", raw, e),
                })
        })
        .transpose()
}

fn read_bool(variable: &str) -> CredwatchResult<Option<bool>> {
    read_var(variable)?
        .map(|raw| match raw.trim().to_ascii_lowercase().as_str() {
            "1" | "true" | "yes" | "on" => Ok(true),
            "0" | "false" | "no" | "off" => Ok(false),
            other => Err(CredwatchError::Environment {
                variable: variable.to_string(),
                message: format!("expected a boolean, got '{}'", other),
            }),
        })
        .transpose()
}

fn read_delimiter(variable: &str) -> CredwatchResult<char> {
    match read_var(variable)? {
        None => Ok(DEFAULT_DELIMITER),
        Some(raw) => {
            let mut chars = raw.chars();
            match (chars.next(), chars.next()) {
                (Some(c), None) => Ok(c),
                _ => Err(CredwatchError::Environment {
                    variable: variable.to_string(),
                    message: format!("expected a single character, got '{}'", raw),
                }),
            }
        }
    }
}

impl DomainConfig {
    /// Build a domain from `{prefix}_*` variables.
    ///
    /// Returns `Ok(None)` when `{prefix}_DIRS` is unset and no default
    /// directories are given.
    pub fn from_env(
        name: impl Into<String>,
        prefix: &str,
        default_dirs: &[&str],
    ) -> CredwatchResult<Option<Self>> {
        let name = name.into();
        let delimiter = read_delimiter(&format!("{}_DIRS_DELIMITER", prefix))?;
        let directories = match read_var(&format!("{}_DIRS", prefix))? {
            Some(raw) => parse_directory_list(&raw, delimiter),
            None if default_dirs.is_empty() => return Ok(None),
            None => default_dirs.iter().map(PathBuf::from).collect(),
        };

        if directories.is_empty() {
            return Err(CredwatchError::Environment {
                variable: format!("{}_DIRS", prefix),
                message: "no directories listed".to_string(),
            });
        }

        tracing::info!(
            domain = %name,
            directories = %directories
                .iter()
                .map(|d| d.display().to_string())
                .collect::<Vec<_>>()
                .join(", "),
            "{}_DIRS resolved",
            prefix
        );

        let mut config = DomainConfig::new(name).with_directories(directories);

        if let Some(raw) = read_var(&format!("{}_EXPECTED_KEYS", prefix))? {
            config.expected_keys = parse_key_list(&raw);
        }
        if let Some(ms) = read_u64(&format!("{}_DEBOUNCE_MS", prefix))? {
            config.watch.debounce = Duration::from_millis(ms);
        }
        if let Some(ms) = read_u64(&format!("{}_MAX_WAIT_MS", prefix))? {
            config.watch.max_wait = Duration::from_millis(ms);
        }
        if let Some(secs) = read_u64(&format!("{}_POLL_INTERVAL_SECS", prefix))? {
            if secs == 0 {
                return Err(CredwatchError::Environment {
                    variable: format!("{}_POLL_INTERVAL_SECS", prefix),
                    message: "interval must be at least one second".to_string(),
                });
            }
            config.watch = config.watch.with_poll_interval(Duration::from_secs(secs));
        }
        if let Some(recursive) = read_bool(&format!("{}_RECURSIVE", prefix))? {
            config.watch.recursive = recursive;
        }

        Ok(Some(config))
    }
}

impl AppConfig {
    /// Build the process configuration from the environment.
    ///
    /// The `database` domain is always present (falling back to
    /// `./secrets`); the `tokens` domain only when `TOKEN_SECRETS_DIRS` is set.
    pub fn from_env() -> CredwatchResult<Self> {
        let mut domains = Vec::new();

        if let Some(mut database) =
            DomainConfig::from_env("database", SECRETS_ENV_PREFIX, &[DEFAULT_SECRETS_DIR])?
        {
            if read_var(&format!("{}_EXPECTED_KEYS", SECRETS_ENV_PREFIX))?.is_none() {
                database.expected_keys = DatabaseSettings::KEYS.iter().map(|k| k.to_string()).collect();
            }
            domains.push(database);
        }

        if let Some(mut tokens) = DomainConfig::from_env("tokens", TOKEN_SECRETS_ENV_PREFIX, &[])? {
            if read_var(&format!("{}_EXPECTED_KEYS", TOKEN_SECRETS_ENV_PREFIX))?.is_none() {
                tokens.expected_keys = vec![ApiTokens::API_TOKEN.to_string()];
            }
            domains.push(tokens);
        }

        Ok(AppConfig { domains })
    }
}
