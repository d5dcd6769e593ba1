//! Unified error type for credwatch.

use std::path::PathBuf;

use thiserror::Error;

use super::category::ErrorCategory;
use super::handler::HandlerError;

/// Errors produced by the credential store, watcher and coordinator.
///
/// Most variants are advisory: they are collected into load reports and
/// logged, never returned from the reload loop.
#[derive(Debug, Error)]
pub enum CredwatchError {
    /// The filesystem notification backend could not be created at all.
    #[error("Failed to create filesystem watcher: {source}")]
    WatcherInit {
        #[source]
        source: notify::Error,
    },

    /// A single directory could not be registered with the watcher.
    #[error("Failed to watch '{}': {source}", path.display())]
    Watch {
        path: PathBuf,
        #[source]
        source: notify::Error,
    },

    /// A source directory is missing or cannot be listed.
    #[error("Credential directory '{}' is not accessible: {source}", path.display())]
    DirectoryUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A credential file could not be read.
    #[error("Failed to read credential file '{}': {source}", path.display())]
    FileUnreadable {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// A credential file name is not valid UTF-8 and cannot be used as a key.
    #[error("Credential file name '{}' is not valid UTF-8", path.display())]
    InvalidKey { path: PathBuf },

    /// The consumer callback reported a failure.
    #[error("Reload handler failed: {0}")]
    Handler(#[from] HandlerError),

    /// A background task panicked or was cancelled.
    #[error("Task '{task}' did not complete: {message}")]
    TaskFailed { task: &'static str, message: String },

    /// An environment variable holds an unusable value.
    #[error("Environment variable '{variable}' is invalid: {message}")]
    Environment { variable: String, message: String },

    /// The config file could not be read.
    #[error("Failed to read config file '{}': {source}", path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    /// The config file is not valid JSON for the expected schema.
    #[error("Failed to parse config file '{}': {source}", path.display())]
    ConfigParse {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    /// The configuration is structurally invalid.
    #[error("Invalid configuration: {message}")]
    InvalidConfig { message: String },
}

impl CredwatchError {
    /// Get the category of this error.
    pub fn category(&self) -> ErrorCategory {
        match self {
            CredwatchError::WatcherInit { .. } => ErrorCategory::Fatal,
            CredwatchError::Watch { .. }
            | CredwatchError::DirectoryUnreadable { .. }
            | CredwatchError::FileUnreadable { .. }
            | CredwatchError::InvalidKey { .. } => ErrorCategory::Advisory,
            CredwatchError::Handler(_) | CredwatchError::TaskFailed { .. } => {
                ErrorCategory::Recoverable
            }
            CredwatchError::Environment { .. }
            | CredwatchError::ConfigRead { .. }
            | CredwatchError::ConfigParse { .. }
            | CredwatchError::InvalidConfig { .. } => ErrorCategory::Configuration,
        }
    }

    /// Get a short error code for logging.
    pub fn error_code(&self) -> &'static str {
        match self {
            CredwatchError::WatcherInit { .. } => "E_WATCH_INIT",
            CredwatchError::Watch { .. } => "E_WATCH_DIR",
            CredwatchError::DirectoryUnreadable { .. } => "E_LOAD_DIR",
            CredwatchError::FileUnreadable { .. } => "E_LOAD_FILE",
            CredwatchError::InvalidKey { .. } => "E_LOAD_KEY",
            CredwatchError::Handler(_) => "E_RELOAD_HANDLER",
            CredwatchError::TaskFailed { .. } => "E_RELOAD_TASK",
            CredwatchError::Environment { .. } => "E_CONFIG_ENV",
            CredwatchError::ConfigRead { .. } => "E_CONFIG_READ",
            CredwatchError::ConfigParse { .. } => "E_CONFIG_PARSE",
            CredwatchError::InvalidConfig { .. } => "E_CONFIG_INVALID",
        }
    }

    /// Path the error refers to, if any.
    pub fn path(&self) -> Option<&PathBuf> {
        match self {
            CredwatchError::Watch { path, .. }
            | CredwatchError::DirectoryUnreadable { path, .. }
            | CredwatchError::FileUnreadable { path, .. }
            | CredwatchError::InvalidKey { path }
            | CredwatchError::ConfigRead { path, .. }
            | CredwatchError::ConfigParse { path, .. } => Some(path),
            _ => None,
        }
    }

    pub(crate) fn task_failed(task: &'static str, err: tokio::task::JoinError) -> Self {
        let message = if err.is_panic() {
            let payload = err.into_panic();
            if let Some(s) = payload.downcast_ref::<&str>() {
                format!("panicked: {}", s)
            } else if let Some(s) = payload.downcast_ref::<String>() {
                format!("panicked: {}", s)
            } else {
                "panicked".to_string()
            }
        } else {
            "cancelled".to_string()
        };
        CredwatchError::TaskFailed { task, message }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io;

    #[test]
    fn test_directory_error_is_advisory() {
        let err = CredwatchError::DirectoryUnreadable {
            path: PathBuf::from("/missing"),
            source: io::Error::new(io::ErrorKind::NotFound, "not found"),
        };
        assert_eq!(err.category(), ErrorCategory::Advisory);
        assert_eq!(err.error_code(), "E_LOAD_DIR");
        assert!(err.to_string().contains("/missing"));
        assert_eq!(err.path(), Some(&PathBuf::from("/missing")));
    }

    #[test]
    fn test_handler_error_is_recoverable() {
        let err: CredwatchError = HandlerError::Connect("refused".to_string()).into();
        assert_eq!(err.category(), ErrorCategory::Recoverable);
        assert!(!err.category().is_fatal());
        assert!(err.to_string().contains("refused"));
        assert!(err.path().is_none());
    }

    #[test]
    fn test_watcher_init_is_fatal() {
        let err = CredwatchError::WatcherInit {
            source: notify::Error::generic("no inotify"),
        };
        assert!(err.category().is_fatal());
        assert_eq!(err.error_code(), "E_WATCH_INIT");
    }

    #[test]
    fn test_config_errors_are_configuration() {
        let err = CredwatchError::Environment {
            variable: "SECRETS_DEBOUNCE_MS".to_string(),
            message: "not a number".to_string(),
        };
        assert_eq!(err.category(), ErrorCategory::Configuration);
        assert!(err.to_string().contains("SECRETS_DEBOUNCE_MS"));
    }

    #[tokio::test]
    async fn test_task_failed_captures_panic_message() {
        let handle = tokio::spawn(async {
            panic!("boom");
        });
        let join_err = handle.await.unwrap_err();
        let err = CredwatchError::task_failed("reload handler", join_err);
        assert!(err.to_string().contains("boom"));
        assert_eq!(err.category(), ErrorCategory::Recoverable);
    }
}
