//! Error category classification.
//!
//! Every error the crate produces falls into one of a small number of
//! categories. The category decides how the reload loop treats it: advisory
//! and recoverable errors are logged and the loop keeps running, fatal ones
//! abort setup.

use std::fmt;

/// High-level categorization of errors for handling decisions.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum ErrorCategory {
    /// Degraded but valid outcome (missing directory, unreadable file,
    /// missing expected key). Logged, never retried on its own.
    Advisory,

    /// Failure outside the store after a reload (consumer callback,
    /// panicked task). Logged; the next change cycle tries again.
    Recoverable,

    /// Setup cannot continue (the monitoring primitive cannot be created).
    Fatal,

    /// Invalid configuration supplied by the operator.
    Configuration,
}

impl ErrorCategory {
    /// Returns true if errors in this category must stop startup.
    pub fn is_fatal(&self) -> bool {
        matches!(self, ErrorCategory::Fatal | ErrorCategory::Configuration)
    }

    /// Returns a short label for the category suitable for logging.
    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorCategory::Advisory => "advisory",
            ErrorCategory::Recoverable => "recoverable",
            ErrorCategory::Fatal => "fatal",
            ErrorCategory::Configuration => "configuration",
        }
    }

    /// Returns suggested recovery actions for this category.
    pub fn recovery_hint(&self) -> &'static str {
        match self {
            ErrorCategory::Advisory => "Check that the secret directories and files are mounted and readable",
            ErrorCategory::Recoverable => "The next detected change will retry the reload",
            ErrorCategory::Fatal => "Check file watch limits and platform support for filesystem notifications",
            ErrorCategory::Configuration => "Check the environment variables or config file",
        }
    }
}

impl fmt::Display for ErrorCategory {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
