//! Error handling for credwatch.
//!
//! Errors are split along the lines the reload loop cares about:
//!
//! | Category | Examples | Effect |
//! |----------|----------|--------|
//! | Advisory | missing directory, unreadable file | logged, load continues |
//! | Recoverable | handler failure, panicked callback | logged, next cycle retries |
//! | Fatal | watcher backend unavailable | setup aborts |
//! | Configuration | bad env var, bad config file | setup aborts |
//!
//! Consumer callbacks report failures with [`HandlerError`], which the
//! coordinator wraps into [`CredwatchError::Handler`].

mod category;
mod credwatch_error;
mod handler;

pub use category::ErrorCategory;
pub use credwatch_error::CredwatchError;
pub use handler::HandlerError;

/// Type alias for Results using CredwatchError.
pub type CredwatchResult<T> = Result<T, CredwatchError>;
