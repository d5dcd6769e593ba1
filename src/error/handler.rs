//! Errors reported by reload handlers.

use thiserror::Error;

/// Failure reported by a consumer callback after a reload.
///
/// The coordinator logs these and keeps running; the handler decides
/// whether the next reload should retry whatever failed.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum HandlerError {
    /// A credential the consumer needs is absent from the store.
    #[error("Required credential '{key}' is missing")]
    MissingCredential { key: String },

    /// A credential is present but its value cannot be used.
    #[error("Credential '{key}' is invalid: {message}")]
    InvalidCredential { key: String, message: String },

    /// Re-establishing the downstream resource failed.
    #[error("Failed to connect: {0}")]
    Connect(String),

    /// Any other consumer-side failure.
    #[error("{0}")]
    Other(String),
}

impl HandlerError {
    /// Key the error refers to, if any.
    pub fn key(&self) -> Option<&str> {
        match self {
            HandlerError::MissingCredential { key } | HandlerError::InvalidCredential { key, .. } => {
                Some(key)
            }
            _ => None,
        }
    }
}
