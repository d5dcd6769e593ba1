//! Typed consumers of a credential domain.
//!
//! A [`FromCredentials`] type is re-derived from every published snapshot.
//! [`SettingsPublisher`] wraps one as a [`ReloadHandler`] and keeps the most
//! recent successfully derived value available to readers.

mod database;
mod tokens;

use std::sync::Arc;

use arc_swap::ArcSwapOption;
use async_trait::async_trait;

use crate::error::HandlerError;
use crate::store::{CredentialStore, Snapshot};
use crate::traits::ReloadHandler;

pub use database::DatabaseSettings;
pub use tokens::ApiTokens;

/// Settings that can be built from a credential snapshot.
pub trait FromCredentials: Sized {
    fn from_snapshot(snapshot: &Snapshot) -> Result<Self, HandlerError>;

    /// Build from the store's current snapshot.
    fn from_store(store: &CredentialStore) -> Result<Self, HandlerError> {
        Self::from_snapshot(&store.snapshot())
    }
}

/// Look up a credential that must be present and non-empty.
pub fn required<'a>(snapshot: &'a Snapshot, key: &str) -> Result<&'a str, HandlerError> {
    match snapshot.get(key) {
        Some(value) if !value.is_empty() => Ok(value),
        _ => Err(HandlerError::MissingCredential {
            key: key.to_string(),
        }),
    }
}

/// Look up a credential that may be absent. Empty values count as absent.
pub fn optional(snapshot: &Snapshot, key: &str) -> Option<String> {
    snapshot
        .get(key)
        .filter(|value| !value.is_empty())
        .map(str::to_string)
}

/// Publishes the latest valid `T` derived from a domain.
///
/// When derivation fails the previously published value stays in place.
pub struct SettingsPublisher<T> {
    current: ArcSwapOption<T>,
}

impl<T> SettingsPublisher<T>
where
    T: FromCredentials + Send + Sync + 'static,
{
    pub fn new() -> Self {
        Self {
            current: ArcSwapOption::empty(),
        }
    }

    /// Latest successfully derived settings, if any.
    pub fn current(&self) -> Option<Arc<T>> {
        self.current.load_full()
    }

    /// Re-derive from `store` and publish on success.
    pub fn refresh(&self, store: &CredentialStore) -> Result<Arc<T>, HandlerError> {
        let settings = Arc::new(T::from_store(store)?);
        self.current.store(Some(Arc::clone(&settings)));
        Ok(settings)
    }
}

impl<T> Default for SettingsPublisher<T>
where
    T: FromCredentials + Send + Sync + 'static,
{
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl<T> ReloadHandler for SettingsPublisher<T>
where
    T: FromCredentials + Send + Sync + 'static,
{
    async fn on_reload(&self, store: Arc<CredentialStore>) -> Result<(), HandlerError> {
        self.refresh(&store).map(|_| ())
    }

    async fn release(&self) {
        self.current.store(None);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::fs;
    use tempfile::TempDir;

    fn store_with(files: &[(&str, &str)]) -> (TempDir, CredentialStore) {
        let temp_dir = TempDir::new().unwrap();
        for (name, value) in files {
            fs::write(temp_dir.path().join(name), value).unwrap();
        }
        let store = CredentialStore::new("tokens", [temp_dir.path()]);
        store.load();
        (temp_dir, store)
    }

    #[test]
    fn test_required_rejects_missing_and_empty() {
        let (_dir, store) = store_with(&[("EMPTY", "  \n"), ("SET", "x")]);
        let snapshot = store.snapshot();

        assert_eq!(required(&snapshot, "SET").unwrap(), "x");
        assert_eq!(
            required(&snapshot, "EMPTY").unwrap_err(),
            HandlerError::MissingCredential {
                key: "EMPTY".to_string()
            }
        );
        assert!(required(&snapshot, "ABSENT").is_err());
        assert_eq!(optional(&snapshot, "EMPTY"), None);
        assert_eq!(optional(&snapshot, "SET").as_deref(), Some("x"));
    }

    #[test]
    fn test_publisher_keeps_last_good_value() {
        let (dir, store) = store_with(&[("API_TOKEN", "first")]);
        let publisher: SettingsPublisher<ApiTokens> = SettingsPublisher::new();
        assert!(publisher.current().is_none());

        publisher.refresh(&store).unwrap();
        assert_eq!(publisher.current().unwrap().api_token(), "first");

        fs::remove_file(dir.path().join("API_TOKEN")).unwrap();
        store.load();
        assert!(publisher.refresh(&store).is_err());
        assert_eq!(publisher.current().unwrap().api_token(), "first");
    }

    #[tokio::test]
    async fn test_publisher_release_clears_settings() {
        let (_dir, store) = store_with(&[("API_TOKEN", "t")]);
        let publisher: SettingsPublisher<ApiTokens> = SettingsPublisher::default();

        publisher.on_reload(Arc::new(store)).await.unwrap();
        assert!(publisher.current().is_some());

        publisher.release().await;
        assert!(publisher.current().is_none());
    }
}
