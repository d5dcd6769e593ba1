//! Reload handler trait abstraction.
//!
//! Consumers that derive state from credentials (connection pools, API
//! clients) implement [`ReloadHandler`] and hand it to a
//! [`ReloadCoordinator`](crate::credential_watcher::ReloadCoordinator).

use std::sync::Arc;

use async_trait::async_trait;

use crate::error::HandlerError;
use crate::store::CredentialStore;

/// Trait for reacting to credential reloads.
///
/// `on_reload` is called once after the initial load and once after every
/// reload. Calls for one coordinator never overlap. An error (or a panic)
/// is logged by the coordinator and does not stop future reloads, so the
/// next reload is the natural retry point.
///
/// # Example
///
/// ```ignore
/// use credwatch::traits::ReloadHandler;
///
/// struct Pool { /* ... */ }
///
/// #[async_trait]
/// impl ReloadHandler for Pool {
///     async fn on_reload(&self, store: Arc<CredentialStore>) -> Result<(), HandlerError> {
///         let settings = DatabaseSettings::from_store(&store)?;
///         self.reconnect(&settings).await
///     }
/// }
/// ```
#[async_trait]
pub trait ReloadHandler: Send + Sync {
    /// React to a freshly published snapshot.
    async fn on_reload(&self, store: Arc<CredentialStore>) -> Result<(), HandlerError>;

    /// Release held resources. Called exactly once, at coordinator shutdown,
    /// after the last `on_reload` has returned.
    async fn release(&self) {}
}

/// Adapts a plain closure into a [`ReloadHandler`].
pub struct FnHandler<F> {
    callback: F,
}

impl<F> FnHandler<F>
where
    F: Fn(&CredentialStore) -> Result<(), HandlerError> + Send + Sync,
{
    pub fn new(callback: F) -> Self {
        Self { callback }
    }
}

#[async_trait]
impl<F> ReloadHandler for FnHandler<F>
where
    F: Fn(&CredentialStore) -> Result<(), HandlerError> + Send + Sync,
{
    async fn on_reload(&self, store: Arc<CredentialStore>) -> Result<(), HandlerError> {
        (self.callback)(&store)
    }
}

impl<F> std::fmt::Debug for FnHandler<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("FnHandler")
    }
}
