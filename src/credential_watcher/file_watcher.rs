//! File-based credential change detection using the `notify` crate.
//!
//! A directory that cannot be watched at startup (typically a secrets mount
//! that has not appeared yet) is retried every [`REWATCH_INTERVAL`]. Once it
//! registers, a `Created` event for the directory itself is sent so the
//! credentials already inside it get loaded.

use std::path::PathBuf;
use std::sync::{Arc, Mutex, PoisonError, Weak};
use std::time::Duration;

use notify::{RecommendedWatcher, RecursiveMode, Watcher};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::types::{ChangeKind, CredentialChangeEvent};
use crate::error::{CredwatchError, CredwatchResult};

/// How often unwatchable directories are retried.
pub const REWATCH_INTERVAL: Duration = Duration::from_secs(5);

/// Handle for a running notify watcher.
///
/// Dropping it stops watching and cancels any pending retries.
pub struct FileWatcher {
    watcher: Option<Arc<Mutex<RecommendedWatcher>>>,
    retry: Option<JoinHandle<()>>,
}

impl FileWatcher {
    /// Whether some directories are still waiting to be registered.
    pub fn is_retrying(&self) -> bool {
        self.retry.as_ref().is_some_and(|task| !task.is_finished())
    }

    /// Stop watching. Idempotent.
    pub fn stop(&mut self) {
        if let Some(task) = self.retry.take() {
            task.abort();
        }
        self.watcher.take();
    }
}

impl Drop for FileWatcher {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for FileWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FileWatcher")
            .field("retrying", &self.is_retrying())
            .finish_non_exhaustive()
    }
}

/// Spawn the filesystem watcher for `directories`.
///
/// Raw events are translated into [`CredentialChangeEvent`]s and pushed to
/// `event_tx` from notify's own thread. Must be called from within a tokio
/// runtime.
///
/// Returns the watcher handle (MUST be kept alive - dropping it stops watching).
pub fn spawn_file_watcher(
    domain: &str,
    directories: &[PathBuf],
    recursive: bool,
    event_tx: mpsc::UnboundedSender<CredentialChangeEvent>,
) -> CredwatchResult<FileWatcher> {
    spawn_file_watcher_with_retry(domain, directories, recursive, REWATCH_INTERVAL, event_tx)
}

/// Like [`spawn_file_watcher`], retrying missing directories every `retry_interval`.
pub fn spawn_file_watcher_with_retry(
    domain: &str,
    directories: &[PathBuf],
    recursive: bool,
    retry_interval: Duration,
    event_tx: mpsc::UnboundedSender<CredentialChangeEvent>,
) -> CredwatchResult<FileWatcher> {
    let roots = directories.to_vec();
    let handler_domain = domain.to_string();
    let handler_tx = event_tx.clone();

    let mut watcher = notify::recommended_watcher(move |res: notify::Result<notify::Event>| {
        match res {
            Ok(event) => {
                for change in CredentialChangeEvent::from_notify(&event, &roots) {
                    tracing::trace!(
                        domain = %handler_domain,
                        kind = ?change.kind,
                        source = %change.source.description(),
                        "Filesystem event"
                    );
                    if handler_tx.send(change).is_err() {
                        tracing::debug!(domain = %handler_domain, "Event channel closed, dropping filesystem event");
                        return;
                    }
                }
            }
            Err(err) => {
                tracing::warn!(domain = %handler_domain, error = %err, "Filesystem watcher error");
            }
        }
    })
    .map_err(|source| CredwatchError::WatcherInit { source })?;

    let mode = if recursive {
        RecursiveMode::Recursive
    } else {
        RecursiveMode::NonRecursive
    };

    let mut unwatched = Vec::new();
    for dir in directories {
        match watcher.watch(dir, mode) {
            Ok(()) => {
                tracing::debug!(domain = %domain, path = %dir.display(), ?mode, "Watching credential directory");
            }
            Err(source) => {
                let err = CredwatchError::Watch {
                    path: dir.clone(),
                    source,
                };
                tracing::warn!(
                    domain = %domain,
                    error = %err,
                    retry = ?retry_interval,
                    "Credential directory not watchable yet, will retry"
                );
                unwatched.push(dir.clone());
            }
        }
    }

    tracing::info!(
        domain = %domain,
        watched = directories.len() - unwatched.len(),
        configured = directories.len(),
        recursive,
        "File watcher started"
    );

    let watcher = Arc::new(Mutex::new(watcher));
    let retry = (!unwatched.is_empty()).then(|| {
        tokio::spawn(rewatch_missing(
            domain.to_string(),
            Arc::downgrade(&watcher),
            unwatched,
            mode,
            retry_interval,
            event_tx,
        ))
    });

    Ok(FileWatcher {
        watcher: Some(watcher),
        retry,
    })
}

async fn rewatch_missing(
    domain: String,
    watcher: Weak<Mutex<RecommendedWatcher>>,
    mut pending: Vec<PathBuf>,
    mode: RecursiveMode,
    interval: Duration,
    event_tx: mpsc::UnboundedSender<CredentialChangeEvent>,
) {
    let mut ticker = tokio::time::interval(interval);
    ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
    // First tick completes immediately; registration was just attempted.
    ticker.tick().await;

    while !pending.is_empty() {
        ticker.tick().await;
        if event_tx.is_closed() {
            return;
        }
        let Some(watcher) = watcher.upgrade() else {
            return;
        };

        let mut guard = watcher.lock().unwrap_or_else(PoisonError::into_inner);
        pending.retain(|dir| {
            if guard.watch(dir, mode).is_err() {
                return true;
            }
            tracing::info!(domain = %domain, path = %dir.display(), "Credential directory appeared, now watching");
            let _ = event_tx.send(CredentialChangeEvent::file(dir.clone(), ChangeKind::Created));
            false
        });
    }

    tracing::debug!(domain = %domain, "All credential directories watched");
}
