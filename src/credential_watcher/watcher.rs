//! Debounced change watcher.
//!
//! [`ChangeWatcher`] owns an event source (notify watcher or directory
//! poller) and a background task that feeds every raw event through a
//! [`Debouncer`]. The `on_changed` callback runs on that task, once per
//! burst, so invocations never overlap.

use std::path::PathBuf;
use std::sync::{Mutex, PoisonError};
use std::time::Duration;

use tokio::sync::{mpsc, watch};
use tokio::task::JoinHandle;
use tokio::time::{sleep_until, Instant};

use super::debouncer::Debouncer;
use super::file_watcher::{spawn_file_watcher, FileWatcher};
use super::poller::spawn_directory_poller;
use super::types::{ChangeBatch, CredentialChangeEvent};
use crate::config::{WatchMode, WatchOptions};
use crate::error::{CredwatchError, CredwatchResult};

/// Keeps the raw event producer alive.
enum EventSource {
    Notify(FileWatcher),
    Poller(JoinHandle<()>),
}

/// Watches credential directories and reports debounced bursts of changes.
pub struct ChangeWatcher {
    domain: String,
    shutdown_tx: watch::Sender<bool>,
    task: tokio::sync::Mutex<Option<JoinHandle<()>>>,
    source: Mutex<Option<EventSource>>,
}

impl ChangeWatcher {
    /// Start watching `directories` according to `options`.
    ///
    /// Must be called from within a tokio runtime. Only failure to create
    /// the notify watcher itself is an error. In notify mode, directories
    /// that cannot be watched yet are retried periodically.
    pub fn subscribe<F>(
        domain: &str,
        directories: &[PathBuf],
        options: &WatchOptions,
        on_changed: F,
    ) -> CredwatchResult<Self>
    where
        F: FnMut(ChangeBatch) + Send + 'static,
    {
        let (event_tx, event_rx) = mpsc::unbounded_channel();

        let source = match options.mode {
            WatchMode::Notify => EventSource::Notify(spawn_file_watcher(
                domain,
                directories,
                options.recursive,
                event_tx,
            )?),
            WatchMode::Poll { interval } => EventSource::Poller(spawn_directory_poller(
                domain,
                directories.to_vec(),
                interval,
                event_tx,
            )),
        };

        let watcher = Self::from_events(
            domain,
            event_rx,
            options.debounce,
            options.max_wait,
            on_changed,
        );
        *watcher.source.lock().unwrap_or_else(PoisonError::into_inner) = Some(source);
        Ok(watcher)
    }

    /// Debounce an arbitrary stream of change events.
    ///
    /// The watcher finishes on its own once `events` closes and any pending
    /// burst has been delivered.
    pub fn from_events<F>(
        domain: &str,
        events: mpsc::UnboundedReceiver<CredentialChangeEvent>,
        debounce: Duration,
        max_wait: Duration,
        on_changed: F,
    ) -> Self
    where
        F: FnMut(ChangeBatch) + Send + 'static,
    {
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let debouncer = Debouncer::new(debounce, max_wait);
        let task = tokio::spawn(run_debounce_loop(
            domain.to_string(),
            events,
            debouncer,
            shutdown_rx,
            on_changed,
        ));

        Self {
            domain: domain.to_string(),
            shutdown_tx,
            task: tokio::sync::Mutex::new(Some(task)),
            source: Mutex::new(None),
        }
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// Stop watching.
    ///
    /// Once this returns `on_changed` will not be called again. A callback
    /// already running is allowed to finish. Calling `stop` twice is a no-op.
    pub async fn stop(&self) {
        let _ = self.shutdown_tx.send(true);

        let source = self
            .source
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        match source {
            Some(EventSource::Notify(mut watcher)) => watcher.stop(),
            Some(EventSource::Poller(handle)) => handle.abort(),
            None => {}
        }

        let task = self.task.lock().await.take();
        let Some(task) = task else {
            return;
        };
        match task.await {
            Ok(()) => tracing::debug!(domain = %self.domain, "Change watcher stopped"),
            Err(err) => {
                let err = CredwatchError::task_failed("change watcher", err);
                tracing::warn!(domain = %self.domain, error = %err, "Change watcher ended abnormally");
            }
        }
    }
}

impl Drop for ChangeWatcher {
    fn drop(&mut self) {
        let source = self
            .source
            .get_mut()
            .unwrap_or_else(PoisonError::into_inner)
            .take();
        if let Some(EventSource::Poller(handle)) = source {
            handle.abort();
        }
    }
}

impl std::fmt::Debug for ChangeWatcher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ChangeWatcher")
            .field("domain", &self.domain)
            .finish_non_exhaustive()
    }
}

async fn run_debounce_loop<F>(
    domain: String,
    mut events: mpsc::UnboundedReceiver<CredentialChangeEvent>,
    mut debouncer: Debouncer,
    mut shutdown_rx: watch::Receiver<bool>,
    mut on_changed: F,
) where
    F: FnMut(ChangeBatch) + Send + 'static,
{
    tracing::debug!(domain = %domain, window = ?debouncer.window(), "Debounce loop started");
    let mut events_open = true;

    loop {
        let deadline = debouncer.deadline();

        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => {
                if debouncer.is_pending() {
                    tracing::debug!(domain = %domain, "Dropping pending burst on shutdown");
                }
                break;
            }

            event = events.recv(), if events_open => match event {
                Some(event) => {
                    tracing::trace!(
                        domain = %domain,
                        source = %event.source.description(),
                        kind = ?event.kind,
                        "Change event absorbed"
                    );
                    debouncer.record(&event, Instant::now());
                }
                None => {
                    tracing::debug!(domain = %domain, "Change event source closed");
                    events_open = false;
                }
            },

            _ = sleep_until(deadline.unwrap_or_else(Instant::now)), if deadline.is_some() => {
                if let Some(batch) = debouncer.take_expired(Instant::now()) {
                    tracing::info!(
                        domain = %domain,
                        events = batch.events,
                        paths = %batch.describe(),
                        "Credential change detected"
                    );
                    on_changed(batch);
                }
            }
        }

        if !events_open && !debouncer.is_pending() {
            break;
        }
    }

    tracing::debug!(domain = %domain, "Debounce loop finished");
}
