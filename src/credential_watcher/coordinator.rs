//! Coordinates change detection, credential reloads and consumer callbacks.
//!
//! One [`ReloadCoordinator`] per secret domain. It owns the domain's
//! [`CredentialStore`], an optional [`ChangeWatcher`], and a driver task
//! that serializes reloads through [`CredentialWatchState`].

use std::sync::Arc;
use std::time::Instant;

use tokio::sync::{mpsc, watch};
use tokio::task::{JoinError, JoinHandle};

use super::state::{CredentialWatchState, ReloadAction, ReloadStatus};
use super::types::ChangeBatch;
use super::watcher::ChangeWatcher;
use crate::config::{DomainConfig, WatchOptions};
use crate::error::{CredwatchError, CredwatchResult};
use crate::store::{CredentialStore, LoadReport};
use crate::traits::ReloadHandler;

/// What drives reloads besides [`ReloadCoordinator::trigger`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ChangeSource {
    /// Watch the store's directories.
    Watch(WatchOptions),
    /// No watcher; reloads only happen on `trigger()`.
    Manual,
}

impl ChangeSource {
    pub fn from_config(config: &DomainConfig) -> Self {
        Self::Watch(config.watch.clone())
    }
}

/// Request for a reload, as seen by the driver.
#[derive(Debug)]
enum ReloadSignal {
    Changed(ChangeBatch),
    Manual,
}

/// Result of one reload task.
enum ReloadOutcome {
    Published {
        report: LoadReport,
        callback: CredwatchResult<()>,
        started: Instant,
    },
    LoadFailed(CredwatchError),
}

/// Keeps one credential domain fresh.
///
/// Construction performs a full load and calls the handler once, so the
/// consumer has valid state as soon as [`start`](Self::start) returns.
/// Afterwards every change signal either starts a reload or, if one is
/// already running, marks exactly one follow-up reload.
pub struct ReloadCoordinator {
    domain: String,
    store: Arc<CredentialStore>,
    handler: Arc<dyn ReloadHandler>,
    signal_tx: mpsc::UnboundedSender<ReloadSignal>,
    status_rx: watch::Receiver<ReloadStatus>,
    shutdown_tx: watch::Sender<bool>,
    watcher: Option<ChangeWatcher>,
    driver: tokio::sync::Mutex<Option<JoinHandle<()>>>,
}

impl ReloadCoordinator {
    /// Load the store, notify the handler, and start reacting to changes.
    ///
    /// Fails only when the change watcher cannot be created (or the initial
    /// load task dies). In that case `handler.release()` has already been
    /// called.
    pub async fn start(
        store: CredentialStore,
        handler: Arc<dyn ReloadHandler>,
        source: ChangeSource,
    ) -> CredwatchResult<Self> {
        let store = Arc::new(store);
        let domain = store.name().to_string();
        let (signal_tx, signal_rx) = mpsc::unbounded_channel();

        // Subscribe before the first load so no change slips in between.
        let watcher = match &source {
            ChangeSource::Watch(options) => {
                let tx = signal_tx.clone();
                let subscribed = ChangeWatcher::subscribe(
                    &domain,
                    store.directories(),
                    options,
                    move |batch| {
                        let _ = tx.send(ReloadSignal::Changed(batch));
                    },
                );
                match subscribed {
                    Ok(watcher) => Some(watcher),
                    Err(err) => {
                        tracing::error!(
                            domain = %domain,
                            error = %err,
                            code = err.error_code(),
                            "Failed to start change watcher"
                        );
                        handler.release().await;
                        return Err(err);
                    }
                }
            }
            ChangeSource::Manual => None,
        };

        let mut state = CredentialWatchState::new(&domain);
        let report = match load_and_validate(Arc::clone(&store)).await {
            Ok(report) => report,
            Err(err) => {
                tracing::error!(domain = %domain, error = %err, "Initial credential load failed");
                if let Some(watcher) = &watcher {
                    watcher.stop().await;
                }
                handler.release().await;
                return Err(err);
            }
        };
        let callback = invoke_handler(&domain, &handler, &store).await;
        state.record_initial_load(report.generation, callback.as_ref().map(|_| ()));

        tracing::info!(
            domain = %domain,
            generation = report.generation,
            keys = report.keys,
            watching = watcher.is_some(),
            "Reload coordinator started"
        );

        let (status_tx, status_rx) = watch::channel(state.status());
        let (shutdown_tx, shutdown_rx) = watch::channel(false);
        let driver = tokio::spawn(run_driver(
            domain.clone(),
            Arc::clone(&store),
            Arc::clone(&handler),
            state,
            signal_rx,
            status_tx,
            shutdown_rx,
        ));

        Ok(Self {
            domain,
            store,
            handler,
            signal_tx,
            status_rx,
            shutdown_tx,
            watcher,
            driver: tokio::sync::Mutex::new(Some(driver)),
        })
    }

    pub fn domain(&self) -> &str {
        &self.domain
    }

    /// The store this coordinator keeps up to date.
    pub fn store(&self) -> Arc<CredentialStore> {
        Arc::clone(&self.store)
    }

    /// Request a reload. Returns false once the coordinator has shut down.
    pub fn trigger(&self) -> bool {
        let accepted = self.signal_tx.send(ReloadSignal::Manual).is_ok();
        if !accepted {
            tracing::debug!(domain = %self.domain, "Reload trigger ignored after shutdown");
        }
        accepted
    }

    /// Current status snapshot.
    pub fn status(&self) -> ReloadStatus {
        self.status_rx.borrow().clone()
    }

    /// Receiver that observes every status update.
    pub fn subscribe_status(&self) -> watch::Receiver<ReloadStatus> {
        self.status_rx.clone()
    }

    /// Stop watching, finish any in-flight reload, then release the handler.
    ///
    /// Safe to call more than once; later calls wait for the first to
    /// finish and do nothing else.
    pub async fn shutdown(&self) {
        let mut driver = self.driver.lock().await;
        let Some(task) = driver.take() else {
            tracing::debug!(domain = %self.domain, "Reload coordinator already shut down");
            return;
        };

        tracing::info!(domain = %self.domain, "Shutting down reload coordinator");
        if let Some(watcher) = &self.watcher {
            watcher.stop().await;
        }

        let _ = self.shutdown_tx.send(true);
        if let Err(err) = task.await {
            let err = CredwatchError::task_failed("reload driver", err);
            tracing::error!(domain = %self.domain, error = %err, "Reload driver ended abnormally");
        }

        self.handler.release().await;
        tracing::info!(domain = %self.domain, "Reload coordinator stopped");
    }
}

impl std::fmt::Debug for ReloadCoordinator {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ReloadCoordinator")
            .field("domain", &self.domain)
            .field("watcher", &self.watcher)
            .finish_non_exhaustive()
    }
}

async fn run_driver(
    domain: String,
    store: Arc<CredentialStore>,
    handler: Arc<dyn ReloadHandler>,
    mut state: CredentialWatchState,
    mut signal_rx: mpsc::UnboundedReceiver<ReloadSignal>,
    status_tx: watch::Sender<ReloadStatus>,
    mut shutdown_rx: watch::Receiver<bool>,
) {
    let mut in_flight: Option<JoinHandle<ReloadOutcome>> = None;

    loop {
        tokio::select! {
            biased;

            _ = shutdown_rx.changed() => break,

            result = wait_in_flight(&mut in_flight) => {
                in_flight = None;
                finish_reload(&domain, &mut state, result);
                if state.on_reload_complete() == ReloadAction::StartReload {
                    tracing::info!(domain = %domain, "Starting follow-up reload for changes seen mid-reload");
                    in_flight = Some(spawn_reload(&domain, &store, &handler));
                }
                status_tx.send_replace(state.status());
            }

            signal = signal_rx.recv() => {
                let Some(signal) = signal else { break };
                match &signal {
                    ReloadSignal::Changed(batch) => tracing::debug!(
                        domain = %domain,
                        events = batch.events,
                        "Change signal received"
                    ),
                    ReloadSignal::Manual => tracing::debug!(domain = %domain, "Manual reload requested"),
                }
                match state.on_change_signal() {
                    ReloadAction::StartReload => {
                        in_flight = Some(spawn_reload(&domain, &store, &handler));
                    }
                    ReloadAction::Nothing => tracing::debug!(
                        domain = %domain,
                        phase = ?state.phase(),
                        "Reload in progress, signal collapsed"
                    ),
                }
                status_tx.send_replace(state.status());
            }
        }
    }

    if let Some(task) = in_flight.take() {
        tracing::debug!(domain = %domain, "Waiting for in-flight reload before shutdown");
        let result = task.await;
        finish_reload(&domain, &mut state, result);
    }
    state.on_shutdown();
    status_tx.send_replace(state.status());
    tracing::debug!(domain = %domain, "Reload driver finished");
}

async fn wait_in_flight(
    task: &mut Option<JoinHandle<ReloadOutcome>>,
) -> Result<ReloadOutcome, JoinError> {
    match task {
        Some(handle) => handle.await,
        None => std::future::pending().await,
    }
}

fn spawn_reload(
    domain: &str,
    store: &Arc<CredentialStore>,
    handler: &Arc<dyn ReloadHandler>,
) -> JoinHandle<ReloadOutcome> {
    let domain = domain.to_string();
    let store = Arc::clone(store);
    let handler = Arc::clone(handler);
    tokio::spawn(async move {
        let started = Instant::now();
        tracing::info!(domain = %domain, "Reloading credentials");
        let report = match load_and_validate(Arc::clone(&store)).await {
            Ok(report) => report,
            Err(err) => return ReloadOutcome::LoadFailed(err),
        };
        let callback = invoke_handler(&domain, &handler, &store).await;
        ReloadOutcome::Published {
            report,
            callback,
            started,
        }
    })
}

fn finish_reload(
    domain: &str,
    state: &mut CredentialWatchState,
    result: Result<ReloadOutcome, JoinError>,
) {
    let outcome = result.unwrap_or_else(|err| {
        ReloadOutcome::LoadFailed(CredwatchError::task_failed("reload", err))
    });

    match outcome {
        ReloadOutcome::Published {
            report,
            callback,
            started,
        } => {
            tracing::info!(
                domain = %domain,
                generation = report.generation,
                keys = report.keys,
                changed_keys = report.diff.added.len() + report.diff.removed.len() + report.diff.changed.len(),
                handler_ok = callback.is_ok(),
                elapsed_ms = started.elapsed().as_millis() as u64,
                "Reload completed"
            );
            state.record_reload(report.generation, callback.as_ref().map(|_| ()));
        }
        ReloadOutcome::LoadFailed(err) => {
            tracing::error!(
                domain = %domain,
                error = %err,
                code = err.error_code(),
                "Reload failed"
            );
            state.record_load_failure(&err);
        }
    }
}

async fn load_and_validate(store: Arc<CredentialStore>) -> CredwatchResult<LoadReport> {
    tokio::task::spawn_blocking(move || {
        let report = store.load();
        store.validate();
        report
    })
    .await
    .map_err(|err| CredwatchError::task_failed("credential load", err))
}

/// Run the handler in its own task so a panic cannot take the driver down.
async fn invoke_handler(
    domain: &str,
    handler: &Arc<dyn ReloadHandler>,
    store: &Arc<CredentialStore>,
) -> CredwatchResult<()> {
    let generation = store.generation();
    let handler = Arc::clone(handler);
    let store = Arc::clone(store);

    match tokio::spawn(async move { handler.on_reload(store).await }).await {
        Ok(Ok(())) => {
            tracing::debug!(domain = %domain, generation, "Reload handler succeeded");
            Ok(())
        }
        Ok(Err(err)) => {
            let err = CredwatchError::from(err);
            tracing::warn!(
                domain = %domain,
                generation,
                error = %err,
                code = err.error_code(),
                category = %err.category(),
                "Reload handler failed"
            );
            Err(err)
        }
        Err(join_err) => {
            let err = CredwatchError::task_failed("reload handler", join_err);
            tracing::error!(
                domain = %domain,
                generation,
                error = %err,
                code = err.error_code(),
                "Reload handler panicked"
            );
            Err(err)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::error::HandlerError;
    use crate::traits::FnHandler;
    use async_trait::async_trait;
    use std::fs;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;
    use tempfile::TempDir;

    fn counting_handler() -> (Arc<dyn ReloadHandler>, Arc<AtomicUsize>) {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = FnHandler::new(move |_: &CredentialStore| {
            counter.fetch_add(1, Ordering::SeqCst);
            Ok(())
        });
        let handler: Arc<dyn ReloadHandler> = Arc::new(handler);
        (handler, calls)
    }

    async fn wait_for_reloads(coordinator: &ReloadCoordinator, reloads: u64) -> ReloadStatus {
        let mut rx = coordinator.subscribe_status();
        let status = tokio::time::timeout(
            Duration::from_secs(10),
            rx.wait_for(|s| s.reloads_completed >= reloads),
        )
        .await
        .expect("timed out waiting for reload")
        .expect("status channel closed")
        .clone();
        status
    }

    #[tokio::test]
    async fn test_start_loads_and_calls_handler_once() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("HOST"), "1.2.3.4\n").unwrap();
        let (handler, calls) = counting_handler();

        let store = CredentialStore::new("db", [temp_dir.path()]);
        let coordinator = ReloadCoordinator::start(store, handler, ChangeSource::Manual)
            .await
            .unwrap();

        assert_eq!(coordinator.store().get("HOST").as_deref(), Some("1.2.3.4"));
        assert_eq!(calls.load(Ordering::SeqCst), 1);
        let status = coordinator.status();
        assert_eq!(status.generation, 1);
        assert_eq!(status.reloads_completed, 0);
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_trigger_reloads_store() {
        let temp_dir = TempDir::new().unwrap();
        fs::write(temp_dir.path().join("HOST"), "old").unwrap();
        let (handler, calls) = counting_handler();

        let store = CredentialStore::new("db", [temp_dir.path()]);
        let coordinator = ReloadCoordinator::start(store, handler, ChangeSource::Manual)
            .await
            .unwrap();

        fs::write(temp_dir.path().join("HOST"), "new").unwrap();
        assert!(coordinator.trigger());
        let status = wait_for_reloads(&coordinator, 1).await;

        assert_eq!(status.generation, 2);
        assert_eq!(coordinator.store().get("HOST").as_deref(), Some("new"));
        assert_eq!(calls.load(Ordering::SeqCst), 2);
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_error_does_not_stop_reloads() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = FnHandler::new(move |_: &CredentialStore| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                Err(HandlerError::Connect("refused".to_string()))
            } else {
                Ok(())
            }
        });

        let store = CredentialStore::new("db", Vec::<std::path::PathBuf>::new());
        let coordinator =
            ReloadCoordinator::start(store, Arc::new(handler), ChangeSource::Manual)
                .await
                .unwrap();

        coordinator.trigger();
        let status = wait_for_reloads(&coordinator, 1).await;
        assert_eq!(status.callback_failures, 1);
        assert!(status.last_error.as_deref().unwrap().contains("refused"));

        coordinator.trigger();
        let status = wait_for_reloads(&coordinator, 2).await;
        assert_eq!(status.callback_failures, 1);
        assert_eq!(status.consecutive_failures, 0);
        coordinator.shutdown().await;
    }

    #[tokio::test]
    async fn test_handler_panic_is_isolated() {
        let calls = Arc::new(AtomicUsize::new(0));
        let counter = calls.clone();
        let handler = FnHandler::new(move |_: &CredentialStore| {
            if counter.fetch_add(1, Ordering::SeqCst) == 1 {
                panic!("handler exploded");
            }
            Ok(())
        });

        let store = CredentialStore::new("db", Vec::<std::path::PathBuf>::new());
        let coordinator =
            ReloadCoordinator::start(store, Arc::new(handler), ChangeSource::Manual)
                .await
                .unwrap();

        coordinator.trigger();
        let status = wait_for_reloads(&coordinator, 1).await;
        assert!(status.last_error.as_deref().unwrap().contains("handler exploded"));

        coordinator.trigger();
        wait_for_reloads(&coordinator, 2).await;
        assert_eq!(calls.load(Ordering::SeqCst), 3);
        coordinator.shutdown().await;
    }

    struct ReleaseCounter {
        released: Arc<AtomicUsize>,
    }

    #[async_trait]
    impl ReloadHandler for ReleaseCounter {
        async fn on_reload(&self, _store: Arc<CredentialStore>) -> Result<(), HandlerError> {
            Ok(())
        }

        async fn release(&self) {
            self.released.fetch_add(1, Ordering::SeqCst);
        }
    }

    #[tokio::test]
    async fn test_shutdown_releases_once_and_rejects_triggers() {
        let released = Arc::new(AtomicUsize::new(0));
        let handler = Arc::new(ReleaseCounter {
            released: released.clone(),
        });

        let store = CredentialStore::new("db", Vec::<std::path::PathBuf>::new());
        let coordinator = ReloadCoordinator::start(store, handler, ChangeSource::Manual)
            .await
            .unwrap();

        tokio::join!(coordinator.shutdown(), coordinator.shutdown());
        coordinator.shutdown().await;

        assert_eq!(released.load(Ordering::SeqCst), 1);
        assert!(!coordinator.trigger());
    }
}
