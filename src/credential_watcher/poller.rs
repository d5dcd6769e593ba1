//! Poll-based credential change detection.
//!
//! For mounts where filesystem notifications are unreliable (network
//! filesystems, some container runtimes) the directories are fingerprinted
//! on a fixed interval and a change event is sent whenever the fingerprint
//! moves.
//!
//! # Dependency Injection
//!
//! - Use `spawn_directory_poller()` in production (uses RealDirectories)
//! - Use `spawn_directory_poller_with_probe()` in tests (with MockProbe)

use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::MissedTickBehavior;

use super::probe::{DirectoryProbe, RealDirectories};
use super::types::CredentialChangeEvent;

/// Spawn the directory poller with an injected probe.
///
/// The initial fingerprint is captured before the first tick, so existing
/// credentials never count as a change.
///
/// Returns a JoinHandle that can be used to abort the task on shutdown.
pub fn spawn_directory_poller_with_probe(
    domain: &str,
    directories: Vec<PathBuf>,
    interval: Duration,
    event_tx: mpsc::UnboundedSender<CredentialChangeEvent>,
    probe: Arc<dyn DirectoryProbe>,
) -> JoinHandle<()> {
    let domain = domain.to_string();
    tokio::spawn(async move {
        tracing::info!(domain = %domain, interval = ?interval, "Directory poller started");

        let mut last = probe.fingerprint(&directories);
        tracing::debug!(domain = %domain, fingerprint = last, "Initial directory fingerprint");

        let mut ticker = tokio::time::interval(interval);
        ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
        // The first tick completes immediately.
        ticker.tick().await;

        loop {
            ticker.tick().await;

            let current = probe.fingerprint(&directories);
            if current == last {
                tracing::trace!(domain = %domain, "Credential directories unchanged");
                continue;
            }

            tracing::info!(
                domain = %domain,
                from = last,
                to = current,
                "Credential directories changed"
            );
            last = current;

            if event_tx.send(CredentialChangeEvent::poll()).is_err() {
                tracing::debug!(domain = %domain, "Event channel closed, stopping directory poller");
                break;
            }
        }

        tracing::debug!(domain = %domain, "Directory poller stopped");
    })
}

/// Spawn the directory poller (production version).
pub fn spawn_directory_poller(
    domain: &str,
    directories: Vec<PathBuf>,
    interval: Duration,
    event_tx: mpsc::UnboundedSender<CredentialChangeEvent>,
) -> JoinHandle<()> {
    spawn_directory_poller_with_probe(
        domain,
        directories,
        interval,
        event_tx,
        Arc::new(RealDirectories),
    )
}
