//! State tracking for reload coordination.
//!
//! [`CredentialWatchState`] is the coordinator's state machine:
//!
//! ```text
//!            change                    change
//!   Idle ─────────────▶ Reloading ─────────────▶ PendingAgain
//!    ▲                   │    ▲                     │    ▲ change
//!    │  complete         │    │      complete       │    │ (absorbed)
//!    └───────────────────┘    └─────────────────────┘────┘
//! ```
//!
//! The transitions return a [`ReloadAction`] telling the caller whether to
//! start a reload. Any number of signals during a reload collapse into one
//! follow-up reload.

use chrono::{DateTime, Utc};
use serde::Serialize;

use crate::error::CredwatchError;

/// Coordinator phase.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum ReloadPhase {
    Idle,
    Reloading,
    /// A change arrived while reloading; one more reload follows.
    PendingAgain,
}

/// What the caller must do after a transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReloadAction {
    StartReload,
    Nothing,
}

/// Observable status of one domain's coordinator.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct ReloadStatus {
    pub domain: String,
    pub phase: ReloadPhase,
    /// Generation of the most recently published snapshot.
    pub generation: u64,
    /// Reloads finished after the initial load.
    pub reloads_completed: u64,
    pub signals_received: u64,
    /// Signals that did not start a reload of their own.
    pub signals_collapsed: u64,
    pub callback_failures: u64,
    pub consecutive_failures: u32,
    /// Follow-up reloads abandoned because shutdown arrived first.
    pub dropped_on_shutdown: u64,
    pub last_reload_at: Option<DateTime<Utc>>,
    pub last_error: Option<String>,
}

/// Main state for reload coordination.
#[derive(Debug)]
pub struct CredentialWatchState {
    status: ReloadStatus,
}

impl CredentialWatchState {
    pub fn new(domain: impl Into<String>) -> Self {
        Self {
            status: ReloadStatus {
                domain: domain.into(),
                phase: ReloadPhase::Idle,
                generation: 0,
                reloads_completed: 0,
                signals_received: 0,
                signals_collapsed: 0,
                callback_failures: 0,
                consecutive_failures: 0,
                dropped_on_shutdown: 0,
                last_reload_at: None,
                last_error: None,
            },
        }
    }

    pub fn phase(&self) -> ReloadPhase {
        self.status.phase
    }

    pub fn status(&self) -> ReloadStatus {
        self.status.clone()
    }

    /// A debounced change (or manual trigger) arrived.
    pub fn on_change_signal(&mut self) -> ReloadAction {
        self.status.signals_received += 1;
        match self.status.phase {
            ReloadPhase::Idle => {
                self.status.phase = ReloadPhase::Reloading;
                ReloadAction::StartReload
            }
            ReloadPhase::Reloading => {
                self.status.phase = ReloadPhase::PendingAgain;
                self.status.signals_collapsed += 1;
                ReloadAction::Nothing
            }
            ReloadPhase::PendingAgain => {
                self.status.signals_collapsed += 1;
                ReloadAction::Nothing
            }
        }
    }

    /// The in-flight reload finished (successfully or not).
    pub fn on_reload_complete(&mut self) -> ReloadAction {
        match self.status.phase {
            ReloadPhase::Reloading => {
                self.status.phase = ReloadPhase::Idle;
                ReloadAction::Nothing
            }
            ReloadPhase::PendingAgain => {
                self.status.phase = ReloadPhase::Reloading;
                ReloadAction::StartReload
            }
            ReloadPhase::Idle => {
                tracing::debug!(domain = %self.status.domain, "Reload completion while idle ignored");
                ReloadAction::Nothing
            }
        }
    }

    /// The coordinator is stopping and will start no further reloads.
    ///
    /// Must only be called once no reload is running.
    pub fn on_shutdown(&mut self) {
        if self.status.phase == ReloadPhase::PendingAgain {
            self.status.dropped_on_shutdown += 1;
            tracing::debug!(domain = %self.status.domain, "Pending reload dropped on shutdown");
        }
        self.status.phase = ReloadPhase::Idle;
    }

    /// Record the synchronous startup load.
    pub fn record_initial_load(&mut self, generation: u64, callback: Result<(), &CredwatchError>) {
        self.status.generation = generation;
        self.status.last_reload_at = Some(Utc::now());
        self.record_callback(callback);
    }

    /// Record a finished reload and its callback outcome.
    pub fn record_reload(&mut self, generation: u64, callback: Result<(), &CredwatchError>) {
        self.status.generation = generation;
        self.status.reloads_completed += 1;
        self.status.last_reload_at = Some(Utc::now());
        self.record_callback(callback);
    }

    /// Record a reload that never published a snapshot.
    pub fn record_load_failure(&mut self, err: &CredwatchError) {
        self.status.consecutive_failures += 1;
        self.status.last_error = Some(err.to_string());
    }

    fn record_callback(&mut self, callback: Result<(), &CredwatchError>) {
        match callback {
            Ok(()) => {
                if self.status.consecutive_failures > 0 {
                    tracing::info!(
                        domain = %self.status.domain,
                        failures = self.status.consecutive_failures,
                        "Reload handler recovered"
                    );
                }
                self.status.consecutive_failures = 0;
                self.status.last_error = None;
            }
            Err(err) => {
                self.status.callback_failures += 1;
                self.status.consecutive_failures += 1;
                self.status.last_error = Some(err.to_string());
            }
        }
    }
}
