//! Debouncing logic for credential change events.
//!
//! Pure state machine: callers pass the current time in, so tests can drive
//! it with tokio's paused clock.
//!
//! A burst starts with its first event. Each further event pushes the
//! deadline to `last_event + window`, but never past `first_event + max_wait`
//! so a file that is rewritten continuously still produces a reload.

use std::time::Duration;

use tokio::time::Instant;

use super::types::{ChangeBatch, CredentialChangeEvent};

/// Manages debouncing of credential change events
#[derive(Debug)]
pub struct Debouncer {
    window: Duration,
    max_wait: Duration,
    pending_since: Option<Instant>,
    last_event: Option<Instant>,
    batch: ChangeBatch,
}

impl Debouncer {
    pub fn new(window: Duration, max_wait: Duration) -> Self {
        Self {
            window,
            max_wait: max_wait.max(window),
            pending_since: None,
            last_event: None,
            batch: ChangeBatch::default(),
        }
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    /// Whether a burst is waiting to be delivered.
    pub fn is_pending(&self) -> bool {
        self.pending_since.is_some()
    }

    /// Absorb an event into the current burst (or start a new one).
    pub fn record(&mut self, event: &CredentialChangeEvent, now: Instant) {
        if self.pending_since.is_none() {
            self.pending_since = Some(now);
        }
        self.last_event = Some(now);
        self.batch.record(event);
    }

    /// When the pending burst should be delivered.
    pub fn deadline(&self) -> Option<Instant> {
        let started = self.pending_since?;
        let last = self.last_event.unwrap_or(started);
        Some((last + self.window).min(started + self.max_wait))
    }

    /// Hand out the burst if its deadline has passed.
    pub fn take_expired(&mut self, now: Instant) -> Option<ChangeBatch> {
        match self.deadline() {
            Some(deadline) if now >= deadline => {
                self.pending_since = None;
                self.last_event = None;
                Some(std::mem::take(&mut self.batch))
            }
            _ => None,
        }
    }
}
