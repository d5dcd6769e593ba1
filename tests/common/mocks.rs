//! Mock reload handlers for integration tests.

#![allow(dead_code)]

use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use credwatch::error::HandlerError;
use credwatch::store::CredentialStore;
use credwatch::traits::ReloadHandler;
use tokio::sync::Notify;

/// Lets a test hold one specific handler call open.
#[derive(Default)]
pub struct CallGate {
    /// Notified when the gated call starts.
    pub entered: Notify,
    /// Notify to let the gated call finish.
    pub open: Notify,
}

/// Handler that records every call it receives.
#[derive(Default)]
pub struct RecordingHandler {
    calls: AtomicUsize,
    active: AtomicUsize,
    max_active: AtomicUsize,
    released: AtomicUsize,
    generations: Mutex<Vec<u64>>,
    values: Mutex<Vec<Option<String>>>,
    watched_key: Option<String>,
    delay: Duration,
    gate: Option<(usize, Arc<CallGate>)>,
}

impl RecordingHandler {
    pub fn new() -> Self {
        Self::default()
    }

    /// Also record the value of `key` seen by each call.
    pub fn watching(mut self, key: &str) -> Self {
        self.watched_key = Some(key.to_string());
        self
    }

    /// Sleep inside every call.
    pub fn with_delay(mut self, delay: Duration) -> Self {
        self.delay = delay;
        self
    }

    /// Block the `call`-th invocation (1-based, the initial load is call 1)
    /// until the returned gate is opened.
    pub fn gated(mut self, call: usize) -> (Self, Arc<CallGate>) {
        let gate = Arc::new(CallGate::default());
        self.gate = Some((call, Arc::clone(&gate)));
        (self, gate)
    }

    pub fn calls(&self) -> usize {
        self.calls.load(Ordering::SeqCst)
    }

    pub fn max_active(&self) -> usize {
        self.max_active.load(Ordering::SeqCst)
    }

    pub fn released(&self) -> usize {
        self.released.load(Ordering::SeqCst)
    }

    pub fn generations(&self) -> Vec<u64> {
        self.generations.lock().unwrap().clone()
    }

    pub fn values(&self) -> Vec<Option<String>> {
        self.values.lock().unwrap().clone()
    }
}

#[async_trait]
impl ReloadHandler for RecordingHandler {
    async fn on_reload(&self, store: Arc<CredentialStore>) -> Result<(), HandlerError> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
        let active = self.active.fetch_add(1, Ordering::SeqCst) + 1;
        self.max_active.fetch_max(active, Ordering::SeqCst);

        self.generations.lock().unwrap().push(store.generation());
        if let Some(key) = &self.watched_key {
            self.values.lock().unwrap().push(store.get(key));
        }

        if let Some((gated_call, gate)) = &self.gate {
            if call == *gated_call {
                gate.entered.notify_one();
                gate.open.notified().await;
            }
        }
        if !self.delay.is_zero() {
            tokio::time::sleep(self.delay).await;
        }

        self.active.fetch_sub(1, Ordering::SeqCst);
        Ok(())
    }

    async fn release(&self) {
        self.released.fetch_add(1, Ordering::SeqCst);
    }
}
