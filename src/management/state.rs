use std::{
    collections::HashMap,
    sync::{Arc, Mutex, MutexGuard},
    time::Duration,
};

use tokio::{task::JoinHandle, time::MissedTickBehavior};

use crate::{types::AuthStateEntry, utils::Clock};

pub const AUTH_STATE_TTL: Duration = Duration::from_secs(5 * 60);
pub const AUTH_STATE_SWEEP_INTERVAL: Duration = Duration::from_secs(60);

/// Outcome of [`AuthStateStore::take`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum AuthStateStatus {
    Missing,
    Expired,
    Valid(AuthStateEntry),
}

/// Pending login attempts keyed by their anti-CSRF state token.
///
/// Entries are single use: `take` removes the entry whatever the outcome.
/// Expiry is checked on every `take`, so an entry past its TTL is never
/// handed out even when the sweeper has not run yet.
pub struct AuthStateStore {
    ttl: Duration,
    clock: Arc<dyn Clock>,
    entries: Mutex<HashMap<String, AuthStateEntry>>,
}

impl AuthStateStore {
    pub fn new(ttl: Duration, clock: Arc<dyn Clock>) -> Self {
        Self {
            ttl,
            clock,
            entries: Mutex::new(HashMap::new()),
        }
    }

    /// Records a pending login under `state`.
    ///
    /// # Arguments
    ///
    /// * `state` - The OAuth `state` sent to the authorize endpoint.
    /// * `code_verifier` - The PKCE verifier to use once the callback arrives.
    pub fn store_state(&self, state: String, code_verifier: String) {
        let entry = AuthStateEntry {
            code_verifier,
            created_at: self.clock.now_ms(),
        };
        self.lock().insert(state, entry);
    }

    /// Removes the entry for `state` and reports whether it was usable.
    ///
    /// An entry is returned at most once. Expired entries are removed too and
    /// reported as [`AuthStateStatus::Expired`].
    pub fn take(&self, state: &str) -> AuthStateStatus {
        let Some(entry) = self.lock().remove(state) else {
            return AuthStateStatus::Missing;
        };

        if self.is_expired(entry.created_at, self.clock.now_ms()) {
            AuthStateStatus::Expired
        } else {
            AuthStateStatus::Valid(entry)
        }
    }

    /// Drops every expired entry and returns how many were removed.
    pub fn sweep(&self) -> usize {
        let now = self.clock.now_ms();
        let mut entries = self.lock();
        let before = entries.len();
        entries.retain(|_, entry| !self.is_expired(entry.created_at, now));
        before - entries.len()
    }

    pub fn len(&self) -> usize {
        self.lock().len()
    }

    pub fn is_empty(&self) -> bool {
        self.lock().is_empty()
    }

    pub fn ttl(&self) -> Duration {
        self.ttl
    }

    fn is_expired(&self, created_at: u64, now: u64) -> bool {
        u128::from(now.saturating_sub(created_at)) > self.ttl.as_millis()
    }

    fn lock(&self) -> MutexGuard<'_, HashMap<String, AuthStateEntry>> {
        // a panic while holding the lock cannot leave the map half-updated
        self.entries.lock().unwrap_or_else(|e| e.into_inner())
    }
}

/// Periodic sweep of an [`AuthStateStore`] on the tokio runtime.
///
/// Nothing runs until [`start`](Self::start) is called. The task is aborted
/// by [`stop`](Self::stop) or when the sweeper is dropped.
pub struct AuthStateSweeper {
    store: Arc<AuthStateStore>,
    interval: Duration,
    handle: Option<JoinHandle<()>>,
}

impl AuthStateSweeper {
    pub fn new(store: Arc<AuthStateStore>, interval: Duration) -> Self {
        Self {
            store,
            interval,
            handle: None,
        }
    }

    /// Spawns the periodic sweep. Does nothing when already running.
    pub fn start(&mut self) {
        if self.is_running() {
            return;
        }

        let store = Arc::clone(&self.store);
        let period = self.interval;
        self.handle = Some(tokio::spawn(async move {
            let start = tokio::time::Instant::now() + period;
            let mut ticker = tokio::time::interval_at(start, period);
            ticker.set_missed_tick_behavior(MissedTickBehavior::Delay);
            loop {
                ticker.tick().await;
                store.sweep();
            }
        }));
    }

    /// Aborts the sweep task.
    pub fn stop(&mut self) {
        if let Some(handle) = self.handle.take() {
            handle.abort();
        }
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|h| !h.is_finished())
    }
}

impl Drop for AuthStateSweeper {
    fn drop(&mut self) {
        self.stop();
    }
}
