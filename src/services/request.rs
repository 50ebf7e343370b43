//! Request controller: debounce, single-flight and retry per key.
//!
//! DESIGN
//! ======
//! Each logical key (the search box, one form field) owns a `Lane`: its
//! visible `RequestState`, a monotonic ticket counter and at most one
//! pending debounce timer. `submit` cancels the lane's pending timer,
//! takes a new ticket and arms a fresh timer. When the timer fires it
//! re-checks its ticket under the lock before issuing the fetch.
//!
//! ORDERING
//! ========
//! Every submit, retry, blank input and clear takes a new ticket. A fetch
//! settles only while its ticket is still the lane's latest, so the last
//! writer is decided by issuance order, never by completion order. Fetches
//! that already started are never aborted; their results are dropped.
//!
//! The lane map sits behind a `std::sync::Mutex` that is never held across
//! an `.await`.

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tokio::task::JoinHandle;
use tracing::{debug, warn};

use crate::error::RequestError;
use crate::state::{RequestEvent, RequestState};

// =============================================================================
// FETCH TRAIT
// =============================================================================

/// The effectful call a controller wraps. Enables mocking in tests.
#[async_trait::async_trait]
pub trait Fetch: Send + Sync + 'static {
    type Output: Clone + Send + Sync + 'static;

    /// Fetch a result for `input` under `key`.
    ///
    /// # Errors
    ///
    /// Any [`RequestError`] is treated uniformly as a failed attempt.
    async fn fetch(&self, key: &str, input: &str) -> Result<Self::Output, RequestError>;
}

// =============================================================================
// LANES
// =============================================================================

struct PendingFetch {
    seq: u64,
    timer: JoinHandle<()>,
}

struct Lane<T> {
    state: RequestState<T>,
    /// Latest ticket handed out. Only the holder may settle the lane.
    seq: u64,
    pending: Option<PendingFetch>,
    /// Input of the latest `fetch_now`, replayed by `retry` even when blank.
    immediate: Option<String>,
}

impl<T> Default for Lane<T> {
    fn default() -> Self {
        Self { state: RequestState::default(), seq: 0, pending: None, immediate: None }
    }
}

impl<T> Lane<T> {
    fn transition(&mut self, event: RequestEvent<T>) {
        let state = std::mem::take(&mut self.state);
        self.state = state.apply(event);
    }

    /// Cancel the armed debounce timer, if any, and hand out a new ticket.
    fn next_ticket(&mut self) -> u64 {
        if let Some(pending) = self.pending.take() {
            pending.timer.abort();
        }
        self.seq += 1;
        self.seq
    }
}

struct Shared<F: Fetch> {
    fetcher: F,
    debounce: Duration,
    lanes: Mutex<HashMap<String, Lane<F::Output>>>,
    revision: watch::Sender<u64>,
}

impl<F: Fetch> Shared<F> {
    fn lanes(&self) -> MutexGuard<'_, HashMap<String, Lane<F::Output>>> {
        self.lanes
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    fn notify(&self) {
        self.revision.send_modify(|rev| *rev += 1);
    }

    /// Debounce timer elapsed: issue the fetch if the ticket is still current.
    async fn fire(self: Arc<Self>, key: String, input: String, seq: u64) {
        {
            let mut lanes = self.lanes();
            let Some(lane) = lanes.get_mut(&key) else {
                return;
            };
            if lane.seq != seq {
                debug!(%key, seq, latest = lane.seq, "request: superseded timer woke, skipping");
                return;
            }
            // Our own handle: dropping it detaches, it does not abort.
            lane.pending = None;
            lane.transition(RequestEvent::Started { input: input.clone() });
        }
        self.notify();
        self.run(key, input, seq).await;
    }

    /// Perform one fetch and settle the lane if `seq` is still the latest.
    async fn run(self: Arc<Self>, key: String, input: String, seq: u64) {
        debug!(%key, seq, input_len = input.len(), "request: fetch issued");
        let outcome = self.fetcher.fetch(&key, &input).await;

        {
            let mut lanes = self.lanes();
            let Some(lane) = lanes.get_mut(&key) else {
                return;
            };
            if lane.seq != seq {
                debug!(%key, seq, latest = lane.seq, ok = outcome.is_ok(), "request: discarding stale result");
                return;
            }
            match outcome {
                Ok(value) => lane.transition(RequestEvent::Succeeded(value)),
                Err(e) => {
                    warn!(%key, seq, error = %e, "request: fetch failed");
                    lane.transition(RequestEvent::Failed(e.message().to_string()));
                }
            }
        }
        self.notify();
    }
}

// =============================================================================
// CONTROLLER
// =============================================================================

/// Debounced, single-flight request engine keyed by string.
///
/// Cloning yields another handle to the same lanes. Methods that start
/// work spawn Tokio tasks and must be called from within a runtime.
pub struct RequestController<F: Fetch> {
    shared: Arc<Shared<F>>,
}

impl<F: Fetch> Clone for RequestController<F> {
    fn clone(&self) -> Self {
        Self { shared: Arc::clone(&self.shared) }
    }
}

impl<F: Fetch> RequestController<F> {
    #[must_use]
    pub fn new(fetcher: F, debounce: Duration) -> Self {
        let (revision, _) = watch::channel(0);
        Self { shared: Arc::new(Shared { fetcher, debounce, lanes: Mutex::new(HashMap::new()), revision }) }
    }

    #[must_use]
    pub fn debounce(&self) -> Duration {
        self.shared.debounce
    }

    /// Schedule a fetch for `input` after the debounce window.
    ///
    /// A later `submit` for the same key within the window discards this
    /// one. Blank input resets the lane to idle without fetching.
    pub fn submit(&self, key: impl Into<String>, input: impl Into<String>) {
        let key = key.into();
        let input = input.into();
        {
            let mut lanes = self.shared.lanes();
            let lane = lanes.entry(key.clone()).or_default();
            let seq = lane.next_ticket();
            lane.immediate = None;

            if input.trim().is_empty() {
                debug!(%key, seq, "request: blank input, resetting");
                lane.transition(RequestEvent::Blanked);
            } else {
                lane.transition(RequestEvent::Scheduled { input: input.clone() });
                let shared = Arc::clone(&self.shared);
                let timer_key = key.clone();
                let timer = tokio::spawn(async move {
                    tokio::time::sleep(shared.debounce).await;
                    shared.fire(timer_key, input, seq).await;
                });
                lane.pending = Some(PendingFetch { seq, timer });
            }
        }
        self.shared.notify();
    }

    /// Issue a fetch for `input` right away, bypassing the debounce window.
    ///
    /// Unlike [`submit`](Self::submit), blank input is fetched as given.
    pub fn fetch_now(&self, key: impl Into<String>, input: impl Into<String>) {
        let key = key.into();
        let input = input.into();
        let seq = {
            let mut lanes = self.shared.lanes();
            let lane = lanes.entry(key.clone()).or_default();
            let seq = lane.next_ticket();
            lane.immediate = Some(input.clone());
            lane.transition(RequestEvent::Started { input: input.clone() });
            seq
        };
        self.shared.notify();
        tokio::spawn(Arc::clone(&self.shared).run(key, input, seq));
    }

    /// Re-issue the last non-blank input for `key` immediately. A lane
    /// whose latest fetch came from [`fetch_now`](Self::fetch_now) replays
    /// that input instead, blank or not.
    ///
    /// Returns `false` (and does nothing) when no such input is recorded.
    pub fn retry(&self, key: &str) -> bool {
        let input = {
            let lanes = self.shared.lanes();
            lanes.get(key).and_then(|lane| {
                lane.state
                    .retry_input()
                    .map(str::to_owned)
                    .or_else(|| lane.immediate.clone())
            })
        };
        match input {
            Some(input) => {
                debug!(%key, "request: retrying");
                self.fetch_now(key, input);
                true
            }
            None => false,
        }
    }

    /// Cancel any pending timer and forget the lane's input and outcome.
    ///
    /// An in-flight fetch keeps running but its result is discarded.
    pub fn clear(&self, key: &str) {
        {
            let mut lanes = self.shared.lanes();
            let Some(lane) = lanes.get_mut(key) else {
                return;
            };
            lane.next_ticket();
            lane.immediate = None;
            lane.transition(RequestEvent::Cleared);
        }
        self.shared.notify();
    }

    /// Snapshot of one lane. Unknown keys read as idle.
    #[must_use]
    pub fn state(&self, key: &str) -> RequestState<F::Output> {
        self.shared
            .lanes()
            .get(key)
            .map(|lane| lane.state.clone())
            .unwrap_or_default()
    }

    /// Whether a debounce timer is armed for `key`.
    #[must_use]
    pub fn is_pending(&self, key: &str) -> bool {
        self.shared
            .lanes()
            .get(key)
            .is_some_and(|lane| lane.pending.as_ref().is_some_and(|p| p.seq == lane.seq))
    }

    /// Revision counter bumped after every visible transition.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.shared.revision.subscribe()
    }
}

#[cfg(test)]
#[path = "request_test.rs"]
mod tests;
