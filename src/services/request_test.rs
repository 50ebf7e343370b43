use std::collections::{HashMap, HashSet};

use super::*;
use crate::state::RequestStatus;

const DEBOUNCE: Duration = Duration::from_millis(500);

// =========================================================================
// RecordingFetch
// =========================================================================

#[derive(Default)]
struct RecordingFetch {
    calls: Mutex<Vec<String>>,
    delays: Mutex<HashMap<String, Duration>>,
    failing: Mutex<HashSet<String>>,
}

impl RecordingFetch {
    fn calls(&self) -> Vec<String> {
        self.calls.lock().unwrap().clone()
    }

    fn delay(&self, input: &str, ms: u64) {
        self.delays
            .lock()
            .unwrap()
            .insert(input.into(), Duration::from_millis(ms));
    }

    fn fail(&self, input: &str) {
        self.failing.lock().unwrap().insert(input.into());
    }

    fn heal(&self, input: &str) {
        self.failing.lock().unwrap().remove(input);
    }
}

#[async_trait::async_trait]
impl Fetch for Arc<RecordingFetch> {
    type Output = String;

    async fn fetch(&self, _key: &str, input: &str) -> Result<String, RequestError> {
        self.calls.lock().unwrap().push(input.to_string());
        let delay = self.delays.lock().unwrap().get(input).copied();
        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if self.failing.lock().unwrap().contains(input) {
            return Err(RequestError::failed(format!("failed: {input}")));
        }
        Ok(format!("result:{input}"))
    }
}

fn controller() -> (Arc<RecordingFetch>, RequestController<Arc<RecordingFetch>>) {
    let fetch = Arc::new(RecordingFetch::default());
    let controller = RequestController::new(Arc::clone(&fetch), DEBOUNCE);
    (fetch, controller)
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

// =========================================================================
// debounce
// =========================================================================

#[tokio::test(start_paused = true)]
async fn rapid_submits_fetch_only_the_last_input() {
    let (fetch, ctl) = controller();
    for input in ["r", "re", "rev", "reve", "revenue"] {
        ctl.submit("search", input);
        sleep_ms(100).await;
    }
    assert!(fetch.calls().is_empty());

    sleep_ms(600).await;
    assert_eq!(fetch.calls(), vec!["revenue"]);
    let state = ctl.state("search");
    assert_eq!(state.status, RequestStatus::Success);
    assert_eq!(state.last_input.as_deref(), Some("revenue"));
    assert_eq!(state.result.as_deref(), Some("result:revenue"));
}

#[tokio::test(start_paused = true)]
async fn superseding_submit_restarts_the_window() {
    let (fetch, ctl) = controller();
    ctl.submit("search", "a");
    sleep_ms(400).await;
    ctl.submit("search", "b");
    sleep_ms(400).await;
    assert!(fetch.calls().is_empty());
    assert!(ctl.is_pending("search"));

    sleep_ms(150).await;
    assert_eq!(fetch.calls(), vec!["b"]);
    assert!(!ctl.is_pending("search"));
}

#[tokio::test(start_paused = true)]
async fn submit_clears_previous_outcome_immediately() {
    let (_fetch, ctl) = controller();
    ctl.submit("search", "first");
    sleep_ms(600).await;
    assert_eq!(ctl.state("search").status, RequestStatus::Success);

    ctl.submit("search", "second");
    let state = ctl.state("search");
    assert_eq!(state.status, RequestStatus::Idle);
    assert!(state.result.is_none());
    assert!(state.error.is_none());
}

#[tokio::test(start_paused = true)]
async fn blank_input_short_circuits_and_cancels_timer() {
    let (fetch, ctl) = controller();
    ctl.submit("search", "abc");
    ctl.submit("search", "   ");
    assert!(!ctl.is_pending("search"));
    assert_eq!(ctl.state("search").status, RequestStatus::Idle);

    sleep_ms(1000).await;
    assert!(fetch.calls().is_empty());
}

#[tokio::test(start_paused = true)]
async fn keys_debounce_independently() {
    let (fetch, ctl) = controller();
    ctl.submit("email", "a");
    ctl.submit("name", "b");
    sleep_ms(600).await;

    let mut calls = fetch.calls();
    calls.sort();
    assert_eq!(calls, vec!["a", "b"]);
    assert_eq!(ctl.state("email").result.as_deref(), Some("result:a"));
    assert_eq!(ctl.state("name").result.as_deref(), Some("result:b"));
}

// =========================================================================
// issuance order
// =========================================================================

#[tokio::test(start_paused = true)]
async fn slow_stale_success_does_not_overwrite_newer_result() {
    let (fetch, ctl) = controller();
    fetch.delay("slow", 1000);
    fetch.delay("fast", 10);

    ctl.submit("search", "slow"); // issued at 500, resolves at 1500
    sleep_ms(600).await;
    assert_eq!(ctl.state("search").status, RequestStatus::Loading);

    ctl.submit("search", "fast"); // issued at 1100, resolves at 1110
    sleep_ms(600).await;
    assert_eq!(ctl.state("search").result.as_deref(), Some("result:fast"));

    sleep_ms(500).await;
    let state = ctl.state("search");
    assert_eq!(state.status, RequestStatus::Success);
    assert_eq!(state.result.as_deref(), Some("result:fast"));
    assert_eq!(state.last_input.as_deref(), Some("fast"));
    assert_eq!(fetch.calls(), vec!["slow", "fast"]);
}

#[tokio::test(start_paused = true)]
async fn stale_failure_does_not_overwrite_newer_fetch() {
    let (fetch, ctl) = controller();
    fetch.delay("old", 900);
    fetch.fail("old");
    fetch.delay("new", 800);

    ctl.submit("search", "old"); // issued at 500, fails at 1400
    sleep_ms(550).await;
    ctl.submit("search", "new"); // issued at 1050, resolves at 1850
    sleep_ms(900).await; // t = 1450: old failure already arrived

    let state = ctl.state("search");
    assert_eq!(state.status, RequestStatus::Loading);
    assert!(state.error.is_none());
    assert_eq!(state.last_input.as_deref(), Some("new"));

    sleep_ms(500).await;
    assert_eq!(ctl.state("search").result.as_deref(), Some("result:new"));
}

// =========================================================================
// retry
// =========================================================================

#[tokio::test(start_paused = true)]
async fn retry_after_error_reissues_last_input() {
    let (fetch, ctl) = controller();
    fetch.fail("q");
    ctl.submit("search", "q");
    sleep_ms(600).await;

    let state = ctl.state("search");
    assert_eq!(state.status, RequestStatus::Error);
    assert_eq!(state.error.as_deref(), Some("failed: q"));
    assert!(state.result.is_none());

    fetch.heal("q");
    assert!(ctl.retry("search"));
    let state = ctl.state("search");
    assert_eq!(state.status, RequestStatus::Loading);
    assert_eq!(state.last_input.as_deref(), Some("q"));

    sleep_ms(10).await;
    let state = ctl.state("search");
    assert_eq!(state.status, RequestStatus::Success);
    assert_eq!(state.result.as_deref(), Some("result:q"));
    assert_eq!(fetch.calls(), vec!["q", "q"]);
}

#[tokio::test(start_paused = true)]
async fn retry_bypasses_debounce() {
    let (fetch, ctl) = controller();
    ctl.submit("search", "x");
    sleep_ms(600).await;
    assert!(ctl.retry("search"));
    sleep_ms(1).await;
    assert_eq!(fetch.calls(), vec!["x", "x"]);
}

#[tokio::test(start_paused = true)]
async fn retry_without_input_is_noop() {
    let (fetch, ctl) = controller();
    assert!(!ctl.retry("search"));
    ctl.submit("search", "  ");
    assert!(!ctl.retry("search"));
    sleep_ms(600).await;
    assert!(fetch.calls().is_empty());
    assert_eq!(ctl.state("search").status, RequestStatus::Idle);
}

// =========================================================================
// clear / fetch_now / subscribe
// =========================================================================

#[tokio::test(start_paused = true)]
async fn clear_cancels_pending_fetch() {
    let (fetch, ctl) = controller();
    ctl.submit("search", "abc");
    ctl.clear("search");
    sleep_ms(1000).await;
    assert!(fetch.calls().is_empty());
    assert_eq!(ctl.state("search"), RequestState::default());
}

#[tokio::test(start_paused = true)]
async fn clear_discards_in_flight_result() {
    let (fetch, ctl) = controller();
    fetch.delay("abc", 300);
    ctl.submit("search", "abc");
    sleep_ms(600).await;
    assert_eq!(fetch.calls(), vec!["abc"]);

    ctl.clear("search");
    sleep_ms(500).await;
    assert_eq!(ctl.state("search"), RequestState::default());
    assert!(!ctl.retry("search"));
}

#[tokio::test(start_paused = true)]
async fn fetch_now_accepts_blank_input() {
    let (fetch, ctl) = controller();
    ctl.fetch_now("email", "");
    assert_eq!(ctl.state("email").status, RequestStatus::Loading);
    sleep_ms(1).await;
    assert_eq!(fetch.calls(), vec![""]);
    assert_eq!(ctl.state("email").result.as_deref(), Some("result:"));
}

#[tokio::test(start_paused = true)]
async fn retry_replays_blank_immediate_fetch() {
    let (fetch, ctl) = controller();
    fetch.fail("");
    ctl.fetch_now("email", "");
    sleep_ms(1).await;
    assert_eq!(ctl.state("email").status, RequestStatus::Error);

    fetch.heal("");
    assert!(ctl.retry("email"));
    assert_eq!(ctl.state("email").status, RequestStatus::Loading);
    sleep_ms(1).await;
    assert_eq!(ctl.state("email").result.as_deref(), Some("result:"));
    assert_eq!(fetch.calls(), vec!["", ""]);
}

#[tokio::test(start_paused = true)]
async fn blank_immediate_fetch_supersedes_earlier_input_for_retry() {
    let (fetch, ctl) = controller();
    ctl.submit("company", "acme");
    sleep_ms(600).await;
    fetch.fail("");
    ctl.fetch_now("company", "");
    sleep_ms(1).await;

    assert!(ctl.retry("company"));
    sleep_ms(1).await;
    assert_eq!(fetch.calls(), vec!["acme", "", ""]);
}

#[tokio::test(start_paused = true)]
async fn clear_forgets_immediate_input() {
    let (_fetch, ctl) = controller();
    ctl.fetch_now("role", "");
    sleep_ms(1).await;
    ctl.clear("role");
    assert!(!ctl.retry("role"));
}

#[tokio::test(start_paused = true)]
async fn subscribe_sees_revisions() {
    let (_fetch, ctl) = controller();
    let mut rx = ctl.subscribe();
    let before = *rx.borrow_and_update();
    ctl.submit("search", "abc");
    assert!(rx.has_changed().unwrap());
    sleep_ms(600).await;
    assert!(*rx.borrow_and_update() >= before + 3);
}

#[test]
fn unknown_key_reads_idle() {
    let (_fetch, ctl) = controller();
    assert_eq!(ctl.state("nope"), RequestState::default());
    assert!(!ctl.is_pending("nope"));
    assert_eq!(ctl.debounce(), DEBOUNCE);
}
