//! Smart search: the debounced query box.
//!
//! A single-lane `RequestController` over `ResponseSource::fetch_result`.
//! Typing calls `set_query`; only the query left standing after the
//! debounce window is fetched.

use std::sync::Arc;
use std::time::Duration;

use tokio::sync::watch;

use super::request::{Fetch, RequestController};
use crate::error::RequestError;
use crate::responder::{ResponseSource, SearchResult};
use crate::state::RequestState;

const SEARCH_KEY: &str = "search";

/// Adapts a response source to the controller's fetch seam.
pub struct SearchFetch {
    source: Arc<dyn ResponseSource>,
}

#[async_trait::async_trait]
impl Fetch for SearchFetch {
    type Output = SearchResult;

    async fn fetch(&self, _key: &str, input: &str) -> Result<SearchResult, RequestError> {
        self.source.fetch_result(input).await
    }
}

#[derive(Clone)]
pub struct SmartSearch {
    controller: RequestController<SearchFetch>,
}

impl SmartSearch {
    #[must_use]
    pub fn new(source: Arc<dyn ResponseSource>, debounce: Duration) -> Self {
        Self { controller: RequestController::new(SearchFetch { source }, debounce) }
    }

    /// Record a keystroke. Blank queries reset to idle.
    pub fn set_query(&self, query: impl Into<String>) {
        self.controller.submit(SEARCH_KEY, query);
    }

    /// Re-run the last non-blank query now. `false` if there is none.
    pub fn retry(&self) -> bool {
        self.controller.retry(SEARCH_KEY)
    }

    pub fn clear(&self) {
        self.controller.clear(SEARCH_KEY);
    }

    #[must_use]
    pub fn state(&self) -> RequestState<SearchResult> {
        self.controller.state(SEARCH_KEY)
    }

    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.controller.subscribe()
    }
}

#[cfg(test)]
#[path = "search_test.rs"]
mod tests;
