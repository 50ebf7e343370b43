//! Payload types exchanged with a response source.

use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use tokio::sync::mpsc;

use crate::error::RequestError;

// =============================================================================
// STREAMING
// =============================================================================

/// One incremental unit of streamed text.
///
/// `content` is the full text so far, not a delta: each fragment extends
/// the previous one. Exactly the last fragment has `is_complete = true`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Fragment {
    pub content: String,
    pub is_complete: bool,
}

impl Fragment {
    pub fn partial(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_complete: false }
    }

    pub fn complete(content: impl Into<String>) -> Self {
        Self { content: content.into(), is_complete: true }
    }
}

/// Lazy, finite, non-restartable sequence of fragments.
///
/// Backed by a bounded channel whose producer is a task owned by the
/// source. Items arrive in production order.
#[derive(Debug)]
pub struct FragmentStream {
    rx: mpsc::Receiver<Result<Fragment, RequestError>>,
}

impl FragmentStream {
    #[must_use]
    pub fn new(rx: mpsc::Receiver<Result<Fragment, RequestError>>) -> Self {
        Self { rx }
    }

    /// Sender/stream pair for sources that produce fragments from a task.
    #[must_use]
    pub fn channel(capacity: usize) -> (mpsc::Sender<Result<Fragment, RequestError>>, Self) {
        let (tx, rx) = mpsc::channel(capacity.max(1));
        (tx, Self::new(rx))
    }

    /// Wait for the next fragment. `None` once the producer is gone.
    pub async fn next(&mut self) -> Option<Result<Fragment, RequestError>> {
        self.rx.recv().await
    }
}

// =============================================================================
// SEARCH
// =============================================================================

/// A suggested refinement filter.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchFilter {
    pub label: String,
    pub value: String,
}

/// A follow-up action offered next to search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchAction {
    pub label: String,
    pub icon: String,
}

/// Structured result of a non-streaming query.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SearchResult {
    pub content: String,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub suggestions: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub filters: Vec<SearchFilter>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub actions: Vec<SearchAction>,
}

// =============================================================================
// FORM
// =============================================================================

/// Form values keyed by field name. Ordered so validation output is stable.
pub type FormFields = BTreeMap<String, String>;

/// Outcome of a validation pass.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct Validation {
    pub is_valid: bool,
    pub warnings: Vec<String>,
    pub tips: Vec<String>,
}
