//! Request lifecycle state shared by search, suggestions and validation.
//!
//! DESIGN
//! ======
//! Each logical request (the search box, one form field, the validation
//! pass) owns a `RequestState`. Transitions are pure: `apply` consumes the
//! old state plus one `RequestEvent` and returns the next state, so the
//! machine can be exercised without any timers or tasks.
//!
//! INVARIANTS
//! ==========
//! - `result` and `error` are never both populated.
//! - `error` is present exactly when `status == Error`.
//! - Every new submission clears both before its attempt resolves.

use serde::Serialize;

// =============================================================================
// STATUS TAXONOMY
// =============================================================================

/// Lifecycle position of a non-streaming request.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum RequestStatus {
    #[default]
    Idle,
    Loading,
    Success,
    Error,
}

/// Lifecycle position of a chat turn. Adds `Streaming` between the first
/// fragment and completion.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum ChatStatus {
    #[default]
    Idle,
    Loading,
    Streaming,
    Error,
}

impl ChatStatus {
    /// A send is in flight and new sends must be ignored.
    #[must_use]
    pub fn is_busy(self) -> bool {
        matches!(self, Self::Loading | Self::Streaming)
    }
}

// =============================================================================
// REQUEST STATE
// =============================================================================

/// Visible state of one request lane.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct RequestState<T> {
    pub status: RequestStatus,
    /// Last input submitted, retained for retry.
    pub last_input: Option<String>,
    pub result: Option<T>,
    pub error: Option<String>,
}

impl<T> Default for RequestState<T> {
    fn default() -> Self {
        Self { status: RequestStatus::Idle, last_input: None, result: None, error: None }
    }
}

/// Inputs to the request state machine.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestEvent<T> {
    /// New input accepted; its fetch waits for the debounce window.
    Scheduled { input: String },
    /// Blank input: back to idle, input memory kept for retry.
    Blanked,
    /// A fetch for `input` was issued.
    Started { input: String },
    Succeeded(T),
    Failed(String),
    /// Forget everything.
    Cleared,
}

impl<T> RequestState<T> {
    #[must_use]
    pub fn apply(self, event: RequestEvent<T>) -> Self {
        match event {
            RequestEvent::Scheduled { input } => {
                Self { status: RequestStatus::Idle, last_input: Some(input), result: None, error: None }
            }
            RequestEvent::Blanked => Self { status: RequestStatus::Idle, result: None, error: None, ..self },
            RequestEvent::Started { input } => {
                Self { status: RequestStatus::Loading, last_input: Some(input), result: None, error: None }
            }
            RequestEvent::Succeeded(value) => {
                Self { status: RequestStatus::Success, result: Some(value), error: None, ..self }
            }
            RequestEvent::Failed(message) => {
                Self { status: RequestStatus::Error, result: None, error: Some(message), ..self }
            }
            RequestEvent::Cleared => Self::default(),
        }
    }

    /// Input `retry` would re-issue: the last one recorded, if non-blank.
    #[must_use]
    pub fn retry_input(&self) -> Option<&str> {
        self.last_input
            .as_deref()
            .filter(|input| !input.trim().is_empty())
    }

    #[must_use]
    pub fn is_loading(&self) -> bool {
        self.status == RequestStatus::Loading
    }
}

#[cfg(test)]
#[path = "state_test.rs"]
mod tests;
