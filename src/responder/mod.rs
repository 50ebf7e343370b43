//! Responder: the in-process boundary behind every dashboard widget.
//!
//! DESIGN
//! ======
//! `ResponseSource` is the only collaborator the request controller and
//! the chat session talk to. The shipped implementation is
//! [`mock::MockResponder`], which fakes latency and failures; a real
//! backend can implement the same trait without touching either consumer.
//! Every failure is reported as [`RequestError::RequestFailed`].

pub mod mock;
pub mod types;

pub use mock::MockResponder;
pub use types::{FormFields, Fragment, FragmentStream, SearchAction, SearchFilter, SearchResult, Validation};

use crate::error::RequestError;

/// Provider-neutral async source of responses. Enables mocking in tests.
#[async_trait::async_trait]
pub trait ResponseSource: Send + Sync {
    /// Start streaming a chat reply for `prompt`.
    ///
    /// Returns immediately; latency and failures surface through the stream.
    /// Implementations may spawn the producer as a task, so this must be
    /// called from within a Tokio runtime.
    fn stream_response(&self, prompt: &str) -> FragmentStream;

    /// Fetch a structured result for a search query.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::RequestFailed`] when the request fails.
    async fn fetch_result(&self, query: &str) -> Result<SearchResult, RequestError>;

    /// Fetch up to three suggestions for a form field.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::RequestFailed`] when the request fails.
    async fn fetch_field_suggestions(&self, field: &str, partial: &str) -> Result<Vec<String>, RequestError>;

    /// Validate a set of form values.
    ///
    /// # Errors
    ///
    /// Returns [`RequestError::RequestFailed`] when the request fails.
    async fn validate(&self, fields: &FormFields) -> Result<Validation, RequestError>;
}
