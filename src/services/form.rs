//! Form assistant: per-field suggestions and validation.
//!
//! DESIGN
//! ======
//! Suggestions run through one `RequestController` keyed by field name,
//! so each field debounces on its own lane. Validation is a separate
//! request cycle guarded by a generation counter: editing any field clears
//! the previous validation and invalidates one still in flight, exactly
//! like a superseded suggestion fetch.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use tokio::sync::watch;
use tracing::{debug, warn};

use super::request::{Fetch, RequestController};
use crate::error::RequestError;
use crate::responder::{FormFields, ResponseSource, Validation};
use crate::state::{RequestEvent, RequestState, RequestStatus};

/// Fields the assistant knows about, in display order.
pub const FORM_FIELDS: [&str; 4] = ["name", "email", "company", "role"];

#[derive(Debug, thiserror::Error)]
pub enum FormError {
    #[error("unknown form field: {0}")]
    UnknownField(String),
}

/// Adapts a response source to the controller's fetch seam.
pub struct SuggestionFetch {
    source: Arc<dyn ResponseSource>,
}

#[async_trait::async_trait]
impl Fetch for SuggestionFetch {
    type Output = Vec<String>;

    async fn fetch(&self, key: &str, input: &str) -> Result<Vec<String>, RequestError> {
        self.source
            .fetch_field_suggestions(key, input)
            .await
    }
}

struct FormInner {
    values: FormFields,
    validation: RequestState<Validation>,
    /// Bumped by every edit and every validation attempt.
    generation: u64,
}

#[derive(Clone)]
pub struct FormAssistant {
    source: Arc<dyn ResponseSource>,
    suggestions: RequestController<SuggestionFetch>,
    inner: Arc<Mutex<FormInner>>,
}

impl FormAssistant {
    #[must_use]
    pub fn new(source: Arc<dyn ResponseSource>, debounce: Duration) -> Self {
        let values = FORM_FIELDS
            .iter()
            .map(|field| ((*field).to_string(), String::new()))
            .collect();
        let suggestions = RequestController::new(SuggestionFetch { source: Arc::clone(&source) }, debounce);
        let inner = FormInner { values, validation: RequestState::default(), generation: 0 };
        Self { source, suggestions, inner: Arc::new(Mutex::new(inner)) }
    }

    fn lock(&self) -> MutexGuard<'_, FormInner> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    /// Fetch default suggestions for every field, without debounce.
    pub fn load_initial_suggestions(&self) {
        for field in FORM_FIELDS {
            self.suggestions.fetch_now(field, "");
        }
    }

    /// Store a field value, drop any validation outcome and refresh the
    /// field's suggestions.
    ///
    /// # Errors
    ///
    /// Returns [`FormError::UnknownField`] for fields outside [`FORM_FIELDS`].
    pub fn set_field(&self, field: &str, value: impl Into<String>) -> Result<(), FormError> {
        if !FORM_FIELDS.contains(&field) {
            return Err(FormError::UnknownField(field.to_string()));
        }
        let value = value.into();
        {
            let mut inner = self.lock();
            inner.values.insert(field.to_string(), value.clone());
            inner.generation += 1;
            let validation = std::mem::take(&mut inner.validation);
            inner.validation = validation.apply(RequestEvent::Cleared);
        }

        if value.trim().is_empty() {
            self.suggestions.fetch_now(field, "");
        } else {
            self.suggestions.submit(field, value);
        }
        Ok(())
    }

    /// Retry a field's last suggestion fetch.
    pub fn retry_suggestions(&self, field: &str) -> bool {
        self.suggestions.retry(field)
    }

    #[must_use]
    pub fn suggestions(&self, field: &str) -> RequestState<Vec<String>> {
        self.suggestions.state(field)
    }

    /// Revision counter bumped whenever any field's suggestions change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<u64> {
        self.suggestions.subscribe()
    }

    #[must_use]
    pub fn values(&self) -> FormFields {
        self.lock().values.clone()
    }

    #[must_use]
    pub fn validation(&self) -> RequestState<Validation> {
        self.lock().validation.clone()
    }

    /// Badge status for the whole form: a completed validation that found
    /// warnings reads as `Error`.
    #[must_use]
    pub fn form_status(&self) -> RequestStatus {
        let inner = self.lock();
        match (&inner.validation.status, &inner.validation.result) {
            (RequestStatus::Success, Some(result)) if !result.is_valid => RequestStatus::Error,
            (status, _) => *status,
        }
    }

    /// Validate the current values and return the settled validation state.
    ///
    /// An edit made while the request is in flight wins: the stale outcome
    /// is dropped and the cleared state is returned.
    pub async fn validate(&self) -> RequestState<Validation> {
        let (fields, generation) = {
            let mut inner = self.lock();
            inner.generation += 1;
            let fields = inner.values.clone();
            let snapshot = serde_json::to_string(&fields).unwrap_or_default();
            let validation = std::mem::take(&mut inner.validation);
            inner.validation = validation.apply(RequestEvent::Started { input: snapshot });
            (fields, inner.generation)
        };

        let outcome = self.source.validate(&fields).await;

        let mut inner = self.lock();
        if inner.generation != generation {
            debug!(generation, latest = inner.generation, "form: discarding stale validation");
            return inner.validation.clone();
        }
        let event = match outcome {
            Ok(result) => {
                debug!(is_valid = result.is_valid, warnings = result.warnings.len(), "form: validated");
                RequestEvent::Succeeded(result)
            }
            Err(e) => {
                warn!(error = %e, "form: validation failed");
                RequestEvent::Failed(e.message().to_string())
            }
        };
        let validation = std::mem::take(&mut inner.validation);
        inner.validation = validation.apply(event);
        inner.validation.clone()
    }
}

#[cfg(test)]
#[path = "form_test.rs"]
mod tests;
