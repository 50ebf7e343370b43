//! Request errors surfaced by the response source.
//!
//! DESIGN
//! ======
//! There is exactly one failure kind. Timeouts, transport failures and
//! server-side rejections all collapse into `RequestFailed`; callers only
//! ever need the human-readable message.

/// The generic failure produced by any [`crate::responder::ResponseSource`] call.
#[derive(Debug, Clone, PartialEq, Eq, thiserror::Error)]
pub enum RequestError {
    #[error("{0}")]
    RequestFailed(String),
}

impl RequestError {
    pub fn failed(message: impl Into<String>) -> Self {
        Self::RequestFailed(message.into())
    }

    /// Message stored in `error_message` when a request settles in error.
    #[must_use]
    pub fn message(&self) -> &str {
        match self {
            Self::RequestFailed(message) => message,
        }
    }
}
