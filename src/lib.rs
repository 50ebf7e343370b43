//! smartdash: async state orchestration for an AI-assisted dashboard.
//!
//! DESIGN
//! ======
//! Three widgets share one request lifecycle (idle → loading → success or
//! error, with retry and clear): the debounced search box, per-field form
//! suggestions, and a streaming chat panel. Responses come from a
//! [`responder::ResponseSource`]; the bundled [`responder::MockResponder`]
//! fakes latency, streaming and failures.

pub mod config;
pub mod error;
pub mod responder;
pub mod services;
pub mod state;

pub use config::DashboardConfig;
pub use error::RequestError;
pub use responder::{MockResponder, ResponseSource};
pub use services::chat::{ChatSession, ChatState, Message, Role};
pub use services::form::FormAssistant;
pub use services::request::{Fetch, RequestController};
pub use services::search::SmartSearch;
pub use state::{ChatStatus, RequestState, RequestStatus};
