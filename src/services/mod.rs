//! Stateful widgets behind the dashboard.
//!
//! ARCHITECTURE
//! ============
//! `request` holds the debounce/single-flight engine; `search` and `form`
//! are thin widgets on top of it. `chat` drives streamed conversations.
//! All of them talk to the outside world only through
//! [`crate::responder::ResponseSource`].

pub mod chat;
pub mod form;
pub mod request;
pub mod search;
