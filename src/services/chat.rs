//! Chat session: append-only conversation with streamed replies.
//!
//! DESIGN
//! ======
//! `ChatState` is a plain value: the ordered message log plus status and
//! error. `ChatState::apply` is the only way it changes, one `ChatEvent`
//! at a time. `ChatSession` owns the state behind a mutex, drives the
//! response stream for the active turn and fans every applied event out
//! to subscribers.
//!
//! A turn goes `loading → streaming → idle`. On failure the half-built
//! assistant message is removed (the user's message stays) and status
//! becomes `error`. `clear` starts a new turn generation; an older stream
//! that is still running notices and stops applying fragments.

use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{SystemTime, UNIX_EPOCH};

use serde::Serialize;
use tokio::sync::mpsc;
use tracing::{debug, info, warn};
use uuid::Uuid;

use crate::error::RequestError;
use crate::responder::{Fragment, FragmentStream, ResponseSource};
use crate::state::ChatStatus;

pub const WELCOME_GREETING: &str = "Hello! I'm your AI dashboard assistant. I can help you analyze data, generate reports, and provide insights. What would you like to explore today?";

pub const CLEARED_GREETING: &str = "Chat cleared. How can I help you?";

/// Reported when a stream closes without a completing fragment.
pub const STREAM_ENDED_MESSAGE: &str = "Response stream ended unexpectedly.";

// =============================================================================
// MESSAGES
// =============================================================================

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

/// One turn in the conversation.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct Message {
    pub id: Uuid,
    pub role: Role,
    pub content: String,
    /// Milliseconds since Unix epoch, fixed at creation.
    pub timestamp: i64,
    /// True only while an assistant reply is still growing.
    pub streaming: bool,
}

fn now_ms() -> i64 {
    let Ok(dur) = SystemTime::now().duration_since(UNIX_EPOCH) else {
        return 0;
    };
    i64::try_from(dur.as_millis()).unwrap_or(0)
}

impl Message {
    fn new(role: Role, content: impl Into<String>, streaming: bool) -> Self {
        Self { id: Uuid::new_v4(), role, content: content.into(), timestamp: now_ms(), streaming }
    }

    /// A sealed user message.
    pub fn user(content: impl Into<String>) -> Self {
        Self::new(Role::User, content, false)
    }

    /// A sealed assistant message.
    pub fn assistant(content: impl Into<String>) -> Self {
        Self::new(Role::Assistant, content, false)
    }

    /// Empty assistant message waiting for its first fragment.
    #[must_use]
    pub fn placeholder() -> Self {
        Self::new(Role::Assistant, String::new(), true)
    }
}

// =============================================================================
// STATE MACHINE
// =============================================================================

/// Everything applied to a chat log, in order.
#[derive(Debug, Clone, PartialEq)]
pub enum ChatEvent {
    TurnStarted { user: Message, assistant: Message },
    FragmentReceived { id: Uuid, fragment: Fragment },
    TurnCompleted { id: Uuid },
    /// Rollback: the assistant message `id` is removed.
    TurnFailed { id: Uuid, error: String },
    /// The user message `id` is removed ahead of a retry.
    UserTurnWithdrawn { id: Uuid },
    Reset { greeting: Message },
}

#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct ChatState {
    pub messages: Vec<Message>,
    pub status: ChatStatus,
    pub error: Option<String>,
}

impl ChatState {
    /// A fresh log holding only the welcome greeting.
    #[must_use]
    pub fn new() -> Self {
        Self { messages: vec![Message::assistant(WELCOME_GREETING)], status: ChatStatus::Idle, error: None }
    }

    #[must_use]
    pub fn apply(mut self, event: ChatEvent) -> Self {
        match event {
            ChatEvent::TurnStarted { user, assistant } => {
                self.messages.push(user);
                self.messages.push(assistant);
                self.status = ChatStatus::Loading;
                self.error = None;
            }
            ChatEvent::FragmentReceived { id, fragment } => {
                if let Some(message) = self.message_mut(id) {
                    message.content = fragment.content;
                    message.streaming = !fragment.is_complete;
                    self.status = ChatStatus::Streaming;
                }
            }
            ChatEvent::TurnCompleted { id } => {
                if let Some(message) = self.message_mut(id) {
                    message.streaming = false;
                }
                self.status = ChatStatus::Idle;
            }
            ChatEvent::TurnFailed { id, error } => {
                self.messages.retain(|m| m.id != id);
                self.status = ChatStatus::Error;
                self.error = Some(error);
            }
            ChatEvent::UserTurnWithdrawn { id } => {
                self.messages.retain(|m| m.id != id);
            }
            ChatEvent::Reset { greeting } => {
                self.messages = vec![greeting];
                self.status = ChatStatus::Idle;
                self.error = None;
            }
        }
        self
    }

    /// Most recent sealed user message, scanning from the end.
    #[must_use]
    pub fn last_user_message(&self) -> Option<&Message> {
        self.messages
            .iter()
            .rev()
            .find(|m| m.role == Role::User && !m.streaming)
    }

    /// The assistant message currently being appended to, if any.
    #[must_use]
    pub fn streaming_message(&self) -> Option<&Message> {
        self.messages.iter().find(|m| m.streaming)
    }

    fn message_mut(&mut self, id: Uuid) -> Option<&mut Message> {
        self.messages.iter_mut().rev().find(|m| m.id == id)
    }
}

// =============================================================================
// SESSION
// =============================================================================

struct Inner {
    state: ChatState,
    /// Bumped by every new turn and every clear.
    turn: u64,
    subscribers: Vec<mpsc::UnboundedSender<ChatEvent>>,
}

impl Inner {
    fn commit(&mut self, event: ChatEvent) {
        self.subscribers
            .retain(|tx| tx.send(event.clone()).is_ok());
        let state = std::mem::take(&mut self.state);
        self.state = state.apply(event);
    }

    /// Append the user message and an empty streaming reply, unless a
    /// turn is already in flight.
    fn begin_turn(&mut self, text: &str) -> Option<ActiveTurn> {
        if self.state.status.is_busy() {
            debug!(status = ?self.state.status, "chat: send ignored, turn in flight");
            return None;
        }
        self.turn += 1;
        let assistant = Message::placeholder();
        let active = ActiveTurn { turn: self.turn, assistant_id: assistant.id };
        self.commit(ChatEvent::TurnStarted { user: Message::user(text), assistant });
        Some(active)
    }
}

#[derive(Debug, Clone, Copy)]
struct ActiveTurn {
    turn: u64,
    assistant_id: Uuid,
}

enum TurnOutcome {
    Completed,
    Failed(RequestError),
    /// The log was cleared while streaming.
    Abandoned,
}

/// Conversation driver. Cloning yields another handle to the same log.
#[derive(Clone)]
pub struct ChatSession {
    source: Arc<dyn ResponseSource>,
    inner: Arc<Mutex<Inner>>,
}

impl ChatSession {
    #[must_use]
    pub fn new(source: Arc<dyn ResponseSource>) -> Self {
        let inner = Inner { state: ChatState::new(), turn: 0, subscribers: Vec::new() };
        Self { source, inner: Arc::new(Mutex::new(inner)) }
    }

    fn lock(&self) -> MutexGuard<'_, Inner> {
        self.inner
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
    }

    #[must_use]
    pub fn snapshot(&self) -> ChatState {
        self.lock().state.clone()
    }

    /// Every event applied from now on, in order.
    #[must_use]
    pub fn subscribe(&self) -> mpsc::UnboundedReceiver<ChatEvent> {
        let (tx, rx) = mpsc::unbounded_channel();
        self.lock().subscribers.push(tx);
        rx
    }

    /// Send `text` and stream the reply into the log until it settles.
    ///
    /// Returns `false` without touching the log when `text` is blank or a
    /// turn is already in flight.
    pub async fn send(&self, text: &str) -> bool {
        if text.trim().is_empty() {
            return false;
        }
        let started = {
            let mut inner = self.lock();
            inner.begin_turn(text)
        };
        let Some(active) = started else {
            return false;
        };
        self.run_turn(active, text).await;
        true
    }

    /// Withdraw the most recent user message and send it again.
    ///
    /// Returns `false` when there is no user message or a turn is in flight.
    pub async fn retry(&self) -> bool {
        let started = {
            let mut inner = self.lock();
            if inner.state.status.is_busy() {
                return false;
            }
            let Some(last) = inner.state.last_user_message() else {
                return false;
            };
            let (id, text) = (last.id, last.content.clone());
            inner.commit(ChatEvent::UserTurnWithdrawn { id });
            inner.begin_turn(&text).map(|active| (active, text))
        };
        let Some((active, text)) = started else {
            return false;
        };
        debug!(turn = active.turn, "chat: retrying last user message");
        self.run_turn(active, &text).await;
        true
    }

    /// Replace the log with a fresh greeting and return to idle.
    pub fn clear(&self) {
        let mut inner = self.lock();
        inner.turn += 1;
        inner.commit(ChatEvent::Reset { greeting: Message::assistant(CLEARED_GREETING) });
        info!("chat: cleared");
    }

    async fn run_turn(&self, active: ActiveTurn, text: &str) {
        info!(turn = active.turn, prompt_len = text.len(), "chat: turn started");
        let stream = self.source.stream_response(text);
        let id = active.assistant_id;

        match self.consume(active, stream).await {
            TurnOutcome::Completed => {
                self.commit_if_current(active.turn, ChatEvent::TurnCompleted { id });
                info!(turn = active.turn, "chat: turn completed");
            }
            TurnOutcome::Failed(e) => {
                warn!(turn = active.turn, error = %e, "chat: turn failed, rolling back reply");
                self.commit_if_current(active.turn, ChatEvent::TurnFailed { id, error: e.message().to_string() });
            }
            TurnOutcome::Abandoned => {
                debug!(turn = active.turn, "chat: turn abandoned after clear");
            }
        }
    }

    async fn consume(&self, active: ActiveTurn, mut stream: FragmentStream) -> TurnOutcome {
        while let Some(item) = stream.next().await {
            let fragment = match item {
                Ok(fragment) => fragment,
                Err(e) => return TurnOutcome::Failed(e),
            };
            let complete = fragment.is_complete;
            let event = ChatEvent::FragmentReceived { id: active.assistant_id, fragment };
            if !self.commit_if_current(active.turn, event) {
                return TurnOutcome::Abandoned;
            }
            if complete {
                return TurnOutcome::Completed;
            }
        }
        TurnOutcome::Failed(RequestError::failed(STREAM_ENDED_MESSAGE))
    }

    /// Apply `event` only if no newer turn or clear has happened since `turn`.
    fn commit_if_current(&self, turn: u64, event: ChatEvent) -> bool {
        let mut inner = self.lock();
        if inner.turn != turn {
            return false;
        }
        inner.commit(event);
        true
    }
}

#[cfg(test)]
#[path = "chat_test.rs"]
mod tests;
