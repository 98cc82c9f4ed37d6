//! Conversation phase state machine and its streaming glue.
//!
//! A [`Conversation`] owns one [`ConversationSession`] and feeds it from the
//! stream driver: user messages are appended optimistically, `complete`
//! events mirror the server's phase and append the reply, and errors are
//! appended as assistant lines without touching the phase.

mod flavor;
mod phase;
mod session;

pub use flavor::{
    ActionButton, ChartCompletion, ChartFlavor, CompletionPayload, ConversationFlavor,
    DashboardCompletion, DashboardFlavor,
};
pub use phase::Phase;
pub use session::{ConversationMessage, ConversationSession, Role};

use crate::config::Config;
use crate::stream::{ProgressEvent, StreamCallbacks, StreamDriver, StreamHandle, StreamRequest};
use std::marker::PhantomData;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use thiserror::Error;

/// Session id for a conversation the server has not assigned yet. Requests
/// for it omit `session_id`, targeting the server's current session.
pub const UNASSIGNED_SESSION: i64 = 0;

#[derive(Debug, Error, PartialEq, Eq)]
pub enum ConversationError {
    #[error("Conversation is already complete; start a new one")]
    SessionComplete,

    #[error("Message is empty")]
    EmptyMessage,
}

/// Explicit user actions, sent as distinguished messages over the normal
/// stream so the server drives the resulting transition.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum UserAction {
    Finish,
    Accept,
}

impl UserAction {
    #[must_use]
    pub fn as_message(&self) -> &'static str {
        match self {
            Self::Finish => "[ACTION:finish]",
            Self::Accept => "[ACTION:accept]",
        }
    }

    /// Parse a chat command (`/finish`, `/accept`).
    #[must_use]
    pub fn from_command(input: &str) -> Option<Self> {
        match input.trim() {
            "/finish" => Some(Self::Finish),
            "/accept" => Some(Self::Accept),
            _ => None,
        }
    }
}

/// A conversation of flavor `F` bound to a stream driver.
pub struct Conversation<F: ConversationFlavor> {
    driver: StreamDriver,
    endpoint: String,
    session: Arc<Mutex<ConversationSession>>,
    _flavor: PhantomData<F>,
}

impl<F: ConversationFlavor> std::fmt::Debug for Conversation<F> {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("Conversation")
            .field("flavor", &F::NAME)
            .field("endpoint", &self.endpoint)
            .field("session", &*self.lock())
            .finish_non_exhaustive()
    }
}

impl<F: ConversationFlavor> Conversation<F> {
    pub fn new(driver: StreamDriver, config: &Config, session: ConversationSession) -> Self {
        Self::with_endpoint(driver, F::endpoint(config), session)
    }

    pub fn with_endpoint(
        driver: StreamDriver,
        endpoint: impl Into<String>,
        session: ConversationSession,
    ) -> Self {
        Self {
            driver,
            endpoint: endpoint.into(),
            session: Arc::new(Mutex::new(session)),
            _flavor: PhantomData,
        }
    }

    /// Snapshot of the session.
    pub fn session(&self) -> ConversationSession {
        self.lock().clone()
    }

    pub fn phase(&self) -> Phase {
        self.lock().phase
    }

    /// Reset to a new conversation in the `intent` phase.
    pub fn new_conversation(&self, id: i64) {
        self.lock().reset(id);
    }

    /// Send a user message.
    pub fn send(&self, text: &str) -> Result<StreamHandle, ConversationError> {
        self.send_with(text, StreamCallbacks::new())
    }

    /// Send a user message, forwarding progress updates to `on_progress`.
    pub fn send_with_progress(
        &self,
        text: &str,
        on_progress: impl FnMut(ProgressEvent) + Send + 'static,
    ) -> Result<StreamHandle, ConversationError> {
        self.send_with(text, StreamCallbacks::new().on_progress(on_progress))
    }

    /// Send an explicit user action.
    pub fn perform(
        &self,
        action: UserAction,
        observer: StreamCallbacks<F::Completion>,
    ) -> Result<StreamHandle, ConversationError> {
        self.send_with(action.as_message(), observer)
    }

    /// Send a user message; `observer` runs after the session is updated.
    pub fn send_with(
        &self,
        text: &str,
        observer: StreamCallbacks<F::Completion>,
    ) -> Result<StreamHandle, ConversationError> {
        let text = text.trim();
        if text.is_empty() {
            return Err(ConversationError::EmptyMessage);
        }

        let session_id = {
            let mut session = self.lock();
            if session.complete {
                return Err(ConversationError::SessionComplete);
            }
            session.push_user(text);
            (session.id != UNASSIGNED_SESSION).then_some(session.id)
        };

        let (on_progress, on_complete, on_error) = observer.into_parts();
        let mut callbacks = StreamCallbacks::new();
        if let Some(on_progress) = on_progress {
            callbacks = callbacks.on_progress(on_progress);
        }

        let session = self.session.clone();
        callbacks = callbacks.on_complete(move |payload: F::Completion| {
            lock_session(&session).apply_completion(&payload);
            if let Some(on_complete) = on_complete {
                on_complete(payload);
            }
        });

        let session = self.session.clone();
        callbacks = callbacks.on_error(move |reason: String| {
            lock_session(&session).apply_error(reason.clone());
            if let Some(on_error) = on_error {
                on_error(reason);
            }
        });

        tracing::debug!(flavor = F::NAME, session_id = ?session_id, "Sending message");
        Ok(self.driver.start_stream(
            &self.endpoint,
            StreamRequest::new(text, session_id),
            callbacks,
        ))
    }

    fn lock(&self) -> MutexGuard<'_, ConversationSession> {
        lock_session(&self.session)
    }
}

fn lock_session(session: &Mutex<ConversationSession>) -> MutexGuard<'_, ConversationSession> {
    session.lock().unwrap_or_else(PoisonError::into_inner)
}
