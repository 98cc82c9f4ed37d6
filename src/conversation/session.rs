//! Conversation session state.

use super::flavor::CompletionPayload;
use super::phase::Phase;
use serde::{Deserialize, Serialize};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationMessage {
    pub role: Role,
    pub content: String,
}

impl ConversationMessage {
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// One conversation as mirrored on the client.
///
/// `messages` is append-only. `phase` follows whatever the server last
/// declared; the client never computes transitions itself.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ConversationSession {
    pub id: i64,
    pub title: Option<String>,
    pub phase: Phase,
    messages: Vec<ConversationMessage>,
    pub complete: bool,
    /// Last stream error, shown inline until the next send.
    #[serde(skip)]
    pub last_error: Option<String>,
}

impl ConversationSession {
    /// A fresh conversation in the `intent` phase.
    pub fn new(id: i64) -> Self {
        Self {
            id,
            title: None,
            phase: Phase::Intent,
            messages: Vec::new(),
            complete: false,
            last_error: None,
        }
    }

    #[must_use]
    pub fn with_title(mut self, title: impl Into<String>) -> Self {
        self.title = Some(title.into());
        self
    }

    pub fn messages(&self) -> &[ConversationMessage] {
        &self.messages
    }

    /// Start over as "new conversation" under a new id.
    pub fn reset(&mut self, id: i64) {
        *self = Self::new(id);
    }

    /// Optimistically record a user message before any response arrives.
    pub fn push_user(&mut self, content: impl Into<String>) {
        self.last_error = None;
        self.messages.push(ConversationMessage::user(content));
    }

    /// Apply a `complete` event: mirror the declared phase and append the reply.
    pub fn apply_completion<P: CompletionPayload>(&mut self, payload: &P) {
        match payload.phase().parse::<Phase>() {
            Ok(phase) => {
                if phase.rank() < self.phase.rank() {
                    tracing::debug!(from = %self.phase, to = %phase, "Server moved phase backwards");
                }
                self.phase = phase;
            }
            Err(e) => {
                tracing::warn!(session_id = self.id, "Keeping phase {}: {e}", self.phase);
            }
        }

        if payload.session_id() != self.id {
            tracing::debug!(from = self.id, to = payload.session_id(), "Adopting server session id");
            self.id = payload.session_id();
        }

        if payload.is_complete() {
            self.complete = true;
        }

        self.last_error = None;
        self.messages
            .push(ConversationMessage::assistant(payload.response()));
    }

    /// Apply a stream error: visible as an assistant line, phase unchanged.
    pub fn apply_error(&mut self, reason: impl Into<String>) {
        let reason = reason.into();
        self.messages
            .push(ConversationMessage::assistant(reason.clone()));
        self.last_error = Some(reason);
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::conversation::flavor::{ChartCompletion, DashboardCompletion};

    fn completion(response: &str, phase: &str, session_id: i64) -> DashboardCompletion {
        serde_json::from_value(serde_json::json!({
            "response": response,
            "phase": phase,
            "session_id": session_id,
        }))
        .unwrap()
    }

    #[test]
    fn test_new_session_starts_at_intent() {
        let session = ConversationSession::new(1);
        assert_eq!(session.phase, Phase::Intent);
        assert!(session.messages().is_empty());
        assert!(!session.complete);
    }

    #[test]
    fn test_server_phase_is_mirrored() {
        let mut session = ConversationSession::new(1);
        for phase in ["context", "proposing", "generating", "viewing", "refinement", "viewing"] {
            session.apply_completion(&completion("ok", phase, 1));
            assert_eq!(session.phase.as_str(), phase);
        }
        assert!(!session.complete);
        assert_eq!(session.messages().len(), 6);
    }

    #[test]
    fn test_unknown_phase_keeps_current() {
        let mut session = ConversationSession::new(1);
        session.apply_completion(&completion("a", "context", 1));
        session.apply_completion(&completion("b", "brainstorming", 1));
        assert_eq!(session.phase, Phase::Context);
        assert_eq!(session.messages().last().unwrap().content, "b");
    }

    #[test]
    fn test_complete_phase_marks_session() {
        let mut session = ConversationSession::new(1);
        session.apply_completion(&completion("All done", "complete", 1));
        assert!(session.complete);
        assert_eq!(session.phase, Phase::Complete);
    }

    #[test]
    fn test_complete_flag_marks_session() {
        let mut session = ConversationSession::new(1);
        let payload: DashboardCompletion = serde_json::from_str(
            r#"{"response":"Saved","phase":"viewing","session_id":1,"complete":true}"#,
        )
        .unwrap();
        session.apply_completion(&payload);
        assert!(session.complete);
        assert_eq!(session.phase, Phase::Viewing);
    }

    #[test]
    fn test_adopts_server_session_id() {
        let mut session = ConversationSession::new(0);
        let payload: ChartCompletion =
            serde_json::from_str(r#"{"response":"hi","phase":"intent","session_id":42}"#).unwrap();
        session.apply_completion(&payload);
        assert_eq!(session.id, 42);
    }

    #[test]
    fn test_error_appends_and_keeps_phase() {
        let mut session = ConversationSession::new(1);
        session.apply_completion(&completion("ok", "proposing", 1));
        session.push_user("make it blue");
        session.apply_error("model unavailable");

        assert_eq!(session.phase, Phase::Proposing);
        assert_eq!(session.last_error.as_deref(), Some("model unavailable"));
        let last = session.messages().last().unwrap();
        assert_eq!(last.role, Role::Assistant);
        assert_eq!(last.content, "model unavailable");

        session.push_user("try again");
        assert!(session.last_error.is_none());
    }

    #[test]
    fn test_messages_keep_insertion_order() {
        let mut session = ConversationSession::new(1);
        session.push_user("one");
        session.apply_completion(&completion("two", "context", 1));
        session.push_user("three");
        session.apply_error("four");
        let contents: Vec<_> = session.messages().iter().map(|m| m.content.as_str()).collect();
        assert_eq!(contents, vec!["one", "two", "three", "four"]);
    }

    #[test]
    fn test_reset() {
        let mut session = ConversationSession::new(1).with_title("Sales");
        session.push_user("hello");
        session.apply_completion(&completion("bye", "complete", 1));
        session.reset(2);
        assert_eq!(session, ConversationSession::new(2));
    }

    #[test]
    fn test_serialization_roles() {
        let json = serde_json::to_string(&ConversationMessage::assistant("x")).unwrap();
        assert_eq!(json, r#"{"role":"assistant","content":"x"}"#);
    }
}
