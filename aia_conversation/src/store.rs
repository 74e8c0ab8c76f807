//! State container for one conversation session.
//!
//! The store performs no I/O and cannot fail. Only the session controller
//! mutates it; everyone else sees cloned [`SessionState`] snapshots.

use chrono::{DateTime, Utc};
use uuid::Uuid;

use aia_core::{ChatMessage, Role};

use crate::history::history_payload;

/// Point-in-time view of a session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionState {
    /// Session identifier
    pub id: Uuid,
    /// Greeting first, then user and assistant turns in order
    pub transcript: Vec<ChatMessage>,
    /// A request is in flight
    pub pending: bool,
    /// Error banner from the last failed turn
    pub last_error: Option<String>,
    /// Credential forwarded to the backend instead of its default
    pub credential_override: Option<String>,
    /// Last mutation
    pub updated_at: DateTime<Utc>,
    /// Number of resets so far
    pub generation: u64,
}

impl SessionState {
    /// Messages after the greeting.
    #[must_use]
    pub fn turns(&self) -> &[ChatMessage] {
        self.transcript.get(1..).unwrap_or_default()
    }

    #[must_use]
    pub const fn message_count(&self) -> usize {
        self.transcript.len()
    }
}

#[derive(Debug, Clone)]
pub struct ConversationStore {
    state: SessionState,
    greeting: ChatMessage,
}

impl ConversationStore {
    /// Create a session holding only the greeting.
    #[must_use]
    pub fn new(greeting: impl Into<String>) -> Self {
        let greeting = ChatMessage::assistant(greeting);
        Self {
            state: SessionState {
                id: Uuid::now_v7(),
                transcript: vec![greeting.clone()],
                pending: false,
                last_error: None,
                credential_override: None,
                updated_at: Utc::now(),
                generation: 0,
            },
            greeting,
        }
    }

    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.state.clone()
    }

    #[must_use]
    pub const fn state(&self) -> &SessionState {
        &self.state
    }

    /// Bumped by every reset; a request started under an older generation
    /// belongs to a transcript that no longer exists.
    #[must_use]
    pub const fn generation(&self) -> u64 {
        self.state.generation
    }

    #[must_use]
    pub fn history_payload(&self) -> Vec<ChatMessage> {
        history_payload(&self.state.transcript)
    }

    pub fn append_message(&mut self, role: Role, content: String) {
        self.state.transcript.push(ChatMessage { role, content });
        self.touch();
    }

    pub fn reset_to_greeting(&mut self) {
        self.state.transcript.clear();
        self.state.transcript.push(self.greeting.clone());
        self.state.last_error = None;
        self.state.generation += 1;
        self.touch();
    }

    /// Drop everything after the first `len` messages. The greeting stays.
    pub fn truncate_to(&mut self, len: usize) {
        self.state.transcript.truncate(len.max(1));
        self.touch();
    }

    pub fn set_pending(&mut self, pending: bool) {
        self.state.pending = pending;
        self.touch();
    }

    pub fn set_error(&mut self, error: Option<String>) {
        self.state.last_error = error;
        self.touch();
    }

    pub fn set_credential(&mut self, credential: Option<String>) {
        self.state.credential_override = credential;
        self.touch();
    }

    fn touch(&mut self) {
        self.state.updated_at = Utc::now();
    }
}
