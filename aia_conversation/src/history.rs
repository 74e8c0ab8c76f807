//! What of the transcript goes back to the backend.

use aia_core::{ChatMessage, Role};

/// Build the history sent with the next prompt.
///
/// The first transcript entry is the synthetic greeting and never leaves the
/// client. Every other entry is copied as `{role, content}`.
#[must_use]
pub fn history_payload(transcript: &[ChatMessage]) -> Vec<ChatMessage> {
    transcript
        .iter()
        .skip(1)
        .map(|message| ChatMessage {
            role: message.role,
            content: message.content.clone(),
        })
        .collect()
}

/// Statistics about a transcript, greeting excluded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryStats {
    pub user_messages: usize,
    pub assistant_messages: usize,
    pub total_characters: usize,
}

impl HistoryStats {
    #[must_use]
    pub fn of(transcript: &[ChatMessage]) -> Self {
        let turns = transcript.get(1..).unwrap_or_default();

        Self {
            user_messages: turns.iter().filter(|m| m.role == Role::User).count(),
            assistant_messages: turns.iter().filter(|m| m.role == Role::Assistant).count(),
            total_characters: turns.iter().map(|m| m.content.chars().count()).sum(),
        }
    }
}
