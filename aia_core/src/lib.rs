#![deny(
    clippy::all,
    clippy::nursery,
    clippy::pedantic,
    clippy::style,
    clippy::complexity,
    clippy::perf,
    clippy::correctness,
    clippy::suspicious,
    clippy::unwrap_used,
    clippy::expect_used
)]
#![allow(
    clippy::similar_names,
    clippy::missing_safety_doc,
    clippy::missing_panics_doc,
    clippy::missing_errors_doc
)]

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;

pub mod error;

pub use error::{
    BackendError, CHAT_FAILURE, GENERIC_FAILURE, RETRY_LATER, UNREADABLE_ERROR_BODY,
};

/// Synthetic assistant message that opens every session.
pub const DEFAULT_GREETING: &str =
    "Olá! Eu sou a AIA, sua assistente virtual da Asteca. Como posso te ajudar hoje?";

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "lowercase")]
pub enum Role {
    User,
    Assistant,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct ChatMessage {
    pub role: Role,
    pub content: String,
}

impl ChatMessage {
    #[must_use]
    pub fn user(content: impl Into<String>) -> Self {
        Self {
            role: Role::User,
            content: content.into(),
        }
    }

    #[must_use]
    pub fn assistant(content: impl Into<String>) -> Self {
        Self {
            role: Role::Assistant,
            content: content.into(),
        }
    }
}

/// Body of a `POST /api/chat` call.
///
/// `history` holds the prior turns only; the current prompt travels
/// separately in `prompt`.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionRequest {
    pub prompt: String,
    pub history: Vec<ChatMessage>,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_key: Option<String>,
}

#[derive(Debug, Clone, Serialize, Deserialize, PartialEq, Eq)]
pub struct CompletionReply {
    pub reply: String,
}

/// The remote capability that turns a prompt plus history into a reply.
///
/// One call is one attempt. Implementations must not retry on their own.
#[async_trait]
pub trait CompletionBackend: Send + Sync {
    async fn complete(&self, request: &CompletionRequest)
    -> Result<CompletionReply, BackendError>;

    /// Banner text for failures without a usable `detail`, when this backend
    /// words them differently from [`BackendError::user_message`].
    fn failure_fallback(&self) -> Option<&str> {
        None
    }
}

#[async_trait]
impl<T> CompletionBackend for Arc<T>
where
    T: CompletionBackend + ?Sized,
{
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionReply, BackendError> {
        (**self).complete(request).await
    }

    fn failure_fallback(&self) -> Option<&str> {
        (**self).failure_fallback()
    }
}
