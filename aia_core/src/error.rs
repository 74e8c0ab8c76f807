//! Failures of the completion backend and the text shown for them.

use thiserror::Error;

/// Shown when the backend fails without a usable `detail`.
pub const GENERIC_FAILURE: &str = "Erro inesperado ao consultar o assistente.";

/// Shown when an error response body is not JSON at all.
pub const UNREADABLE_ERROR_BODY: &str = "Erro desconhecido.";

/// Fallback for failed turns against the session-cookie deployment.
pub const CHAT_FAILURE: &str = "Erro no chat.";

/// Last resort when every other source yields an empty message.
pub const RETRY_LATER: &str = "Não foi possível obter a resposta. Tente novamente.";

/// One failed call to the backend.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum BackendError {
    /// No response arrived: connection refused, DNS, timeout.
    #[error("{0}")]
    Transport(String),

    /// Non-2xx response whose body was JSON.
    #[error("backend returned HTTP {status}{}", detail.as_deref().map(|d| format!(": {d}")).unwrap_or_default())]
    Status { status: u16, detail: Option<String> },

    /// Non-2xx response whose body could not be parsed.
    #[error("backend returned HTTP {status} with an unreadable body")]
    UnreadableErrorBody { status: u16 },

    /// 2xx response without the expected shape.
    #[error("malformed backend response: {0}")]
    Malformed(String),
}

impl BackendError {
    /// Classify a non-2xx response by its body.
    ///
    /// `detail` is only taken when the body is a JSON object carrying a
    /// string under that key.
    #[must_use]
    pub fn from_error_body(status: u16, body: &str) -> Self {
        match serde_json::from_str::<serde_json::Value>(body) {
            Ok(value) => Self::Status {
                status,
                detail: value
                    .get("detail")
                    .and_then(serde_json::Value::as_str)
                    .map(str::to_owned),
            },
            Err(_) => Self::UnreadableErrorBody { status },
        }
    }

    /// Banner text for a failed chat turn.
    #[must_use]
    pub fn user_message(&self) -> String {
        self.describe(GENERIC_FAILURE, UNREADABLE_ERROR_BODY)
    }

    /// Banner text with a caller-chosen fallback for responses that carry no
    /// `detail`.
    #[must_use]
    pub fn user_message_or(&self, fallback: &str) -> String {
        self.describe(fallback, fallback)
    }

    fn describe(&self, fallback: &str, unreadable: &str) -> String {
        let message = match self {
            Self::Transport(message)
            | Self::Status {
                detail: Some(message),
                ..
            } => message.as_str(),
            Self::Status { detail: None, .. } | Self::Malformed(_) => fallback,
            Self::UnreadableErrorBody { .. } => unreadable,
        };

        if message.trim().is_empty() {
            RETRY_LATER.to_owned()
        } else {
            message.to_owned()
        }
    }
}
