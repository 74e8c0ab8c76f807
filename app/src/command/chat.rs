//! Conversation command: one-shot message or interactive session.

use std::sync::Arc;

use aia_config::Config;
use aia_conversation::{SendOutcome, SessionController};
use tracing::info;

use super::build_backend;
use crate::render::TranscriptRenderer;
use crate::repl::Repl;

/// Input parameters for the Chat command strategy.
#[derive(Debug, Clone)]
pub struct ChatInput {
    /// Optional single message to send (non-interactive mode)
    pub message: Option<String>,
    /// Credential override for this session
    pub api_key: Option<String>,
    /// Backend base URL override
    pub base_url: Option<String>,
}

/// Strategy for executing the Chat command.
///
/// Flags override the config file, which overrides built-in defaults.
#[derive(Debug, Clone, Copy)]
pub struct ChatStrategy;

impl super::CommandStrategy for ChatStrategy {
    type Input = ChatInput;

    async fn execute(&self, input: Self::Input) -> anyhow::Result<()> {
        let mut config = Config::load()?;
        if let Some(base_url) = input.base_url {
            config.backend.base_url = base_url;
        }

        let backend = Arc::new(build_backend(&config)?);
        let credential = input.api_key.or_else(|| config.session.api_key.clone());
        let session = SessionController::new(Arc::clone(&backend), config.session.greeting.clone())
            .with_credential(credential);

        info!(
            "Starting conversation against {} ({:?} wire)",
            backend.base_url(),
            backend.wire()
        );

        if let Some(msg) = input.message {
            // Single message mode
            return match session.send(&msg).await {
                SendOutcome::Replied(reply) => {
                    println!("{reply}");
                    Ok(())
                }
                SendOutcome::RolledBack(error) => anyhow::bail!(error),
                SendOutcome::Ignored => anyhow::bail!("Nothing to send: the message is empty"),
                SendOutcome::Discarded => anyhow::bail!("The reply was discarded"),
            };
        }

        let renderer = TranscriptRenderer::new(session.subscribe());
        Repl::new(session, backend, renderer).run().await?;

        Ok(())
    }
}
