//! Session controller: the only writer of a conversation's state.
//!
//! Each turn is a two-phase update of the transcript. Phase one appends the
//! user message before the backend is called. Phase two either appends the
//! assistant reply or truncates the transcript back to where the turn began.

use std::sync::Arc;

use aia_core::{CompletionBackend, CompletionRequest, Role};
use tokio::sync::{Mutex, watch};
use tracing::{debug, info, warn};

use crate::store::{ConversationStore, SessionState};

/// How a call to [`SessionController::send`] ended.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SendOutcome {
    /// Empty input, or another turn was still in flight. Nothing changed.
    Ignored,
    /// The backend replied; the reply is now the last transcript entry.
    Replied(String),
    /// The backend failed; the user turn was removed and this message is in
    /// `last_error`.
    RolledBack(String),
    /// The session was cleared while the request was in flight, so its result
    /// was dropped.
    Discarded,
}

/// Where the transcript stood when a turn started.
#[derive(Debug, Clone, Copy)]
struct Checkpoint {
    transcript_len: usize,
    generation: u64,
}

/// An in-flight turn. Dropped before [`TurnGuard::settle`], it undoes the
/// optimistic user message and releases the in-flight flag.
struct TurnGuard {
    store: Arc<Mutex<ConversationStore>>,
    updates: Arc<watch::Sender<SessionState>>,
    checkpoint: Checkpoint,
    settled: bool,
}

impl TurnGuard {
    /// Phase two owns the store from here on.
    fn settle(mut self) -> Checkpoint {
        self.settled = true;
        self.checkpoint
    }
}

impl Drop for TurnGuard {
    fn drop(&mut self) {
        if self.settled {
            return;
        }

        let checkpoint = self.checkpoint;
        if let Ok(mut store) = self.store.try_lock() {
            abandon_turn(&mut store, &self.updates, checkpoint);
            return;
        }

        let store = Arc::clone(&self.store);
        let updates = Arc::clone(&self.updates);
        match tokio::runtime::Handle::try_current() {
            Ok(handle) => {
                handle.spawn(async move {
                    let mut store = store.lock().await;
                    abandon_turn(&mut store, &updates, checkpoint);
                });
            }
            Err(e) => warn!("Cannot release abandoned turn: {e}"),
        }
    }
}

fn abandon_turn(
    store: &mut ConversationStore,
    updates: &watch::Sender<SessionState>,
    checkpoint: Checkpoint,
) {
    if store.generation() == checkpoint.generation {
        store.truncate_to(checkpoint.transcript_len);
    }
    store.set_pending(false);
    updates.send_replace(store.snapshot());

    info!("Session {}: turn abandoned before completion", store.state().id);
}

/// Drives one conversation session against a completion backend.
///
/// The store lock is never held across the backend call, so `snapshot`,
/// `clear` and `set_credential` stay available while a turn is in flight.
/// Dropping a `send` future mid-flight (a timeout, a `select!`) abandons the
/// turn: the user message is taken back and the session accepts input again.
pub struct SessionController<B = Arc<dyn CompletionBackend>>
where
    B: Send + Sync,
{
    backend: B,
    store: Arc<Mutex<ConversationStore>>,
    updates: Arc<watch::Sender<SessionState>>,
}

impl<B> SessionController<B>
where
    B: CompletionBackend + Send + Sync,
{
    #[must_use]
    pub fn new(backend: B, greeting: impl Into<String>) -> Self {
        let store = ConversationStore::new(greeting);
        let (updates, _) = watch::channel(store.snapshot());

        info!("Created conversation session: {}", store.state().id);

        Self {
            backend,
            store: Arc::new(Mutex::new(store)),
            updates: Arc::new(updates),
        }
    }

    /// Start the session with a credential override already set.
    #[must_use]
    pub fn with_credential(self, credential: Option<String>) -> Self {
        if let Ok(mut store) = self.store.try_lock() {
            store.set_credential(normalize_credential(credential));
            self.updates.send_replace(store.snapshot());
        }
        self
    }

    /// Run one user turn.
    ///
    /// Failures never escape: they are turned into `last_error` and reported
    /// through the returned [`SendOutcome`].
    pub async fn send(&self, raw_text: &str) -> SendOutcome {
        let prompt = raw_text.trim();
        if prompt.is_empty() {
            debug!("Ignoring empty input");
            return SendOutcome::Ignored;
        }

        let Some((request, turn)) = self.begin_turn(prompt).await else {
            debug!("Ignoring input while a request is in flight");
            return SendOutcome::Ignored;
        };

        let result = self.backend.complete(&request).await;

        let mut store = self.store.lock().await;
        let checkpoint = turn.settle();
        let session_id = store.state().id;

        let outcome = if store.generation() == checkpoint.generation {
            match result {
                Ok(completion) => {
                    debug!(
                        "Session {session_id}: reply of {} chars",
                        completion.reply.chars().count()
                    );
                    store.append_message(Role::Assistant, completion.reply.clone());
                    SendOutcome::Replied(completion.reply)
                }
                Err(e) => {
                    warn!("Session {session_id}: turn failed, rolling back: {e}");
                    let message = self
                        .backend
                        .failure_fallback()
                        .map_or_else(|| e.user_message(), |fallback| e.user_message_or(fallback));
                    store.truncate_to(checkpoint.transcript_len);
                    store.set_error(Some(message.clone()));
                    SendOutcome::RolledBack(message)
                }
            }
        } else {
            info!("Session {session_id}: dropping result of a turn started before clear");
            SendOutcome::Discarded
        };

        store.set_pending(false);
        self.publish(&store);

        outcome
    }

    /// Phase one: check the in-flight flag, snapshot the history, and apply
    /// the optimistic user turn. Returns `None` when a turn is already running.
    async fn begin_turn(&self, prompt: &str) -> Option<(CompletionRequest, TurnGuard)> {
        let mut store = self.store.lock().await;
        if store.state().pending {
            return None;
        }

        let request = CompletionRequest {
            prompt: prompt.to_owned(),
            history: store.history_payload(),
            api_key: store.state().credential_override.clone(),
        };
        let checkpoint = Checkpoint {
            transcript_len: store.state().transcript.len(),
            generation: store.generation(),
        };

        store.append_message(Role::User, prompt.to_owned());
        store.set_pending(true);
        store.set_error(None);
        self.publish(&store);

        info!(
            "Session {}: sending turn with {} prior messages",
            store.state().id,
            request.history.len()
        );

        let turn = TurnGuard {
            store: Arc::clone(&self.store),
            updates: Arc::clone(&self.updates),
            checkpoint,
            settled: false,
        };

        Some((request, turn))
    }

    /// Reset the transcript to the greeting and clear the error banner.
    ///
    /// A turn in flight keeps running, but its result will be discarded.
    pub async fn clear(&self) {
        let mut store = self.store.lock().await;
        store.reset_to_greeting();
        self.publish(&store);

        info!("Session {}: conversation cleared", store.state().id);
    }

    /// Set or remove the credential sent with the next turns.
    ///
    /// `None` and the empty string both remove the override.
    pub async fn set_credential(&self, credential: Option<String>) {
        let mut store = self.store.lock().await;
        store.set_credential(normalize_credential(credential));
        self.publish(&store);

        debug!(
            "Session {}: credential override {}",
            store.state().id,
            if store.state().credential_override.is_some() {
                "set"
            } else {
                "removed"
            }
        );
    }

    /// Latest published state.
    #[must_use]
    pub fn snapshot(&self) -> SessionState {
        self.updates.borrow().clone()
    }

    /// Observe every state change.
    #[must_use]
    pub fn subscribe(&self) -> watch::Receiver<SessionState> {
        self.updates.subscribe()
    }

    fn publish(&self, store: &ConversationStore) {
        self.updates.send_replace(store.snapshot());
    }
}

fn normalize_credential(credential: Option<String>) -> Option<String> {
    credential.filter(|value| !value.is_empty())
}
