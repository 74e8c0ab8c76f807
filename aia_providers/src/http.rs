use std::time::Duration;

use aia_core::{BackendError, CHAT_FAILURE, CompletionBackend, CompletionReply, CompletionRequest};
use async_trait::async_trait;
use reqwest::{Client, Response};
use serde::{Deserialize, Serialize};
use serde_json::json;
use tokio::sync::Mutex;
use tracing::{debug, info};

/// Body shape the backend deployment expects on `POST /api/chat`.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ChatWire {
    /// `{prompt, history, api_key?}`; the client carries the conversation.
    #[default]
    History,
    /// `{message}`; the backend keeps the conversation and reads the
    /// credential from its session cookie. A per-request `api_key` is
    /// stored in that session through `/api/set-key` before the chat call.
    SessionCookie,
}

#[derive(Debug, Clone, Default)]
pub struct HttpOptions {
    /// Whole-request timeout. Expiry is reported as a transport failure.
    pub timeout: Option<Duration>,
    pub wire: ChatWire,
}

/// Client for the AIA backend HTTP API.
pub struct HttpBackend {
    client: Client,
    base_url: String,
    wire: ChatWire,
    /// Per-turn credential this client last pushed into the cookie session.
    /// `None` once a key is managed with the explicit key endpoints.
    session_key: Mutex<Option<String>>,
}

impl HttpBackend {
    pub fn new(base_url: impl Into<String>, options: HttpOptions) -> anyhow::Result<Self> {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        info!("Creating HttpBackend for {base_url}");

        let mut builder = Client::builder().cookie_store(true);
        if let Some(timeout) = options.timeout {
            builder = builder.timeout(timeout);
        }

        Ok(Self {
            client: builder.build()?,
            base_url,
            wire: options.wire,
            session_key: Mutex::new(None),
        })
    }

    #[must_use]
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    #[must_use]
    pub const fn wire(&self) -> ChatWire {
        self.wire
    }

    /// Probe the backend root, which answers with a short status document.
    pub async fn status(&self) -> Result<serde_json::Value, BackendError> {
        let response = self
            .client
            .get(self.endpoint("/"))
            .send()
            .await
            .map_err(transport)?;

        parse_json_body(&read_body(response).await?)
    }

    /// Store a credential in the backend's cookie session.
    pub async fn set_server_key(&self, api_key: &str) -> Result<serde_json::Value, BackendError> {
        let mut session_key = self.session_key.lock().await;
        let body = self.post_set_key(api_key).await?;
        *session_key = None;
        Ok(body)
    }

    /// Remove the credential from the backend's cookie session.
    pub async fn clear_server_key(&self) -> Result<serde_json::Value, BackendError> {
        let mut session_key = self.session_key.lock().await;
        let body = self.post_clear_key().await?;
        *session_key = None;
        Ok(body)
    }

    /// Bring the cookie session in line with the turn's credential.
    ///
    /// Nothing is sent while no override is pushed, so a key saved with
    /// [`Self::set_server_key`] is left alone.
    async fn sync_session_key(&self, api_key: Option<&str>) -> Result<(), BackendError> {
        let mut session_key = self.session_key.lock().await;
        if session_key.as_deref() == api_key {
            return Ok(());
        }

        match api_key {
            Some(key) => self.post_set_key(key).await?,
            None => self.post_clear_key().await?,
        };
        *session_key = api_key.map(str::to_owned);
        Ok(())
    }

    async fn post_set_key(&self, api_key: &str) -> Result<serde_json::Value, BackendError> {
        info!("Storing API key in backend session");

        let response = self
            .client
            .post(self.endpoint("/api/set-key"))
            .json(&json!({ "apiKey": api_key }))
            .send()
            .await
            .map_err(transport)?;

        parse_json_body(&read_body(response).await?)
    }

    async fn post_clear_key(&self) -> Result<serde_json::Value, BackendError> {
        info!("Clearing API key from backend session");

        let response = self
            .client
            .post(self.endpoint("/api/clear-key"))
            .send()
            .await
            .map_err(transport)?;

        parse_json_body(&read_body(response).await?)
    }

    fn endpoint(&self, path: &str) -> String {
        format!("{}{path}", self.base_url)
    }
}

#[async_trait]
impl CompletionBackend for HttpBackend {
    async fn complete(
        &self,
        request: &CompletionRequest,
    ) -> Result<CompletionReply, BackendError> {
        if self.wire == ChatWire::SessionCookie {
            self.sync_session_key(request.api_key.as_deref()).await?;
        }

        let builder = self.client.post(self.endpoint("/api/chat"));
        let builder = match self.wire {
            ChatWire::History => builder.json(request),
            ChatWire::SessionCookie => builder.json(&json!({ "message": request.prompt })),
        };

        info!(
            "Sending chat request: wire={:?}, history={}",
            self.wire,
            request.history.len()
        );

        let response = builder.send().await.map_err(transport)?;
        let body = read_body(response).await?;

        let reply = serde_json::from_str::<CompletionReply>(&body)
            .map_err(|e| BackendError::Malformed(e.to_string()))?;

        info!("Received chat reply");
        Ok(reply)
    }

    fn failure_fallback(&self) -> Option<&str> {
        match self.wire {
            ChatWire::History => None,
            ChatWire::SessionCookie => Some(CHAT_FAILURE),
        }
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// Body of a 2xx response, or the classified failure.
async fn read_body(response: Response) -> Result<String, BackendError> {
    let status = response.status();
    debug!("Backend responded with {status}");

    if status.is_success() {
        response.text().await.map_err(transport)
    } else {
        let body = response.text().await.unwrap_or_default();
        Err(BackendError::from_error_body(status.as_u16(), &body))
    }
}

fn parse_json_body(body: &str) -> Result<serde_json::Value, BackendError> {
    if body.trim().is_empty() {
        return Ok(serde_json::Value::Null);
    }
    serde_json::from_str(body).map_err(|e| BackendError::Malformed(e.to_string()))
}
