//! HTTP transport for the backend's session, conversation, and message
//! endpoints. All bodies are JSON; authenticated calls carry the session's
//! bearer token.

use std::time::Duration;

use async_trait::async_trait;
use reqwest::Client;
use secrecy::ExposeSecret;
use serde::{Deserialize, Serialize};
use tracing::{debug, instrument};
use url::Url;

use pagechat_core::errors::ClientError;
use pagechat_core::ids::{ConversationId, MessageId, SessionId};
use pagechat_core::session::Session;

const CONNECT_TIMEOUT: Duration = Duration::from_secs(10);
const REQUEST_TIMEOUT: Duration = Duration::from_secs(30);

/// Message type tag the backend expects on user messages.
const USER_MESSAGE_TYPE: &str = "user_question";

/// Transport capability injected into the session client and controller,
/// so tests can substitute a scripted fake for the real HTTP stack.
#[async_trait]
pub trait Backend: Send + Sync {
    /// Connectivity probe. Reports status instead of failing.
    async fn check_health(&self) -> HealthReport;

    async fn create_session(&self) -> Result<Session, ClientError>;

    async fn create_conversation(
        &self,
        session: &Session,
        url: &str,
        title: &str,
        extracted_text: &str,
        content_hash: &str,
    ) -> Result<ConversationId, ClientError>;

    async fn post_message(
        &self,
        session: &Session,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<MessageId, ClientError>;
}

/// Result of a health probe; never an error.
#[derive(Clone, Debug)]
pub struct HealthReport {
    pub healthy: bool,
    pub detail: String,
}

/// Backend transport over reqwest.
pub struct BackendApi {
    client: Client,
    base_url: Url,
}

impl BackendApi {
    pub fn new(base_url: Url) -> Self {
        let client = Client::builder()
            .connect_timeout(CONNECT_TIMEOUT)
            .timeout(REQUEST_TIMEOUT)
            .user_agent("PageChat/0.1")
            .build()
            .unwrap_or_default();
        Self { client, base_url }
    }

    pub fn base_url(&self) -> &Url {
        &self.base_url
    }

    fn endpoint(&self, path: &str) -> Result<Url, ClientError> {
        self.base_url
            .join(path)
            .map_err(|e| ClientError::Validation(format!("bad endpoint {path}: {e}")))
    }
}

#[async_trait]
impl Backend for BackendApi {
    #[instrument(skip(self))]
    async fn check_health(&self) -> HealthReport {
        let url = match self.endpoint("/v1/health") {
            Ok(url) => url,
            Err(e) => {
                return HealthReport {
                    healthy: false,
                    detail: e.to_string(),
                }
            }
        };
        match self.client.get(url).send().await {
            Ok(resp) if resp.status().is_success() => {
                let body: HealthResponse = resp.json().await.unwrap_or_default();
                HealthReport {
                    healthy: true,
                    detail: body.status.unwrap_or_else(|| "healthy".to_string()),
                }
            }
            Ok(resp) => HealthReport {
                healthy: false,
                detail: format!("backend returned {}", resp.status()),
            },
            Err(e) => HealthReport {
                healthy: false,
                detail: e.to_string(),
            },
        }
    }

    #[instrument(skip(self))]
    async fn create_session(&self) -> Result<Session, ClientError> {
        let url = self.endpoint("/v1/sessions")?;
        let resp = self
            .client
            .post(url)
            .json(&serde_json::json!({}))
            .send()
            .await
            .map_err(|e| ClientError::BackendUnavailable(e.to_string()))?;

        let resp = check_status(resp).await?;
        let body: SessionResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::BackendUnavailable(format!("bad session body: {e}")))?;

        debug!(session_id = %body.session.id, "session created");
        Ok(Session::new(SessionId::from_raw(body.session.id), body.token))
    }

    #[instrument(skip(self, session, extracted_text))]
    async fn create_conversation(
        &self,
        session: &Session,
        url: &str,
        title: &str,
        extracted_text: &str,
        content_hash: &str,
    ) -> Result<ConversationId, ClientError> {
        let endpoint = self.endpoint("/v1/conversations")?;
        let body = ConversationRequest {
            url,
            title,
            webpage_content: WebpageContent {
                extracted_text,
                content_hash,
            },
        };
        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(session.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::BackendUnavailable(e.to_string()))?;

        let resp = check_status(resp).await?;
        let body: CreatedResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::BackendUnavailable(format!("bad conversation body: {e}")))?;

        debug!(conversation_id = %body.id, "conversation created");
        Ok(ConversationId::from_raw(body.id))
    }

    #[instrument(skip(self, session, content))]
    async fn post_message(
        &self,
        session: &Session,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<MessageId, ClientError> {
        let endpoint =
            self.endpoint(&format!("/v1/conversations/{conversation_id}/messages"))?;
        let body = MessageRequest {
            content,
            kind: USER_MESSAGE_TYPE,
        };
        let resp = self
            .client
            .post(endpoint)
            .bearer_auth(session.token.expose_secret())
            .json(&body)
            .send()
            .await
            .map_err(|e| ClientError::BackendUnavailable(e.to_string()))?;

        let resp = check_status(resp).await?;
        let body: CreatedResponse = resp
            .json()
            .await
            .map_err(|e| ClientError::BackendUnavailable(format!("bad message body: {e}")))?;

        Ok(MessageId::from_raw(body.id))
    }
}

async fn check_status(resp: reqwest::Response) -> Result<reqwest::Response, ClientError> {
    let status = resp.status();
    if status.is_success() {
        return Ok(resp);
    }
    let body = resp.text().await.unwrap_or_default();
    Err(ClientError::from_status(status.as_u16(), body))
}

// --- Wire shapes ---

#[derive(Serialize)]
struct ConversationRequest<'a> {
    url: &'a str,
    title: &'a str,
    webpage_content: WebpageContent<'a>,
}

#[derive(Serialize)]
struct WebpageContent<'a> {
    extracted_text: &'a str,
    content_hash: &'a str,
}

#[derive(Serialize)]
struct MessageRequest<'a> {
    content: &'a str,
    #[serde(rename = "type")]
    kind: &'a str,
}

#[derive(Deserialize)]
struct SessionResponse {
    session: SessionBody,
    token: String,
}

#[derive(Deserialize)]
struct SessionBody {
    id: String,
}

#[derive(Deserialize)]
struct CreatedResponse {
    id: String,
}

#[derive(Default, Deserialize)]
struct HealthResponse {
    status: Option<String>,
}
