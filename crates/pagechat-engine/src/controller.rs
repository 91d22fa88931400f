//! The conversation controller.
//!
//! Owns the transcript and the current turn. Transport capabilities (the
//! backend api and the socket opener) are injected at construction, so the
//! whole flow runs against scripted fakes in tests.

use std::sync::Arc;
use std::time::Duration;

use parking_lot::RwLock;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;
use tracing::{info, instrument, warn};

use pagechat_client::api::{Backend, HealthReport};
use pagechat_client::runner::TurnRunner;
use pagechat_client::session::SessionClient;
use pagechat_client::socket::SocketOpener;
use pagechat_core::errors::ClientError;
use pagechat_core::ids::MessageId;
use pagechat_core::messages::{Role, Transcript};
use pagechat_core::session::Conversation;
use pagechat_core::stream::TurnState;
use pagechat_extract::{extract, read_metadata, ExtractedContent, PageMetadata, PageSnapshot};
use pagechat_settings::KvStore;

/// Everything produced by a successful page registration.
#[derive(Debug)]
pub struct ConversationStart {
    pub conversation: Conversation,
    pub content: ExtractedContent,
    pub metadata: PageMetadata,
}

pub struct ConversationController {
    backend: Arc<dyn Backend>,
    opener: Arc<dyn SocketOpener>,
    store: Arc<KvStore>,
    session: SessionClient,
    transcript: Arc<RwLock<Transcript>>,
    turn: Option<TurnHandle>,
    idle_timeout: Option<Duration>,
}

struct TurnHandle {
    cancel: CancellationToken,
    task: JoinHandle<TurnState>,
}

impl ConversationController {
    pub fn new(
        backend: Arc<dyn Backend>,
        opener: Arc<dyn SocketOpener>,
        store: Arc<KvStore>,
    ) -> Self {
        let session = SessionClient::new(backend.clone(), store.clone());
        Self {
            backend,
            opener,
            store,
            session,
            transcript: Arc::new(RwLock::new(Transcript::new())),
            turn: None,
            idle_timeout: None,
        }
    }

    /// Fail a turn whose stream goes quiet for longer than `timeout`.
    /// Off by default.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// The transcript for the current conversation. Re-fetch after
    /// [`start_conversation`](Self::start_conversation): each conversation
    /// gets a fresh transcript.
    pub fn transcript(&self) -> Arc<RwLock<Transcript>> {
        self.transcript.clone()
    }

    pub async fn check_health(&self) -> HealthReport {
        self.backend.check_health().await
    }

    /// Extract the page, register it as a new conversation, and make it
    /// the current target. A turn still streaming for the previous
    /// conversation is cancelled silently; whichever extraction completes
    /// last owns the current-conversation pointer.
    #[instrument(skip(self, snapshot), fields(url = snapshot.url()))]
    pub async fn start_conversation(
        &mut self,
        snapshot: &mut PageSnapshot,
    ) -> Result<ConversationStart, ClientError> {
        self.cancel_turn();

        let max_length = self.store.settings().max_content_length;
        let content = extract(snapshot, max_length);
        let metadata = read_metadata(snapshot);
        if let Some(reason) = &content.error {
            warn!(%reason, "extraction degraded, registering page anyway");
        }

        match self
            .session
            .create_conversation(&content.url, &content.title, &content.text)
            .await
        {
            Ok(conversation) => {
                let transcript = Arc::new(RwLock::new(Transcript::new()));
                transcript.write().append(
                    Role::System,
                    format!("New conversation started for: {}", content.title),
                );
                self.transcript = transcript;
                info!(conversation_id = %conversation.id, "conversation ready");
                Ok(ConversationStart {
                    conversation,
                    content,
                    metadata,
                })
            }
            Err(e) => {
                self.transcript
                    .write()
                    .append(Role::System, format!("Failed to start conversation: {e}"));
                Err(e)
            }
        }
    }

    /// Append a user message, post it, and begin streaming the reply.
    ///
    /// Rejected without touching the transcript when no conversation is
    /// current or a turn is already in flight.
    #[instrument(skip(self, content))]
    pub async fn send_message(&mut self, content: &str) -> Result<MessageId, ClientError> {
        self.reap_finished_turn();
        if self.turn.is_some() {
            return Err(ClientError::Validation(
                "a streaming turn is already in progress".to_string(),
            ));
        }
        let conversation_id = self
            .session
            .current_conversation()
            .cloned()
            .ok_or_else(|| ClientError::Validation("no active conversation".to_string()))?;

        self.transcript.write().append(Role::User, content);

        let message_id = match self.session.post_message(&conversation_id, content).await {
            Ok(id) => id,
            Err(e) => {
                self.transcript
                    .write()
                    .append(Role::System, format!("Failed to send message: {e}"));
                return Err(e);
            }
        };

        let mut runner = TurnRunner::new(self.opener.clone());
        if let Some(timeout) = self.idle_timeout {
            runner = runner.with_idle_timeout(timeout);
        }
        let cancel = CancellationToken::new();
        let task = tokio::spawn({
            let cancel = cancel.clone();
            let transcript = self.transcript.clone();
            let conversation_id = conversation_id.clone();
            let message_id = message_id.clone();
            async move {
                runner
                    .run(&conversation_id, &message_id, transcript, cancel)
                    .await
            }
        });
        self.turn = Some(TurnHandle { cancel, task });

        Ok(message_id)
    }

    /// Whether a streaming turn is currently in flight.
    pub fn turn_active(&self) -> bool {
        self.turn.as_ref().is_some_and(|h| !h.task.is_finished())
    }

    /// Cancel the in-flight turn, if any. Silent: partial content is
    /// sealed in place and no error message is appended.
    pub fn cancel_turn(&mut self) {
        if let Some(handle) = self.turn.take() {
            handle.cancel.cancel();
            // the task seals its transcript on the way out
        }
    }

    /// Wait for the in-flight turn to reach a terminal state.
    pub async fn await_turn(&mut self) -> Option<TurnState> {
        let handle = self.turn.take()?;
        match handle.task.await {
            Ok(state) => Some(state),
            Err(e) => {
                warn!("turn task aborted: {e}");
                Some(TurnState::Failed)
            }
        }
    }

    /// Drop the session, the current conversation, and the transcript.
    pub fn reset(&mut self) -> Result<(), ClientError> {
        self.cancel_turn();
        self.session.reset()?;
        self.transcript = Arc::new(RwLock::new(Transcript::new()));
        Ok(())
    }

    fn reap_finished_turn(&mut self) {
        if !self.turn_active() {
            self.turn = None;
        }
    }
}
