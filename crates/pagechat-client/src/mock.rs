//! Scripted backend and socket opener for tests.
//!
//! Responses are queued ahead of time and popped per call; an empty queue
//! answers with a backend error rather than panicking, so a misconfigured
//! test fails with a readable assertion.

use std::collections::VecDeque;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;
use futures::stream;
use futures::StreamExt;
use parking_lot::Mutex;

use pagechat_core::errors::ClientError;
use pagechat_core::ids::{ConversationId, MessageId};
use pagechat_core::session::Session;

use crate::api::{Backend, HealthReport};
use crate::socket::{FrameStream, SocketOpener};

#[derive(Default)]
pub struct MockBackend {
    sessions: Mutex<VecDeque<Result<Session, ClientError>>>,
    conversations: Mutex<VecDeque<Result<ConversationId, ClientError>>>,
    messages: Mutex<VecDeque<Result<MessageId, ClientError>>>,
    session_calls: AtomicUsize,
    conversation_calls: AtomicUsize,
    message_calls: AtomicUsize,
    last_conversation: Mutex<Option<(String, String, String, String)>>,
    last_message: Mutex<Option<String>>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn push_session(&self, result: Result<Session, ClientError>) {
        self.sessions.lock().push_back(result);
    }

    pub fn push_conversation(&self, result: Result<ConversationId, ClientError>) {
        self.conversations.lock().push_back(result);
    }

    pub fn push_message(&self, result: Result<MessageId, ClientError>) {
        self.messages.lock().push_back(result);
    }

    pub fn session_calls(&self) -> usize {
        self.session_calls.load(Ordering::SeqCst)
    }

    pub fn conversation_calls(&self) -> usize {
        self.conversation_calls.load(Ordering::SeqCst)
    }

    pub fn message_calls(&self) -> usize {
        self.message_calls.load(Ordering::SeqCst)
    }

    /// Arguments of the most recent `create_conversation` call:
    /// `(url, title, extracted_text, content_hash)`.
    pub fn last_conversation_payload(&self) -> Option<(String, String, String, String)> {
        self.last_conversation.lock().clone()
    }

    pub fn last_message_content(&self) -> Option<String> {
        self.last_message.lock().clone()
    }
}

fn unscripted<T>(what: &str) -> Result<T, ClientError> {
    Err(ClientError::BackendUnavailable(format!(
        "no scripted {what} response"
    )))
}

#[async_trait]
impl Backend for MockBackend {
    async fn check_health(&self) -> HealthReport {
        HealthReport {
            healthy: true,
            detail: "mock".to_string(),
        }
    }

    async fn create_session(&self) -> Result<Session, ClientError> {
        self.session_calls.fetch_add(1, Ordering::SeqCst);
        self.sessions
            .lock()
            .pop_front()
            .unwrap_or_else(|| unscripted("session"))
    }

    async fn create_conversation(
        &self,
        _session: &Session,
        url: &str,
        title: &str,
        extracted_text: &str,
        content_hash: &str,
    ) -> Result<ConversationId, ClientError> {
        self.conversation_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_conversation.lock() = Some((
            url.to_string(),
            title.to_string(),
            extracted_text.to_string(),
            content_hash.to_string(),
        ));
        self.conversations
            .lock()
            .pop_front()
            .unwrap_or_else(|| unscripted("conversation"))
    }

    async fn post_message(
        &self,
        _session: &Session,
        _conversation_id: &ConversationId,
        content: &str,
    ) -> Result<MessageId, ClientError> {
        self.message_calls.fetch_add(1, Ordering::SeqCst);
        *self.last_message.lock() = Some(content.to_string());
        self.messages
            .lock()
            .pop_front()
            .unwrap_or_else(|| unscripted("message"))
    }
}

enum Script {
    /// Deliver the frames, then close the stream.
    Frames(Vec<String>),
    /// Deliver the frames, then go silent until dropped.
    FramesThenStall(Vec<String>),
    /// Fail the connect itself.
    FailConnect(String),
}

/// Socket opener that replays a fixed frame script.
pub struct ScriptedOpener {
    script: Script,
    opens: AtomicUsize,
}

impl ScriptedOpener {
    pub fn with_frames(frames: Vec<String>) -> Self {
        Self {
            script: Script::Frames(frames),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn stalling_after(frames: Vec<String>) -> Self {
        Self {
            script: Script::FramesThenStall(frames),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn failing_connect(detail: &str) -> Self {
        Self {
            script: Script::FailConnect(detail.to_string()),
            opens: AtomicUsize::new(0),
        }
    }

    pub fn open_calls(&self) -> usize {
        self.opens.load(Ordering::SeqCst)
    }
}

#[async_trait]
impl SocketOpener for ScriptedOpener {
    async fn open(
        &self,
        _conversation_id: &ConversationId,
        _message_id: &MessageId,
    ) -> Result<FrameStream, ClientError> {
        self.opens.fetch_add(1, Ordering::SeqCst);
        match &self.script {
            Script::Frames(frames) => {
                let items: Vec<Result<String, ClientError>> =
                    frames.iter().cloned().map(Ok).collect();
                Ok(Box::pin(stream::iter(items)))
            }
            Script::FramesThenStall(frames) => {
                let items: Vec<Result<String, ClientError>> =
                    frames.iter().cloned().map(Ok).collect();
                Ok(Box::pin(stream::iter(items).chain(stream::pending())))
            }
            Script::FailConnect(detail) => {
                Err(ClientError::StreamFailure(detail.clone()))
            }
        }
    }
}
