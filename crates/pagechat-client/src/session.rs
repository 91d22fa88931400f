//! Session lifecycle and conversation targeting.
//!
//! A session is created lazily on first use and persisted so later runs
//! resume it. An auth rejection from any call drops the session (and the
//! conversation that referenced it); the next turn starts fresh.

use std::sync::Arc;

use secrecy::ExposeSecret;
use tracing::{debug, info, warn};

use pagechat_core::errors::ClientError;
use pagechat_core::ids::{ConversationId, MessageId, SessionId};
use pagechat_core::session::{Conversation, Session};
use pagechat_settings::KvStore;

use crate::api::Backend;
use crate::hash::content_hash;

pub struct SessionClient {
    backend: Arc<dyn Backend>,
    store: Arc<KvStore>,
    session: Option<Session>,
    current_conversation: Option<ConversationId>,
}

impl SessionClient {
    /// Resume persisted credentials if present; otherwise start signed out.
    pub fn new(backend: Arc<dyn Backend>, store: Arc<KvStore>) -> Self {
        let session = store
            .session()
            .map(|(id, token)| Session::new(SessionId::from_raw(id), token));
        let current_conversation = store.conversation_id().map(ConversationId::from_raw);
        if let Some(s) = &session {
            debug!(session_id = %s.id, "resumed persisted session");
        }
        Self {
            backend,
            store,
            session,
            current_conversation,
        }
    }

    pub fn session_id(&self) -> Option<&SessionId> {
        self.session.as_ref().map(|s| &s.id)
    }

    pub fn current_conversation(&self) -> Option<&ConversationId> {
        self.current_conversation.as_ref()
    }

    /// Return the active session, creating and persisting one if needed.
    pub async fn ensure_session(&mut self) -> Result<Session, ClientError> {
        if let Some(session) = &self.session {
            return Ok(session.clone());
        }
        let session = self.backend.create_session().await?;
        self.store
            .set_session(session.id.as_str(), session.token.expose_secret())
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        info!(session_id = %session.id, "session created");
        self.session = Some(session.clone());
        Ok(session)
    }

    /// Register a page with the backend and make the new conversation the
    /// current target for messages.
    pub async fn create_conversation(
        &mut self,
        url: &str,
        title: &str,
        extracted_text: &str,
    ) -> Result<Conversation, ClientError> {
        let session = self.ensure_session().await?;
        let hash = content_hash(extracted_text);

        let created = self
            .backend
            .create_conversation(&session, url, title, extracted_text, &hash)
            .await;
        let id = self.guard_auth(created)?;

        self.store
            .set_conversation_id(id.as_str())
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        self.current_conversation = Some(id.clone());
        info!(conversation_id = %id, %url, "conversation created");

        Ok(Conversation {
            id,
            source_url: url.to_string(),
            source_title: title.to_string(),
            content_hash: hash,
        })
    }

    /// Post a user message to the current conversation.
    pub async fn post_message(
        &mut self,
        conversation_id: &ConversationId,
        content: &str,
    ) -> Result<MessageId, ClientError> {
        if self.current_conversation.as_ref() != Some(conversation_id) {
            return Err(ClientError::Validation(
                "conversation is no longer the current one".to_string(),
            ));
        }
        let session = self.ensure_session().await?;
        let posted = self
            .backend
            .post_message(&session, conversation_id, content)
            .await;
        self.guard_auth(posted)
    }

    /// Drop the session and conversation, in memory and on disk.
    pub fn reset(&mut self) -> Result<(), ClientError> {
        self.store
            .clear_session()
            .map_err(|e| ClientError::Storage(e.to_string()))?;
        self.session = None;
        self.current_conversation = None;
        Ok(())
    }

    /// Propagate the result, invalidating the session first when the
    /// backend rejected our credentials.
    fn guard_auth<T>(&mut self, result: Result<T, ClientError>) -> Result<T, ClientError> {
        if let Err(e) = &result {
            if e.requires_session_reset() {
                warn!("session rejected by backend, dropping credentials");
                if let Err(store_err) = self.store.clear_session() {
                    warn!("failed to clear rejected session: {store_err}");
                }
                self.session = None;
                self.current_conversation = None;
            }
        }
        result
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::mock::MockBackend;

    fn temp_store() -> (tempfile::TempDir, Arc<KvStore>) {
        let dir = tempfile::tempdir().unwrap();
        let store = Arc::new(KvStore::open(dir.path().join("store.json")));
        (dir, store)
    }

    fn mock_session() -> Session {
        Session::new(SessionId::from_raw("sess_1"), "tok_1")
    }

    #[tokio::test]
    async fn session_created_once_and_persisted() {
        let (_dir, store) = temp_store();
        let backend = Arc::new(MockBackend::new());
        backend.push_session(Ok(mock_session()));

        let mut client = SessionClient::new(backend.clone(), store.clone());
        client.ensure_session().await.unwrap();
        client.ensure_session().await.unwrap();

        assert_eq!(backend.session_calls(), 1);
        assert_eq!(
            store.session(),
            Some(("sess_1".to_string(), "tok_1".to_string()))
        );
    }

    #[tokio::test]
    async fn persisted_session_resumes_without_backend_call() {
        let (_dir, store) = temp_store();
        store.set_session("sess_old", "tok_old").unwrap();

        let backend = Arc::new(MockBackend::new());
        let mut client = SessionClient::new(backend.clone(), store);
        let session = client.ensure_session().await.unwrap();

        assert_eq!(session.id.as_str(), "sess_old");
        assert_eq!(backend.session_calls(), 0);
    }

    #[tokio::test]
    async fn create_conversation_hashes_content_and_sets_current() {
        let (_dir, store) = temp_store();
        let backend = Arc::new(MockBackend::new());
        backend.push_session(Ok(mock_session()));
        backend.push_conversation(Ok(ConversationId::from_raw("conv_1")));

        let mut client = SessionClient::new(backend.clone(), store.clone());
        let conv = client
            .create_conversation("https://example.com", "Example", "page text")
            .await
            .unwrap();

        assert_eq!(conv.id.as_str(), "conv_1");
        assert_eq!(conv.content_hash, content_hash("page text"));
        assert_eq!(client.current_conversation().unwrap().as_str(), "conv_1");
        assert_eq!(store.conversation_id().as_deref(), Some("conv_1"));

        let (_url, _title, _text, hash) = backend.last_conversation_payload().unwrap();
        assert_eq!(hash, content_hash("page text"));
    }

    #[tokio::test]
    async fn auth_rejection_drops_session_and_conversation() {
        let (_dir, store) = temp_store();
        store.set_session("sess_stale", "tok_stale").unwrap();
        store.set_conversation_id("conv_stale").unwrap();

        let backend = Arc::new(MockBackend::new());
        backend.push_conversation(Err(ClientError::AuthRejected("expired".to_string())));

        let mut client = SessionClient::new(backend, store.clone());
        let err = client
            .create_conversation("https://example.com", "Example", "text")
            .await
            .unwrap_err();

        assert!(err.requires_session_reset());
        assert!(client.session_id().is_none());
        assert!(client.current_conversation().is_none());
        assert!(store.session().is_none());
        assert!(store.conversation_id().is_none());
    }

    #[tokio::test]
    async fn next_conversation_after_rejection_gets_fresh_session() {
        let (_dir, store) = temp_store();
        store.set_session("sess_stale", "tok_stale").unwrap();

        let backend = Arc::new(MockBackend::new());
        backend.push_conversation(Err(ClientError::AuthRejected("expired".to_string())));
        backend.push_session(Ok(Session::new(SessionId::from_raw("sess_new"), "tok_new")));
        backend.push_conversation(Ok(ConversationId::from_raw("conv_2")));

        let mut client = SessionClient::new(backend.clone(), store.clone());
        let _ = client
            .create_conversation("https://example.com", "Example", "text")
            .await
            .unwrap_err();

        let conv = client
            .create_conversation("https://example.com", "Example", "text")
            .await
            .unwrap();
        assert_eq!(conv.id.as_str(), "conv_2");
        assert_eq!(backend.session_calls(), 1);
        assert_eq!(
            store.session(),
            Some(("sess_new".to_string(), "tok_new".to_string()))
        );
    }

    #[tokio::test]
    async fn post_message_requires_matching_conversation() {
        let (_dir, store) = temp_store();
        store.set_session("sess_1", "tok_1").unwrap();
        store.set_conversation_id("conv_current").unwrap();

        let backend = Arc::new(MockBackend::new());
        let mut client = SessionClient::new(backend.clone(), store);

        let err = client
            .post_message(&ConversationId::from_raw("conv_other"), "hello")
            .await
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
        assert_eq!(backend.message_calls(), 0);
    }

    #[tokio::test]
    async fn post_message_targets_current_conversation() {
        let (_dir, store) = temp_store();
        store.set_session("sess_1", "tok_1").unwrap();
        store.set_conversation_id("conv_1").unwrap();

        let backend = Arc::new(MockBackend::new());
        backend.push_message(Ok(MessageId::from_raw("m_1")));

        let mut client = SessionClient::new(backend.clone(), store);
        let id = client
            .post_message(&ConversationId::from_raw("conv_1"), "what is this?")
            .await
            .unwrap();

        assert_eq!(id.as_str(), "m_1");
        assert_eq!(
            backend.last_message_content().as_deref(),
            Some("what is this?")
        );
    }

    #[tokio::test]
    async fn newer_conversation_wins() {
        let (_dir, store) = temp_store();
        store.set_session("sess_1", "tok_1").unwrap();

        let backend = Arc::new(MockBackend::new());
        backend.push_conversation(Ok(ConversationId::from_raw("conv_a")));
        backend.push_conversation(Ok(ConversationId::from_raw("conv_b")));

        let mut client = SessionClient::new(backend.clone(), store.clone());
        let first = client
            .create_conversation("https://a.example", "A", "text a")
            .await
            .unwrap();
        let _second = client
            .create_conversation("https://b.example", "B", "text b")
            .await
            .unwrap();

        assert_eq!(store.conversation_id().as_deref(), Some("conv_b"));
        let err = client.post_message(&first.id, "hi").await.unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }

    #[tokio::test]
    async fn reset_clears_everything() {
        let (_dir, store) = temp_store();
        store.set_session("sess_1", "tok_1").unwrap();
        store.set_conversation_id("conv_1").unwrap();

        let backend = Arc::new(MockBackend::new());
        let mut client = SessionClient::new(backend, store.clone());
        client.reset().unwrap();

        assert!(client.session_id().is_none());
        assert!(client.current_conversation().is_none());
        assert!(store.session().is_none());
    }
}
