//! Socket transport for the streaming endpoint.
//!
//! The opener is a capability injected into the turn runner; the real
//! implementation connects over WebSocket, tests substitute a scripted
//! stream. The stream is receive-only: each item is the text payload of
//! one inbound frame.

use std::pin::Pin;

use async_trait::async_trait;
use futures::{Stream, StreamExt};
use tokio_tungstenite::connect_async;
use tokio_tungstenite::tungstenite::Message;
use tracing::debug;
use url::Url;

use pagechat_core::errors::ClientError;
use pagechat_core::ids::{ConversationId, MessageId};

/// Inbound text frames for one turn. Ends when the socket closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, ClientError>> + Send>>;

#[async_trait]
pub trait SocketOpener: Send + Sync {
    async fn open(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<FrameStream, ClientError>;
}

/// WebSocket opener for `{ws|wss}://{backendHost}/v1/stream`.
pub struct WsSocketOpener {
    base_url: Url,
}

impl WsSocketOpener {
    /// `base_url` is the backend's HTTP URL; the scheme is switched to the
    /// matching WebSocket scheme on connect.
    pub fn new(base_url: Url) -> Self {
        Self { base_url }
    }

    pub fn stream_url(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<Url, ClientError> {
        let mut url = self.base_url.clone();
        let scheme = match url.scheme() {
            "http" | "ws" => "ws",
            "https" | "wss" => "wss",
            other => {
                return Err(ClientError::Validation(format!(
                    "cannot stream over scheme {other:?}"
                )))
            }
        };
        url.set_scheme(scheme)
            .map_err(|()| ClientError::Validation("cannot rewrite stream scheme".into()))?;
        url.set_path("/v1/stream");
        url.query_pairs_mut()
            .clear()
            .append_pair("conversationId", conversation_id.as_str())
            .append_pair("messageId", message_id.as_str());
        Ok(url)
    }
}

#[async_trait]
impl SocketOpener for WsSocketOpener {
    async fn open(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
    ) -> Result<FrameStream, ClientError> {
        let url = self.stream_url(conversation_id, message_id)?;
        debug!(%url, "opening stream socket");

        let (ws, _response) = connect_async(url.as_str())
            .await
            .map_err(|e| ClientError::StreamFailure(format!("connect failed: {e}")))?;

        // Dropping the stream closes the socket, so every exit path in the
        // runner releases the connection.
        let frames = ws.filter_map(|item| async move {
            match item {
                Ok(Message::Text(text)) => Some(Ok(text.to_string())),
                Ok(Message::Close(_)) => None,
                Ok(_) => None,
                Err(e) => Some(Err(ClientError::StreamFailure(e.to_string()))),
            }
        });
        Ok(Box::pin(frames))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn opener(base: &str) -> WsSocketOpener {
        WsSocketOpener::new(Url::parse(base).unwrap())
    }

    #[test]
    fn stream_url_carries_both_ids() {
        let url = opener("http://localhost:8080")
            .stream_url(
                &ConversationId::from_raw("conv_1"),
                &MessageId::from_raw("m_2"),
            )
            .unwrap();
        assert_eq!(
            url.as_str(),
            "ws://localhost:8080/v1/stream?conversationId=conv_1&messageId=m_2"
        );
    }

    #[test]
    fn https_upgrades_to_wss() {
        let url = opener("https://backend.example.com")
            .stream_url(&ConversationId::from_raw("c"), &MessageId::from_raw("m"))
            .unwrap();
        assert_eq!(url.scheme(), "wss");
    }

    #[test]
    fn non_http_scheme_is_rejected() {
        let err = opener("file:///tmp/x")
            .stream_url(&ConversationId::from_raw("c"), &MessageId::from_raw("m"))
            .unwrap_err();
        assert!(matches!(err, ClientError::Validation(_)));
    }
}
