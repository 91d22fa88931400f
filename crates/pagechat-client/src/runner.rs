//! Transport driver for one streaming turn.
//!
//! Opens the socket through the injected [`SocketOpener`], feeds raw frames
//! through a [`TurnAssembler`], and applies the resulting effects to a
//! shared transcript. The transcript lock is held only while applying
//! effects, never across an await.

use std::sync::Arc;
use std::time::Duration;

use futures::StreamExt;
use parking_lot::RwLock;
use tokio_util::sync::CancellationToken;
use tracing::{debug, instrument, warn};

use pagechat_core::errors::ClientError;
use pagechat_core::ids::{ConversationId, MessageId};
use pagechat_core::messages::Transcript;
use pagechat_core::stream::{StreamFrame, TurnState};

use crate::assembler::{apply_effects, TurnAssembler, TurnEffect};
use crate::socket::SocketOpener;

pub struct TurnRunner {
    opener: Arc<dyn SocketOpener>,
    idle_timeout: Option<Duration>,
}

impl TurnRunner {
    pub fn new(opener: Arc<dyn SocketOpener>) -> Self {
        Self {
            opener,
            idle_timeout: None,
        }
    }

    /// Fail the turn if no frame arrives within `timeout`. Off by default;
    /// long model turns can legitimately go quiet between chunks.
    pub fn with_idle_timeout(mut self, timeout: Duration) -> Self {
        self.idle_timeout = Some(timeout);
        self
    }

    /// Drive one turn to a terminal state, mutating `transcript` as frames
    /// arrive. Returns the final state (`Complete` or `Failed`).
    #[instrument(skip(self, transcript, cancel))]
    pub async fn run(
        &self,
        conversation_id: &ConversationId,
        message_id: &MessageId,
        transcript: Arc<RwLock<Transcript>>,
        cancel: CancellationToken,
    ) -> TurnState {
        let mut assembler = TurnAssembler::new();
        let mut streaming_id: Option<MessageId> = None;
        assembler.begin();

        let mut frames = match self.opener.open(conversation_id, message_id).await {
            Ok(frames) => frames,
            Err(e) => {
                warn!(error = %e, "stream connect failed");
                let effects = assembler.on_disconnect(Some(&e.to_string()));
                apply(&transcript, &mut streaming_id, effects);
                return assembler.state();
            }
        };

        let effects = assembler.on_open();
        apply(&transcript, &mut streaming_id, effects);

        while !assembler.state().is_terminal() {
            let next = tokio::select! {
                _ = cancel.cancelled() => {
                    debug!("turn cancelled");
                    let effects = assembler.cancel();
                    apply(&transcript, &mut streaming_id, effects);
                    break;
                }
                next = next_frame(&mut frames, self.idle_timeout) => next,
            };

            let effects = match next {
                FrameEvent::Text(text) => match serde_json::from_str::<StreamFrame>(&text) {
                    Ok(frame) => assembler.on_frame(frame),
                    Err(e) => {
                        warn!(error = %e, "unparseable stream frame");
                        assembler.on_disconnect(Some("malformed frame"))
                    }
                },
                FrameEvent::TransportError(e) => assembler.on_disconnect(Some(&e.to_string())),
                FrameEvent::Closed => assembler.on_disconnect(None),
                FrameEvent::IdleTimeout => assembler.on_disconnect(Some("stream idle timeout")),
            };
            apply(&transcript, &mut streaming_id, effects);
        }

        assembler.state()
    }
}

enum FrameEvent {
    Text(String),
    TransportError(ClientError),
    Closed,
    IdleTimeout,
}

async fn next_frame(
    frames: &mut crate::socket::FrameStream,
    idle_timeout: Option<Duration>,
) -> FrameEvent {
    let item = match idle_timeout {
        Some(timeout) => match tokio::time::timeout(timeout, frames.next()).await {
            Ok(item) => item,
            Err(_) => return FrameEvent::IdleTimeout,
        },
        None => frames.next().await,
    };
    match item {
        Some(Ok(text)) => FrameEvent::Text(text),
        Some(Err(e)) => FrameEvent::TransportError(e),
        None => FrameEvent::Closed,
    }
}

fn apply(
    transcript: &Arc<RwLock<Transcript>>,
    streaming_id: &mut Option<MessageId>,
    effects: Vec<TurnEffect>,
) {
    if effects.is_empty() {
        return;
    }
    let mut guard = transcript.write();
    apply_effects(&mut guard, streaming_id, effects);
}
