//! Pure reconstruction of one streamed assistant reply.
//!
//! The assembler consumes socket events (open, frame, disconnect, cancel)
//! and emits transcript effects; it never touches the network itself, so
//! the reconstruction rules are testable without a socket. The runner owns
//! the transport and feeds events in.

use pagechat_core::ids::MessageId;
use pagechat_core::messages::Transcript;
use pagechat_core::stream::{StreamFrame, TurnState};
use tracing::{debug, warn};

/// Transcript mutation requested by the assembler for one event.
#[derive(Clone, Debug, PartialEq, Eq)]
pub enum TurnEffect {
    /// Start the placeholder assistant message.
    BeginStreaming,
    /// Append one chunk to the streaming message.
    AppendChunk(String),
    /// Mark the streaming message final, keeping its accumulated content.
    FinishStreaming,
    /// Replace the (empty) streaming message with a failure notice, or
    /// append the notice if no streaming message exists.
    ReplaceWithFailure(String),
    /// Append a standalone assistant notice after the streamed content.
    AppendAssistantNotice(String),
}

/// State machine for one turn: Idle -> Connecting -> Streaming, ending in
/// Complete or Failed. Frames arriving after a terminal state are ignored.
#[derive(Debug)]
pub struct TurnAssembler {
    state: TurnState,
    begun: bool,
    chunks: usize,
}

impl Default for TurnAssembler {
    fn default() -> Self {
        Self::new()
    }
}

impl TurnAssembler {
    pub fn new() -> Self {
        Self {
            state: TurnState::Idle,
            begun: false,
            chunks: 0,
        }
    }

    pub fn state(&self) -> TurnState {
        self.state
    }

    /// Whether any reply content arrived before the turn ended.
    pub fn has_partial_content(&self) -> bool {
        self.begun && self.chunks > 0
    }

    /// The turn begins connecting.
    pub fn begin(&mut self) {
        if self.state == TurnState::Idle {
            self.state = TurnState::Connecting;
        }
    }

    /// The socket opened; the placeholder reply starts now.
    pub fn on_open(&mut self) -> Vec<TurnEffect> {
        if self.state != TurnState::Connecting {
            return Vec::new();
        }
        self.state = TurnState::Streaming;
        self.begun = true;
        vec![TurnEffect::BeginStreaming]
    }

    /// One parsed frame from the socket.
    pub fn on_frame(&mut self, frame: StreamFrame) -> Vec<TurnEffect> {
        if self.state.is_terminal() {
            debug!("frame after terminal state ignored");
            return Vec::new();
        }
        match frame {
            StreamFrame::Stream { content, data } => {
                let mut effects = Vec::new();
                if !content.is_empty() {
                    self.chunks += 1;
                    effects.push(TurnEffect::AppendChunk(content));
                }
                if data.is_complete {
                    self.state = TurnState::Complete;
                    effects.push(TurnEffect::FinishStreaming);
                }
                effects
            }
            StreamFrame::Error { content } => {
                warn!(%content, "server reported stream error");
                self.state = TurnState::Failed;
                if self.chunks == 0 {
                    vec![TurnEffect::ReplaceWithFailure(format!("Error: {content}"))]
                } else {
                    vec![
                        TurnEffect::FinishStreaming,
                        TurnEffect::AppendAssistantNotice(format!("Error: {content}")),
                    ]
                }
            }
        }
    }

    /// The socket closed or errored before a completion frame.
    ///
    /// Partial content that already arrived is kept as-is; the reply is
    /// sealed with no extra notice appended.
    pub fn on_disconnect(&mut self, detail: Option<&str>) -> Vec<TurnEffect> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        warn!(detail = detail.unwrap_or("closed"), "stream ended early");
        self.state = TurnState::Failed;
        if self.chunks > 0 {
            vec![TurnEffect::FinishStreaming]
        } else {
            vec![TurnEffect::ReplaceWithFailure(
                "Sorry, a streaming error occurred. Please try again.".to_string(),
            )]
        }
    }

    /// User-initiated cancel: seal whatever arrived, add nothing.
    pub fn cancel(&mut self) -> Vec<TurnEffect> {
        if self.state.is_terminal() {
            return Vec::new();
        }
        self.state = TurnState::Failed;
        if self.begun {
            vec![TurnEffect::FinishStreaming]
        } else {
            Vec::new()
        }
    }
}

/// Apply assembler effects to a transcript, tracking the streaming message
/// id across calls.
pub fn apply_effects(
    transcript: &mut Transcript,
    streaming_id: &mut Option<MessageId>,
    effects: Vec<TurnEffect>,
) {
    use pagechat_core::messages::Role;

    for effect in effects {
        match effect {
            TurnEffect::BeginStreaming => {
                *streaming_id = transcript.begin_streaming();
            }
            TurnEffect::AppendChunk(chunk) => {
                if let Some(id) = streaming_id {
                    transcript.append_chunk(id, &chunk);
                }
            }
            TurnEffect::FinishStreaming => {
                if let Some(id) = streaming_id.take() {
                    transcript.finish_streaming(&id);
                }
            }
            TurnEffect::ReplaceWithFailure(notice) => {
                match streaming_id.take() {
                    Some(id) => transcript.replace_streaming(&id, notice),
                    None => {
                        let _ = transcript.append(Role::Assistant, notice);
                    }
                }
            }
            TurnEffect::AppendAssistantNotice(notice) => {
                let _ = transcript.append(Role::Assistant, notice);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use pagechat_core::messages::Role;
    use pagechat_core::stream::StreamData;

    fn chunk(content: &str, complete: bool) -> StreamFrame {
        StreamFrame::Stream {
            content: content.to_string(),
            data: StreamData {
                is_complete: complete,
            },
        }
    }

    #[test]
    fn happy_path_reassembles_chunks() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        assert_eq!(a.state(), TurnState::Connecting);
        apply_effects(&mut t, &mut id, a.on_open());
        assert_eq!(a.state(), TurnState::Streaming);

        apply_effects(&mut t, &mut id, a.on_frame(chunk("Hel", false)));
        apply_effects(&mut t, &mut id, a.on_frame(chunk("lo!", true)));

        assert_eq!(a.state(), TurnState::Complete);
        let msg = t.last().unwrap();
        assert_eq!(msg.content, "Hello!");
        assert_eq!(msg.role, Role::Assistant);
        assert!(!msg.streaming);
    }

    #[test]
    fn completion_frame_may_carry_content() {
        let mut a = TurnAssembler::new();
        let effects = {
            a.begin();
            let _ = a.on_open();
            a.on_frame(chunk("done", true))
        };
        assert_eq!(
            effects,
            vec![
                TurnEffect::AppendChunk("done".to_string()),
                TurnEffect::FinishStreaming
            ]
        );
    }

    #[test]
    fn frames_after_completion_are_ignored() {
        let mut a = TurnAssembler::new();
        a.begin();
        let _ = a.on_open();
        let _ = a.on_frame(chunk("all", true));
        assert!(a.on_frame(chunk("late", false)).is_empty());
        assert!(a.on_disconnect(None).is_empty());
        assert_eq!(a.state(), TurnState::Complete);
    }

    #[test]
    fn error_frame_with_no_chunks_replaces_placeholder() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        apply_effects(&mut t, &mut id, a.on_open());
        apply_effects(
            &mut t,
            &mut id,
            a.on_frame(StreamFrame::Error {
                content: "model overloaded".to_string(),
            }),
        );

        assert_eq!(a.state(), TurnState::Failed);
        assert_eq!(t.len(), 1);
        let msg = t.last().unwrap();
        assert_eq!(msg.content, "Error: model overloaded");
        assert!(!msg.streaming);
    }

    #[test]
    fn error_frame_after_chunks_keeps_partial_and_appends_notice() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        apply_effects(&mut t, &mut id, a.on_open());
        apply_effects(&mut t, &mut id, a.on_frame(chunk("partial answer", false)));
        apply_effects(
            &mut t,
            &mut id,
            a.on_frame(StreamFrame::Error {
                content: "cut off".to_string(),
            }),
        );

        assert_eq!(t.len(), 2);
        assert_eq!(t.messages()[0].content, "partial answer");
        assert!(!t.messages()[0].streaming);
        assert_eq!(t.messages()[1].content, "Error: cut off");
    }

    #[test]
    fn abrupt_close_preserves_partial_content_without_notice() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        apply_effects(&mut t, &mut id, a.on_open());
        apply_effects(&mut t, &mut id, a.on_frame(chunk("half an ans", false)));
        apply_effects(&mut t, &mut id, a.on_disconnect(Some("connection reset")));

        assert_eq!(a.state(), TurnState::Failed);
        assert_eq!(t.len(), 1);
        let msg = t.last().unwrap();
        assert_eq!(msg.content, "half an ans");
        assert!(!msg.streaming);
    }

    #[test]
    fn close_before_any_chunk_yields_failure_notice() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        apply_effects(&mut t, &mut id, a.on_open());
        apply_effects(&mut t, &mut id, a.on_disconnect(None));

        assert_eq!(t.len(), 1);
        assert!(t.last().unwrap().content.contains("streaming error"));
    }

    #[test]
    fn connect_failure_appends_notice_without_placeholder() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        // open never happened; disconnect reports the connect error
        apply_effects(&mut t, &mut id, a.on_disconnect(Some("refused")));

        assert_eq!(t.len(), 1);
        assert_eq!(t.last().unwrap().role, Role::Assistant);
        assert!(!t.last().unwrap().streaming);
    }

    #[test]
    fn cancel_is_silent_and_keeps_partial() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        apply_effects(&mut t, &mut id, a.on_open());
        apply_effects(&mut t, &mut id, a.on_frame(chunk("so far", false)));
        apply_effects(&mut t, &mut id, a.cancel());

        assert_eq!(a.state(), TurnState::Failed);
        assert_eq!(t.len(), 1);
        assert_eq!(t.last().unwrap().content, "so far");
        assert!(t.streaming_message().is_none());
    }

    #[test]
    fn cancel_before_open_adds_nothing() {
        let mut a = TurnAssembler::new();
        let mut t = Transcript::new();
        let mut id = None;

        a.begin();
        apply_effects(&mut t, &mut id, a.cancel());
        assert!(t.is_empty());
        assert_eq!(a.state(), TurnState::Failed);
    }

    #[test]
    fn empty_chunks_do_not_count_as_content() {
        let mut a = TurnAssembler::new();
        a.begin();
        let _ = a.on_open();
        let _ = a.on_frame(chunk("", false));
        assert!(!a.has_partial_content());
    }
}
