use serde::{Deserialize, Serialize};

/// One inbound WebSocket frame on the streaming endpoint. Transient, never
/// persisted. The stream is receive-only after connect.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum StreamFrame {
    /// A chunk of the assistant reply. `data.is_complete` marks the final
    /// chunk of the turn.
    Stream { content: String, data: StreamData },
    /// Server-reported failure; no further frames follow for this turn.
    Error { content: String },
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StreamData {
    pub is_complete: bool,
}

/// Lifecycle of one streaming turn. `Complete` and `Failed` are terminal.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum TurnState {
    Idle,
    Connecting,
    Streaming,
    Complete,
    Failed,
}

impl TurnState {
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Complete | Self::Failed)
    }

    /// Whether a new turn may not start while this one is in flight.
    pub fn is_active(self) -> bool {
        matches!(self, Self::Connecting | Self::Streaming)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn stream_frame_wire_shape() {
        let frame: StreamFrame = serde_json::from_str(
            r#"{"type":"stream","content":"Hel","data":{"is_complete":false}}"#,
        )
        .unwrap();
        match frame {
            StreamFrame::Stream { content, data } => {
                assert_eq!(content, "Hel");
                assert!(!data.is_complete);
            }
            StreamFrame::Error { .. } => panic!("expected stream frame"),
        }
    }

    #[test]
    fn error_frame_wire_shape() {
        let frame: StreamFrame =
            serde_json::from_str(r#"{"type":"error","content":"model overloaded"}"#).unwrap();
        assert!(matches!(frame, StreamFrame::Error { content } if content == "model overloaded"));
    }

    #[test]
    fn unknown_frame_type_is_rejected() {
        let parsed = serde_json::from_str::<StreamFrame>(r#"{"type":"ping"}"#);
        assert!(parsed.is_err());
    }

    #[test]
    fn terminal_and_active_classification() {
        assert!(TurnState::Complete.is_terminal());
        assert!(TurnState::Failed.is_terminal());
        assert!(!TurnState::Streaming.is_terminal());
        assert!(TurnState::Connecting.is_active());
        assert!(TurnState::Streaming.is_active());
        assert!(!TurnState::Idle.is_active());
        assert!(!TurnState::Failed.is_active());
    }
}
