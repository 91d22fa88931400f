use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::ids::MessageId;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Role {
    User,
    Assistant,
    System,
}

/// One entry in a conversation transcript.
///
/// `streaming` is true only for the single in-progress assistant reply;
/// its timestamp is re-stamped when streaming finishes.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ChatMessage {
    pub id: MessageId,
    pub role: Role,
    pub content: String,
    pub timestamp: DateTime<Utc>,
    pub streaming: bool,
}

/// Append-only, time-ordered message sequence for one conversation view.
///
/// Invariants enforced here:
/// - timestamps are monotonically non-decreasing;
/// - at most one message has `streaming == true` at any time.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct Transcript {
    messages: Vec<ChatMessage>,
}

impl Transcript {
    pub fn new() -> Self {
        Self::default()
    }

    /// Append a completed (non-streaming) message and return its id.
    pub fn append(&mut self, role: Role, content: impl Into<String>) -> MessageId {
        let id = MessageId::new();
        let timestamp = self.next_timestamp();
        self.messages.push(ChatMessage {
            id: id.clone(),
            role,
            content: content.into(),
            timestamp,
            streaming: false,
        });
        id
    }

    /// Append an empty assistant message in streaming state.
    ///
    /// Returns `None` if another message is already streaming.
    pub fn begin_streaming(&mut self) -> Option<MessageId> {
        if self.streaming_message().is_some() {
            return None;
        }
        let id = MessageId::new();
        let timestamp = self.next_timestamp();
        self.messages.push(ChatMessage {
            id: id.clone(),
            role: Role::Assistant,
            content: String::new(),
            timestamp,
            streaming: true,
        });
        Some(id)
    }

    /// Append a chunk to the streaming message with the given id.
    pub fn append_chunk(&mut self, id: &MessageId, chunk: &str) {
        if let Some(msg) = self.get_mut(id) {
            if msg.streaming {
                msg.content.push_str(chunk);
            }
        }
    }

    /// Mark the message non-streaming and re-stamp its completion time.
    pub fn finish_streaming(&mut self, id: &MessageId) {
        let timestamp = self.next_timestamp();
        if let Some(msg) = self.get_mut(id) {
            if msg.streaming {
                msg.streaming = false;
                msg.timestamp = timestamp;
            }
        }
    }

    /// Replace the content of the streaming message and mark it final.
    ///
    /// Used when a turn fails before any chunk arrived: the placeholder
    /// becomes the failure notice instead of leaving an empty entry.
    pub fn replace_streaming(&mut self, id: &MessageId, content: impl Into<String>) {
        let timestamp = self.next_timestamp();
        if let Some(msg) = self.get_mut(id) {
            if msg.streaming {
                msg.content = content.into();
                msg.streaming = false;
                msg.timestamp = timestamp;
            }
        }
    }

    pub fn get(&self, id: &MessageId) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| &m.id == id)
    }

    pub fn streaming_message(&self) -> Option<&ChatMessage> {
        self.messages.iter().find(|m| m.streaming)
    }

    pub fn messages(&self) -> &[ChatMessage] {
        &self.messages
    }

    pub fn last(&self) -> Option<&ChatMessage> {
        self.messages.last()
    }

    pub fn len(&self) -> usize {
        self.messages.len()
    }

    pub fn is_empty(&self) -> bool {
        self.messages.is_empty()
    }

    fn get_mut(&mut self, id: &MessageId) -> Option<&mut ChatMessage> {
        self.messages.iter_mut().find(|m| &m.id == id)
    }

    /// Wall clock, clamped so the sequence never goes backwards.
    fn next_timestamp(&self) -> DateTime<Utc> {
        let now = Utc::now();
        match self.messages.last() {
            Some(last) if last.timestamp > now => last.timestamp,
            _ => now,
        }
    }
}
