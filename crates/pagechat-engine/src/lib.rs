//! Conversation orchestration: page extraction into a backend
//! conversation, user sends, and streamed replies, all feeding one
//! transcript. One outstanding streaming turn at a time.

pub mod controller;

pub use controller::{ConversationController, ConversationStart};
