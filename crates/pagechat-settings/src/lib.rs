//! # pagechat-settings
//!
//! User settings plus the small persisted key-value surface the client
//! relies on (`settings`, `sessionID`, `authToken`, `conversationID`).
//!
//! Everything lives in one JSON file (`~/.pagechat/store.json` by
//! default). A missing or corrupt file falls back to defaults; settings
//! are validated before persistence so a rejected update never leaves a
//! partial write behind.

pub mod errors;
pub mod store;
pub mod types;

pub use errors::{Result, SettingsError};
pub use store::{store_path, KvStore};
pub use types::{Settings, Theme, MAX_CONTENT_LENGTH_RANGE};
