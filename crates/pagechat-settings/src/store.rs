//! Persisted key-value store backing settings and session identifiers.
//!
//! Reads and writes a single JSON file with 0o600 permissions. The store
//! is the process-wide source of truth: all mutation happens under a
//! write lock and is flushed before the in-memory copy is replaced, so
//! concurrent readers never observe a partial update.

use std::path::{Path, PathBuf};

use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::warn;

use crate::errors::Result;
use crate::types::Settings;

/// File name under the data directory.
const STORE_FILE_NAME: &str = "store.json";

/// Resolve the default store path (`~/.pagechat/store.json`).
pub fn store_path() -> PathBuf {
    let home = std::env::var("HOME").unwrap_or_else(|_| "/tmp".to_string());
    PathBuf::from(home).join(".pagechat").join(STORE_FILE_NAME)
}

/// On-disk shape. Key names match the original extension's storage keys.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
struct StoreData {
    #[serde(default)]
    settings: Option<Settings>,
    #[serde(rename = "sessionID", skip_serializing_if = "Option::is_none")]
    session_id: Option<String>,
    #[serde(rename = "authToken", skip_serializing_if = "Option::is_none")]
    auth_token: Option<String>,
    #[serde(rename = "conversationID", skip_serializing_if = "Option::is_none")]
    conversation_id: Option<String>,
}

pub struct KvStore {
    path: PathBuf,
    data: RwLock<StoreData>,
}

impl KvStore {
    /// Open the store at `path`.
    ///
    /// A missing file yields defaults (first run); a corrupt file is
    /// logged and treated the same rather than blocking startup.
    pub fn open(path: impl Into<PathBuf>) -> Self {
        let path = path.into();
        let data = load(&path).unwrap_or_default();
        Self {
            path,
            data: RwLock::new(data),
        }
    }

    /// Current settings; compiled defaults until the first update.
    pub fn settings(&self) -> Settings {
        self.data.read().settings.clone().unwrap_or_default()
    }

    /// Validate and persist new settings. Rejected values leave both the
    /// file and the in-memory copy untouched.
    pub fn update_settings(&self, settings: Settings) -> Result<()> {
        settings.validate()?;
        self.update(|data| data.settings = Some(settings))
    }

    pub fn session(&self) -> Option<(String, String)> {
        let data = self.data.read();
        Some((data.session_id.clone()?, data.auth_token.clone()?))
    }

    pub fn set_session(&self, session_id: &str, auth_token: &str) -> Result<()> {
        self.update(|data| {
            data.session_id = Some(session_id.to_string());
            data.auth_token = Some(auth_token.to_string());
        })
    }

    /// Drop session credentials and the conversation that referenced them.
    pub fn clear_session(&self) -> Result<()> {
        self.update(|data| {
            data.session_id = None;
            data.auth_token = None;
            data.conversation_id = None;
        })
    }

    pub fn conversation_id(&self) -> Option<String> {
        self.data.read().conversation_id.clone()
    }

    pub fn set_conversation_id(&self, conversation_id: &str) -> Result<()> {
        self.update(|data| data.conversation_id = Some(conversation_id.to_string()))
    }

    /// Atomic read-modify-write: the mutation is applied to a copy, the
    /// copy is flushed to disk, and only then does it become visible.
    fn update(&self, mutate: impl FnOnce(&mut StoreData)) -> Result<()> {
        let mut data = self.data.write();
        let mut next = data.clone();
        mutate(&mut next);
        persist(&self.path, &next)?;
        *data = next;
        Ok(())
    }
}

fn load(path: &Path) -> Option<StoreData> {
    let raw = match std::fs::read_to_string(path) {
        Ok(raw) => raw,
        Err(e) if e.kind() == std::io::ErrorKind::NotFound => return None,
        Err(e) => {
            warn!("failed to read store file: {e}");
            return None;
        }
    };
    match serde_json::from_str(&raw) {
        Ok(data) => Some(data),
        Err(e) => {
            warn!("failed to parse store file, using defaults: {e}");
            None
        }
    }
}

fn persist(path: &Path, data: &StoreData) -> Result<()> {
    if let Some(parent) = path.parent() {
        std::fs::create_dir_all(parent)?;
    }
    let json = serde_json::to_string_pretty(data)?;
    std::fs::write(path, &json)?;

    #[cfg(unix)]
    {
        use std::os::unix::fs::PermissionsExt;
        let perms = std::fs::Permissions::from_mode(0o600);
        let _ = std::fs::set_permissions(path, perms);
    }

    Ok(())
}
