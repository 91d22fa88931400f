use serde::{Deserialize, Serialize};
use url::Url;

use crate::errors::{Result, SettingsError};

/// Allowed range for `max_content_length`, in characters.
pub const MAX_CONTENT_LENGTH_RANGE: std::ops::RangeInclusive<usize> = 1000..=50_000;

const DEFAULT_BACKEND_URL: &str = "http://localhost:8080";
const DEFAULT_MAX_CONTENT_LENGTH: usize = 10_000;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum Theme {
    Light,
    Dark,
}

/// User settings. Field names on disk match the original extension's
/// storage keys so an existing store is readable as-is.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Settings {
    #[serde(rename = "backendURL")]
    pub backend_url: String,
    #[serde(rename = "maxContentLength")]
    pub max_content_length: usize,
    #[serde(rename = "autoExtract")]
    pub auto_extract: bool,
    pub theme: Theme,
    #[serde(rename = "debugMode")]
    pub debug_mode: bool,
}

impl Default for Settings {
    fn default() -> Self {
        Self {
            backend_url: DEFAULT_BACKEND_URL.to_string(),
            max_content_length: DEFAULT_MAX_CONTENT_LENGTH,
            auto_extract: false,
            theme: Theme::Light,
            debug_mode: false,
        }
    }
}

impl Settings {
    /// Reject out-of-range or malformed values before anything persists.
    pub fn validate(&self) -> Result<()> {
        let url = Url::parse(&self.backend_url)
            .map_err(|e| SettingsError::InvalidValue(format!("backendURL: {e}")))?;
        if !matches!(url.scheme(), "http" | "https") {
            return Err(SettingsError::InvalidValue(format!(
                "backendURL: unsupported scheme {:?}",
                url.scheme()
            )));
        }
        if !MAX_CONTENT_LENGTH_RANGE.contains(&self.max_content_length) {
            return Err(SettingsError::InvalidValue(format!(
                "maxContentLength must be within {}..={}, got {}",
                MAX_CONTENT_LENGTH_RANGE.start(),
                MAX_CONTENT_LENGTH_RANGE.end(),
                self.max_content_length
            )));
        }
        Ok(())
    }

    /// Parsed backend URL. Only valid after [`Settings::validate`].
    pub fn backend_url(&self) -> Result<Url> {
        Url::parse(&self.backend_url)
            .map_err(|e| SettingsError::InvalidValue(format!("backendURL: {e}")))
    }
}
