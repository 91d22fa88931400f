//! Settings error types.

use thiserror::Error;

/// Errors that can occur when loading, validating, or persisting settings.
#[derive(Debug, Error)]
pub enum SettingsError {
    /// Failed to read or write the store file.
    #[error("failed to access settings store: {0}")]
    Io(#[from] std::io::Error),
    /// Failed to parse or serialize the store JSON.
    #[error("failed to parse settings JSON: {0}")]
    Json(#[from] serde_json::Error),
    /// A settings value was rejected before persistence.
    #[error("invalid settings value: {0}")]
    InvalidValue(String),
}

/// Result type for settings operations.
pub type Result<T> = std::result::Result<T, SettingsError>;

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn io_error_display() {
        let err = SettingsError::Io(std::io::Error::new(
            std::io::ErrorKind::NotFound,
            "not found",
        ));
        assert!(err.to_string().contains("not found"));
    }

    #[test]
    fn invalid_value_display() {
        let err = SettingsError::InvalidValue("maxContentLength out of range".into());
        assert!(err.to_string().contains("out of range"));
    }
}
