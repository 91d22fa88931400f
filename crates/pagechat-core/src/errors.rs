/// Typed error hierarchy for backend and streaming operations.
///
/// Extraction failures never appear here: the extractor always hands back a
/// degraded record instead of an error, so nothing upstream has to handle
/// them. Everything else is classified so the controller can decide whether
/// a retry needs a fresh session first.
#[derive(Clone, Debug, thiserror::Error)]
pub enum ClientError {
    /// Network failure or a non-2xx response that is not an auth rejection.
    /// State is left unchanged; the caller may retry as-is.
    #[error("backend unavailable: {0}")]
    BackendUnavailable(String),

    /// 401/403 from the backend. The session must be dropped and
    /// re-established before any retry.
    #[error("authentication rejected: {0}")]
    AuthRejected(String),

    /// The current streaming turn ended in a terminal failure.
    #[error("stream failed: {0}")]
    StreamFailure(String),

    /// Contract violation rejected before any state change (settings out of
    /// range, send while a turn is active, unknown conversation id).
    #[error("validation failed: {0}")]
    Validation(String),

    /// The persisted key-value store could not be read or written.
    #[error("storage error: {0}")]
    Storage(String),
}

impl ClientError {
    /// Whether the caller must call `ensure_session` again before retrying.
    pub fn requires_session_reset(&self) -> bool {
        matches!(self, Self::AuthRejected(_))
    }

    /// Whether a plain retry (no state change) is reasonable.
    pub fn is_retryable(&self) -> bool {
        matches!(self, Self::BackendUnavailable(_) | Self::StreamFailure(_))
    }

    /// Short classification string for logging.
    pub fn error_kind(&self) -> &'static str {
        match self {
            Self::BackendUnavailable(_) => "backend_unavailable",
            Self::AuthRejected(_) => "auth_rejected",
            Self::StreamFailure(_) => "stream_failure",
            Self::Validation(_) => "validation",
            Self::Storage(_) => "storage",
        }
    }

    /// Classify an HTTP status code into the appropriate error variant.
    pub fn from_status(status: u16, body: String) -> Self {
        match status {
            401 | 403 => Self::AuthRejected(body),
            _ => Self::BackendUnavailable(format!("status {status}: {body}")),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn auth_rejection_forces_session_reset() {
        assert!(ClientError::AuthRejected("expired".into()).requires_session_reset());
        assert!(!ClientError::BackendUnavailable("down".into()).requires_session_reset());
    }

    #[test]
    fn retryable_classification() {
        assert!(ClientError::BackendUnavailable("503".into()).is_retryable());
        assert!(ClientError::StreamFailure("eof".into()).is_retryable());
        assert!(!ClientError::Validation("range".into()).is_retryable());
        assert!(!ClientError::AuthRejected("401".into()).is_retryable());
    }

    #[test]
    fn from_status_mapping() {
        assert!(matches!(
            ClientError::from_status(401, "unauthorized".into()),
            ClientError::AuthRejected(_)
        ));
        assert!(matches!(
            ClientError::from_status(403, "forbidden".into()),
            ClientError::AuthRejected(_)
        ));
        assert!(matches!(
            ClientError::from_status(500, "internal".into()),
            ClientError::BackendUnavailable(_)
        ));
        assert!(matches!(
            ClientError::from_status(404, "missing".into()),
            ClientError::BackendUnavailable(_)
        ));
    }

    #[test]
    fn error_kind_strings() {
        assert_eq!(ClientError::Validation("x".into()).error_kind(), "validation");
        assert_eq!(
            ClientError::AuthRejected("x".into()).error_kind(),
            "auth_rejected"
        );
    }
}
