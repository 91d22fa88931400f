use secrecy::SecretString;

use crate::ids::{ConversationId, SessionId};

/// Backend session credentials: an opaque session id plus the bearer token
/// attached to every authenticated call. Created once and persisted;
/// invalidated only by an explicit reset or an auth rejection.
#[derive(Clone, Debug)]
pub struct Session {
    pub id: SessionId,
    pub token: SecretString,
}

impl Session {
    pub fn new(id: SessionId, token: impl Into<String>) -> Self {
        Self {
            id,
            token: SecretString::from(token.into()),
        }
    }
}

/// The conversation the controller currently targets for new messages.
#[derive(Clone, Debug)]
pub struct Conversation {
    pub id: ConversationId,
    pub source_url: String,
    pub source_title: String,
    pub content_hash: String,
}

#[cfg(test)]
mod tests {
    use super::*;
    use secrecy::ExposeSecret;

    #[test]
    fn session_wraps_token() {
        let s = Session::new(SessionId::from_raw("sess_1"), "tok_abc");
        assert_eq!(s.id.as_str(), "sess_1");
        assert_eq!(s.token.expose_secret(), "tok_abc");
    }

    #[test]
    fn token_is_redacted_in_debug_output() {
        let s = Session::new(SessionId::new(), "tok_secret");
        let dbg = format!("{s:?}");
        assert!(!dbg.contains("tok_secret"));
    }
}
