pub mod errors;
pub mod ids;
pub mod messages;
pub mod session;
pub mod stream;

pub use errors::ClientError;
pub use ids::{ConversationId, MessageId, SessionId};
pub use messages::{ChatMessage, Role, Transcript};
pub use session::{Conversation, Session};
pub use stream::{StreamFrame, TurnState};
