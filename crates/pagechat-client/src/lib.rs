//! Backend client: session/conversation HTTP calls, the content hash, and
//! reconstruction of streamed assistant replies.

pub mod api;
pub mod assembler;
pub mod hash;
pub mod runner;
pub mod session;
pub mod socket;

pub mod mock;

pub use api::{Backend, BackendApi, HealthReport};
pub use assembler::{TurnAssembler, TurnEffect};
pub use hash::content_hash;
pub use runner::TurnRunner;
pub use session::SessionClient;
pub use socket::{FrameStream, SocketOpener, WsSocketOpener};
