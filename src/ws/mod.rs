//! WebSocket-facing message types and the client session that consumes them

pub mod protocol;
pub mod session;

pub use protocol::{
    decode_server_msg, encode_server_msg, EntityState, PlayerInfo, ProtocolError, ServerMsg,
};
pub use session::{channel, ClientSession, ProcessStats, SessionClosed, SessionSender};
