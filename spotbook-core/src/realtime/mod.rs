//! Realtime Layer
//!
//! Change-feed subscription over the backend's Phoenix channel socket.
//! - protocol: frame encoding and change decoding
//! - transport: the socket abstraction (native, in-memory)
//! - session: channel ownership and the pump into the store

mod protocol;
mod transport;
mod session;
#[cfg(not(target_arch = "wasm32"))]
mod ws;

pub use protocol::{topic_for, ChangeKind, ChangeNotification, Frame, Inbound, HEARTBEAT_INTERVAL, PHOENIX_TOPIC};
pub use transport::{memory_pair, MemoryPeer, MemoryTransport, Transport};
pub use session::RealtimeSession;
#[cfg(not(target_arch = "wasm32"))]
pub use ws::WsTransport;
