//! WebSocket support: upgrade handshake, frame codec, and the session that
//! turns frames into events.
//!
//! A WebSocket route runs its middleware like any other route. When the chain
//! lets the request through, the server answers `101 Switching Protocols`,
//! hands a [`WebSocket`] to the route handler, and starts the frame loop.

mod frame;
mod handshake;
mod session;

pub use frame::{DEFAULT_MAX_FRAME_SIZE, Frame, FrameError, Opcode, decode};
pub use handshake::{HandshakeError, accept_key, handshake_response, is_upgrade_request};
pub use session::{Event, EventKind, Message, WebSocket};
