//! Unified error type.

use crate::codec::ParseError;
use crate::view::RenderError;
use crate::websocket::{FrameError, HandshakeError};

/// The error type returned by tether's fallible operations.
///
/// Application-level failures (404, 422, etc.) are expressed as HTTP
/// [`Response`](crate::Response) values, not as `Error`s. This type surfaces
/// infrastructure failures: binding, socket I/O, and protocol violations
/// from the peer.
#[derive(Debug, thiserror::Error)]
pub enum Error {
    #[error("io: {0}")]
    Io(#[from] std::io::Error),

    #[error("parse: {0}")]
    Parse(#[from] ParseError),

    #[error("frame: {0}")]
    Frame(#[from] FrameError),

    #[error("handshake: {0}")]
    Handshake(#[from] HandshakeError),

    #[error("view: {0}")]
    View(#[from] RenderError),

    /// The connection was closed locally or by the peer.
    #[error("connection closed")]
    ConnectionClosed,
}
