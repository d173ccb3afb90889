//! HTTP/1.1 upgrade handshake.

use base64::Engine;
use base64::engine::general_purpose::STANDARD;
use sha1::{Digest, Sha1};

use crate::request::Request;
use crate::response::Response;
use crate::status::Status;

const WS_GUID: &str = "258EAFA5-E914-47DA-95CA-C5AB0DC85B11";

#[derive(Debug, thiserror::Error)]
pub enum HandshakeError {
    #[error("not a websocket upgrade request")]
    NotUpgrade,

    #[error("missing Sec-WebSocket-Key")]
    MissingKey,

    #[error("unsupported websocket version `{0}`")]
    UnsupportedVersion(String),
}

/// True when the request asks for `Connection: Upgrade` to `websocket`.
/// Both checks are case-insensitive and tolerate token lists such as
/// `Connection: keep-alive, Upgrade`.
pub fn is_upgrade_request(req: &Request) -> bool {
    req.headers().has_token("connection", "upgrade")
        && req.headers().has_token("upgrade", "websocket")
}

/// `base64(SHA-1(key + GUID))`, the `Sec-WebSocket-Accept` value.
pub fn accept_key(client_key: &str) -> String {
    let mut sha = Sha1::new();
    sha.update(client_key.trim().as_bytes());
    sha.update(WS_GUID.as_bytes());
    STANDARD.encode(sha.finalize())
}

/// Builds the `101 Switching Protocols` answer to an upgrade request.
pub fn handshake_response(req: &Request) -> Result<Response, HandshakeError> {
    if !is_upgrade_request(req) {
        return Err(HandshakeError::NotUpgrade);
    }
    if let Some(version) = req.header("sec-websocket-version") {
        if version.trim() != "13" {
            return Err(HandshakeError::UnsupportedVersion(version.to_owned()));
        }
    }
    let key = req
        .header("sec-websocket-key")
        .filter(|key| !key.trim().is_empty())
        .ok_or(HandshakeError::MissingKey)?;

    Ok(Response::for_request(req)
        .with_status(Status::SwitchingProtocols)
        .with_header("Connection", "Upgrade")
        .with_header("Upgrade", "websocket")
        .with_header("Sec-WebSocket-Accept", &accept_key(key)))
}
