//! Server limits.
//!
//! Every field has a default, so a partial document deserializes cleanly:
//!
//! ```rust
//! let cfg: tether::ServerConfig = serde_json::from_str(r#"{"max_chunk_size": 8192}"#).unwrap();
//! assert_eq!(cfg.max_chunk_size, 8192);
//! assert_eq!(cfg.subdomain_offset, 2);
//! ```

use serde::{Deserialize, Serialize};

use crate::router::DEFAULT_SUBDOMAIN_OFFSET;
use crate::websocket::DEFAULT_MAX_FRAME_SIZE;

#[derive(Debug, Clone, Deserialize, Serialize)]
#[serde(default)]
pub struct ServerConfig {
    /// Largest single socket read, in bytes.
    pub max_chunk_size: usize,

    /// Largest request (head plus body) buffered before answering
    /// `413 Content Too Large`.
    pub max_request_size: usize,

    /// Largest WebSocket frame payload. A bigger frame ends the session.
    pub max_frame_size: usize,

    /// Trailing host labels that form the site's own domain. `2` treats
    /// `tracker.com` as the domain and `grpc` in `grpc.tracker.com` as the
    /// subdomain.
    pub subdomain_offset: usize,
}

impl Default for ServerConfig {
    fn default() -> Self {
        Self {
            max_chunk_size: 4096,
            max_request_size: 1024 * 1024,
            max_frame_size: DEFAULT_MAX_FRAME_SIZE,
            subdomain_offset: DEFAULT_SUBDOMAIN_OFFSET,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn missing_fields_take_defaults() {
        let cfg: ServerConfig = serde_json::from_str(r#"{"subdomain_offset": 3}"#).unwrap();
        assert_eq!(cfg.subdomain_offset, 3);
        assert_eq!(cfg.max_chunk_size, 4096);
        assert_eq!(cfg.max_request_size, 1 << 20);
        assert_eq!(cfg.max_frame_size, 16 << 20);
    }
}
