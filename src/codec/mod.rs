//! HTTP/1.x wire codec.
//!
//! Decoding turns raw socket bytes into a [`Request`](crate::Request);
//! encoding turns a [`Response`](crate::Response) back into bytes. Neither
//! side touches the socket itself.
//!
//! ```text
//! GET /api/products/203?fields=name HTTP/1.1\r\n     ← method, target, protocol
//! Host: shop.example.com\r\n                         ← kept apart from headers
//! Content-Type: application/json\r\n
//! Content-Length: 11\r\n
//! \r\n
//! {"user":1}                                         ← body, form-decoded by type
//! ```

mod body;
mod decode;
mod encode;

pub use body::UploadedFile;
pub use decode::{ParseError, RequestDecoder, parse_request};
pub use encode::encode_response;
