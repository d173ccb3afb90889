//! # tether
//!
//! A small HTTP/1.x and WebSocket server written directly on tokio sockets.
//! No hyper, no http crate: the wire format is parsed and written here.
//!
//! ## The contract
//!
//! One connection carries one request. tether reads until the request is
//! complete, routes it, writes the response, and closes. The exception is a
//! WebSocket upgrade, which keeps the socket open as a [`WebSocket`] session.
//!
//! What tether does:
//!
//! - Incremental request decoding: a request split across reads is
//!   reassembled before it is routed
//! - Ordered routing with `{name}` parameters, `*` wildcards, groups, and
//!   subdomain patterns
//! - Middleware chains that may call the next link or answer themselves
//! - RFC 6455 WebSocket frames with callback-style events
//! - Graceful shutdown: SIGTERM / Ctrl-C, drains in-flight connections
//!
//! What it leaves to a proxy in front of it: TLS, keep-alive, HTTP/2, rate
//! limiting, chunked request bodies.
//!
//! ## Quick start
//!
//! ```rust,no_run
//! use tether::{Request, Response, Router, Server, Status, WebSocket, Message};
//!
//! #[tokio::main]
//! async fn main() -> Result<(), tether::Error> {
//!     let app = Router::new()
//!         .get("api/products/{id}", show_product)
//!         .post("api/products", create_product)
//!         .ws("chat", chat);
//!
//!     Server::bind("0.0.0.0:3000").await?.serve(app).await
//! }
//!
//! async fn show_product(req: Request, res: Response) -> Response {
//!     let id = req.param("id").unwrap_or("unknown");
//!     res.with_body(tether::ContentType::Json, format!(r#"{{"id":"{id}"}}"#).into_bytes())
//! }
//!
//! async fn create_product(req: Request, _res: Response) -> Response {
//!     match req.form("name") {
//!         Some(_) => Response::status(Status::Created),
//!         None => Response::status(Status::UnprocessableContent),
//!     }
//! }
//!
//! fn chat(_req: Request, ws: WebSocket) {
//!     ws.on_message(|ws, msg| async move {
//!         if let Message::Text(text) = msg {
//!             let _ = ws.send_text(text).await;
//!         }
//!     });
//! }
//! ```

mod config;
mod error;
mod handler;
mod headers;
mod method;
mod request;
mod response;
mod router;
mod server;
mod status;
mod view;

pub mod codec;
pub mod connection;
pub mod middleware;
pub mod websocket;

pub use codec::UploadedFile;
pub use config::ServerConfig;
pub use error::Error;
pub use handler::Handler;
pub use headers::Headers;
pub use method::Method;
pub use request::Request;
pub use response::{Bag, ContentType, IntoResponse, Response, ResponseBuilder, View};
pub use router::{Route, RouteMatch, Router, Routes};
pub use server::Server;
pub use status::Status;
pub use view::{RenderError, ViewRenderer};
pub use websocket::{Message, WebSocket};
