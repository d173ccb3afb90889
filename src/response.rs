//! Outgoing HTTP response type and the [`IntoResponse`] conversion trait.
//!
//! Every route handler receives a fresh [`Response`] (status `200`, no body,
//! same protocol version as the request) along with the [`Request`]. Mutate
//! it, replace it, or return something that converts into one.

use crate::headers::Headers;
use crate::request::Request;
use crate::status::{Status, reason_phrase};

// ── ContentType ───────────────────────────────────────────────────────────────

/// Common content-type values for use with [`ResponseBuilder::bytes`].
#[derive(Clone, Copy, Debug)]
pub enum ContentType {
    Csv,          // text/csv
    EventStream,  // text/event-stream  (SSE)
    FormData,     // application/x-www-form-urlencoded
    Html,         // text/html; charset=utf-8
    Json,         // application/json
    OctetStream,  // application/octet-stream  (binary / file download)
    Text,         // text/plain; charset=utf-8
    Xml,          // application/xml
}

impl ContentType {
    pub fn as_str(self) -> &'static str {
        match self {
            Self::Csv         => "text/csv",
            Self::EventStream => "text/event-stream",
            Self::FormData    => "application/x-www-form-urlencoded",
            Self::Html        => "text/html; charset=utf-8",
            Self::Json        => "application/json",
            Self::OctetStream => "application/octet-stream",
            Self::Text        => "text/plain; charset=utf-8",
            Self::Xml         => "application/xml",
        }
    }
}

// ── Bag ───────────────────────────────────────────────────────────────────────

/// Side annotations that travel with a response but are not wire data.
///
/// The codec ignores the bag entirely. A view annotation is resolved by the
/// server's [`ViewRenderer`](crate::ViewRenderer) before serialization.
#[derive(Debug, Default)]
pub struct Bag {
    pub redirect: Option<String>,
    pub view: Option<View>,
    /// Set by the WebSocket terminal link; carries the request past the
    /// middleware chain so the server can finish the upgrade.
    pub(crate) upgrade: Option<Box<Request>>,
}

/// A named template plus the data to render it with.
#[derive(Clone, Debug)]
pub struct View {
    pub name: String,
    pub data: serde_json::Value,
}

// ── Response ─────────────────────────────────────────────────────────────────

/// An outgoing HTTP response.
///
/// # Shortcuts
///
/// ```rust
/// use tether::{Response, Status};
///
/// Response::json(br#"{"id":1}"#.to_vec());
/// Response::text("hello");
/// Response::status(Status::NoContent);
/// Response::redirect("/login");
/// ```
///
/// # Modifying the response a handler was given
///
/// ```rust
/// use tether::{ContentType, Request, Response, Status};
///
/// async fn create(_req: Request, res: Response) -> Response {
///     res.with_status(Status::Created)
///         .with_header("location", "/users/42")
///         .with_body(ContentType::Json, br#"{"id":42}"#.to_vec())
/// }
/// ```
#[derive(Debug)]
pub struct Response {
    pub(crate) version: String,
    pub(crate) status: u16,
    pub(crate) headers: Headers,
    pub(crate) body: Vec<u8>,
    pub(crate) bag: Bag,
}

impl Response {
    /// `200 OK`, no headers, no body.
    pub fn new() -> Self {
        Self {
            version: "HTTP/1.1".to_owned(),
            status: Status::Ok.code(),
            headers: Headers::new(),
            body: Vec::new(),
            bag: Bag::default(),
        }
    }

    /// `200 OK`, `application/json`.
    pub fn json(body: Vec<u8>) -> Self {
        Self::new().with_body(ContentType::Json, body)
    }

    /// `200 OK`, `text/plain; charset=utf-8`.
    pub fn text(body: impl Into<String>) -> Self {
        Self::new().with_body(ContentType::Text, body.into().into_bytes())
    }

    /// `200 OK`, `text/html; charset=utf-8`.
    pub fn html(body: impl Into<String>) -> Self {
        Self::new().with_body(ContentType::Html, body.into().into_bytes())
    }

    /// Response with no body.
    pub fn status(code: Status) -> Self {
        Self::new().with_status(code)
    }

    /// `302 Found` pointing at `location`, recorded in the bag as well.
    pub fn redirect(location: &str) -> Self {
        let mut res = Self::new()
            .with_status(Status::Found)
            .with_header("location", location);
        res.bag.redirect = Some(location.to_owned());
        res
    }

    /// `200 OK` whose body is produced by the server's view renderer.
    pub fn view(name: &str, data: serde_json::Value) -> Self {
        let mut res = Self::new();
        res.bag.view = Some(View { name: name.to_owned(), data });
        res
    }

    /// Builder for responses that need a custom status or extra headers.
    pub fn builder() -> ResponseBuilder {
        ResponseBuilder { headers: Headers::new(), status: Status::Ok.code() }
    }

    pub(crate) fn for_request(req: &Request) -> Self {
        let mut res = Self::new();
        res.version = req.version.clone();
        res
    }

    pub fn with_status(mut self, code: Status) -> Self {
        self.status = code.code();
        self
    }

    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Replaces the body and sets `content-type` accordingly.
    pub fn with_body(mut self, content_type: ContentType, body: Vec<u8>) -> Self {
        self.headers.set("content-type", content_type.as_str());
        self.body = body;
        self
    }

    pub fn status_code(&self) -> u16 { self.status }

    pub fn reason(&self) -> &'static str { reason_phrase(self.status) }

    pub fn version(&self) -> &str { &self.version }

    pub fn headers(&self) -> &Headers { &self.headers }

    pub fn headers_mut(&mut self) -> &mut Headers { &mut self.headers }

    pub fn body(&self) -> &[u8] { &self.body }

    pub fn bag(&self) -> &Bag { &self.bag }

    pub fn bag_mut(&mut self) -> &mut Bag { &mut self.bag }
}

impl Default for Response {
    fn default() -> Self { Self::new() }
}

// ── ResponseBuilder ───────────────────────────────────────────────────────────

/// Fluent builder for [`Response`].
///
/// Obtain via [`Response::builder()`]. Defaults to `Status::Ok` (200).
/// Terminated by a typed body method.
pub struct ResponseBuilder {
    headers: Headers,
    status: u16,
}

impl ResponseBuilder {
    pub fn status(mut self, code: Status) -> Self {
        self.status = code.code();
        self
    }

    pub fn header(mut self, name: &str, value: &str) -> Self {
        self.headers.append(name, value);
        self
    }

    /// Terminate with a JSON body (`application/json`).
    pub fn json(self, body: Vec<u8>) -> Response {
        self.bytes(ContentType::Json, body)
    }

    /// Terminate with a plain-text body (`text/plain; charset=utf-8`).
    pub fn text(self, body: impl Into<String>) -> Response {
        self.bytes(ContentType::Text, body.into().into_bytes())
    }

    /// Terminate with a typed body. Use this for XML, HTML, binary, SSE, etc.
    pub fn bytes(self, content_type: ContentType, body: Vec<u8>) -> Response {
        self.no_body().with_body(content_type, body)
    }

    /// Terminate with no body (e.g. `Status::NoContent`, `Status::SwitchingProtocols`).
    pub fn no_body(self) -> Response {
        Response { headers: self.headers, status: self.status, ..Response::new() }
    }
}

// ── IntoResponse ──────────────────────────────────────────────────────────────

/// Conversion into an HTTP [`Response`].
///
/// Implement on your own types to return them directly from handlers.
pub trait IntoResponse {
    fn into_response(self) -> Response;
}

impl IntoResponse for Response {
    fn into_response(self) -> Response { self }
}

impl IntoResponse for &'static str {
    fn into_response(self) -> Response { Response::text(self) }
}

impl IntoResponse for String {
    fn into_response(self) -> Response { Response::text(self) }
}

/// Return a [`Status`] directly from a handler: `return Status::NotFound`
impl IntoResponse for Status {
    fn into_response(self) -> Response { Response::status(self) }
}

impl<T: IntoResponse> IntoResponse for (Status, T) {
    fn into_response(self) -> Response { self.1.into_response().with_status(self.0) }
}
