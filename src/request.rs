//! Incoming HTTP request type.

use std::collections::HashMap;

use bytes::Bytes;

use crate::codec::UploadedFile;
use crate::headers::Headers;
use crate::method::Method;

/// An incoming HTTP request, decoded from the raw TCP stream.
///
/// Everything except the parameter map is fixed once the codec hands the
/// request over; the router fills [`params`](Request::param) on match and
/// middleware may add more via [`set_param`](Request::set_param).
#[derive(Debug)]
pub struct Request {
    pub(crate) method: Method,
    pub(crate) path: String,
    pub(crate) query: HashMap<String, String>,
    pub(crate) version: String,
    pub(crate) host: String,
    pub(crate) headers: Headers,
    pub(crate) body: Bytes,
    pub(crate) form: HashMap<String, String>,
    pub(crate) files: HashMap<String, UploadedFile>,
    pub(crate) params: HashMap<String, String>,
}

impl Request {
    /// A bare request with no headers or body.
    ///
    /// `path` is trimmed of leading and trailing slashes, like paths the
    /// codec produces.
    pub fn new(method: Method, path: &str) -> Self {
        Self {
            method,
            path: path.trim_matches('/').to_owned(),
            query: HashMap::new(),
            version: "HTTP/1.1".to_owned(),
            host: String::new(),
            headers: Headers::new(),
            body: Bytes::new(),
            form: HashMap::new(),
            files: HashMap::new(),
            params: HashMap::new(),
        }
    }

    pub fn method(&self) -> Method { self.method }

    /// Request path without surrounding slashes: `/api/users/` is `api/users`.
    pub fn path(&self) -> &str { &self.path }

    /// Protocol token from the request line, e.g. `HTTP/1.1`.
    pub fn version(&self) -> &str { &self.version }

    /// Value of the `Host` header, port included when the client sent one.
    pub fn host(&self) -> &str { &self.host }

    /// Headers other than `Host`.
    pub fn headers(&self) -> &Headers { &self.headers }

    pub fn body(&self) -> &[u8] { &self.body }

    /// Case-insensitive header lookup.
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name)
    }

    /// Returns a named path or subdomain parameter.
    ///
    /// For a route `users/{id}`, `req.param("id")` on `/users/42` returns `Some("42")`.
    pub fn param(&self, key: &str) -> Option<&str> {
        self.params.get(key).map(String::as_str)
    }

    pub fn params(&self) -> &HashMap<String, String> { &self.params }

    pub fn set_param(&mut self, key: impl Into<String>, value: impl Into<String>) {
        self.params.insert(key.into(), value.into());
    }

    /// Percent-decoded query string parameter.
    pub fn query(&self, key: &str) -> Option<&str> {
        self.query.get(key).map(String::as_str)
    }

    /// Form field from an urlencoded, multipart, or JSON body.
    ///
    /// JSON bodies are flattened: `{"user":{"name":"a"}}` is `user[name]`.
    pub fn form(&self, key: &str) -> Option<&str> {
        self.form.get(key).map(String::as_str)
    }

    pub fn form_fields(&self) -> &HashMap<String, String> { &self.form }

    /// Uploaded file from a multipart body.
    pub fn file(&self, field: &str) -> Option<&UploadedFile> {
        self.files.get(field)
    }

    /// Adds a header. `Host` sets [`host`](Self::host) instead, as the
    /// decoder does.
    pub fn with_header(mut self, name: &str, value: &str) -> Self {
        if name.eq_ignore_ascii_case("host") {
            self.host = value.to_owned();
        } else {
            self.headers.append(name, value);
        }
        self
    }
}
