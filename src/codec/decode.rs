use bytes::{Buf, Bytes, BytesMut};

use super::body::{decode_body, parse_urlencoded};
use crate::headers::Headers;
use crate::method::Method;
use crate::request::Request;

const HEAD_END: &[u8] = b"\r\n\r\n";

/// Why a byte stream could not be turned into a request.
#[derive(Debug, thiserror::Error)]
pub enum ParseError {
    #[error("missing request line")]
    MissingRequestLine,

    #[error("request line has {tokens} tokens, expected 3")]
    RequestLine { tokens: usize },

    #[error("unknown method `{0}`")]
    UnknownMethod(String),

    #[error("header line without a colon: `{0}`")]
    MalformedHeader(String),

    #[error("invalid content-length")]
    InvalidContentLength,

    #[error("request exceeds {limit} bytes")]
    TooLarge { limit: usize },

    #[error("request head is not valid UTF-8")]
    NotUtf8,
}

/// Parses one complete HTTP message held in `raw`.
///
/// Everything after the first blank line is the body, minus a single trailing
/// CRLF. Use [`RequestDecoder`] when bytes arrive in pieces.
pub fn parse_request(raw: &[u8]) -> Result<Request, ParseError> {
    let (head, body) = match find(raw, HEAD_END) {
        Some(pos) => (&raw[..pos], &raw[pos + HEAD_END.len()..]),
        None => (raw, &[][..]),
    };
    let body = body.strip_suffix(b"\r\n").unwrap_or(body);
    let head = Head::parse(head)?;
    Ok(head.into_request(Bytes::copy_from_slice(body)))
}

// ── Incremental decoding ──────────────────────────────────────────────────────

/// Accumulates socket reads until a whole request is buffered.
///
/// A request is complete once the blank line ending the head has arrived and
/// `Content-Length` body bytes follow it. Without a `Content-Length`, the
/// bytes that arrived together with the head are taken as the body.
pub struct RequestDecoder {
    buf: BytesMut,
    limit: usize,
    /// Bytes of `buf` already searched for the end of the head.
    scanned: usize,
    /// Head of the request whose body is still arriving.
    pending: Option<PendingHead>,
}

struct PendingHead {
    head: Head,
    body_start: usize,
    content_length: Option<usize>,
}

impl RequestDecoder {
    pub fn new(limit: usize) -> Self {
        Self { buf: BytesMut::new(), limit, scanned: 0, pending: None }
    }

    /// Appends `chunk` and returns the request once it is complete.
    ///
    /// Bytes past the end of the request stay buffered; see
    /// [`into_remaining`](Self::into_remaining).
    pub fn feed(&mut self, chunk: &[u8]) -> Result<Option<Request>, ParseError> {
        self.buf.extend_from_slice(chunk);

        let pending = match self.pending.take() {
            Some(pending) => pending,
            None => match self.scan_head()? {
                Some(pending) => pending,
                None if self.buf.len() > self.limit => {
                    return Err(ParseError::TooLarge { limit: self.limit });
                }
                None => return Ok(None),
            },
        };
        let PendingHead { head, body_start, content_length } = pending;

        let body = match content_length {
            Some(len) => {
                let total = body_start.saturating_add(len);
                if total > self.limit {
                    return Err(ParseError::TooLarge { limit: self.limit });
                }
                if self.buf.len() < total {
                    self.pending = Some(PendingHead { head, body_start, content_length });
                    return Ok(None);
                }
                let mut message = self.buf.split_to(total);
                message.split_off(body_start).freeze()
            }
            // An upgrade request has no body of its own; whatever follows it
            // belongs to the new protocol.
            None if head.headers.contains("upgrade") => {
                self.buf.advance(body_start);
                Bytes::new()
            }
            None => {
                let message = self.buf.split().freeze();
                let body = message.slice(body_start..);
                match body.strip_suffix(b"\r\n") {
                    Some(trimmed) => body.slice(..trimmed.len()),
                    None => body,
                }
            }
        };

        self.scanned = 0;
        Ok(Some(head.into_request(body)))
    }

    /// Looks for the blank line ending the head, resuming where the last
    /// search stopped, and parses the head once it is found.
    fn scan_head(&mut self) -> Result<Option<PendingHead>, ParseError> {
        let from = self.scanned.saturating_sub(HEAD_END.len() - 1);
        let Some(pos) = find(&self.buf[from..], HEAD_END) else {
            self.scanned = self.buf.len();
            return Ok(None);
        };
        let head_len = from + pos;
        let head = Head::parse(&self.buf[..head_len])?;
        let content_length = head.content_length()?;
        Ok(Some(PendingHead { head, body_start: head_len + HEAD_END.len(), content_length }))
    }

    /// Bytes received after the last decoded request, e.g. WebSocket frames
    /// a client sent right behind its upgrade request.
    pub fn into_remaining(self) -> BytesMut {
        self.buf
    }
}

// ── Head ──────────────────────────────────────────────────────────────────────

/// Request line plus header block, before the body is attached.
struct Head {
    method: Method,
    target: String,
    version: String,
    host: String,
    headers: Headers,
}

impl Head {
    fn parse(raw: &[u8]) -> Result<Self, ParseError> {
        let text = std::str::from_utf8(raw).map_err(|_| ParseError::NotUtf8)?;
        let mut lines = text.split("\r\n");

        let request_line = lines
            .next()
            .filter(|l| !l.is_empty())
            .ok_or(ParseError::MissingRequestLine)?;
        let tokens: Vec<&str> = request_line.split(' ').collect();
        let [method, target, version] = tokens[..] else {
            return Err(ParseError::RequestLine { tokens: tokens.len() });
        };
        let method: Method = method.parse()?;

        let mut host = String::new();
        let mut headers = Headers::new();
        for line in lines.take_while(|l| !l.is_empty()) {
            let (key, value) = line
                .split_once(':')
                .filter(|(k, _)| !k.trim().is_empty())
                .ok_or_else(|| ParseError::MalformedHeader(line.to_owned()))?;
            let (key, value) = (key.trim(), value.trim());
            if key.eq_ignore_ascii_case("host") {
                host = value.to_owned();
            } else {
                headers.append(key, value);
            }
        }

        Ok(Self {
            method,
            target: target.to_owned(),
            version: version.to_owned(),
            host,
            headers,
        })
    }

    fn content_length(&self) -> Result<Option<usize>, ParseError> {
        self.headers
            .get("content-length")
            .map(|v| v.parse().map_err(|_| ParseError::InvalidContentLength))
            .transpose()
    }

    fn into_request(self, body: Bytes) -> Request {
        let (path, query) = match self.target.split_once('?') {
            Some((path, query)) => (path, parse_urlencoded(query)),
            None => (self.target.as_str(), Default::default()),
        };
        let (form, files) = decode_body(self.headers.get("content-type"), &body);

        Request {
            method: self.method,
            path: path.trim_matches('/').to_owned(),
            query,
            version: self.version,
            host: self.host,
            headers: self.headers,
            body,
            form,
            files,
            params: Default::default(),
        }
    }
}

pub(super) fn find(haystack: &[u8], needle: &[u8]) -> Option<usize> {
    haystack.windows(needle.len()).position(|w| w == needle)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn parses_request_line_headers_and_host() {
        let req = parse_request(
            b"GET /api/products/203?fields=name%20only HTTP/1.1\r\n\
              Host: shop.example.com\r\n\
              Accept:  */*  \r\n\r\n",
        )
        .unwrap();

        assert_eq!(req.method(), Method::Get);
        assert_eq!(req.path(), "api/products/203");
        assert_eq!(req.version(), "HTTP/1.1");
        assert_eq!(req.host(), "shop.example.com");
        assert_eq!(req.header("accept"), Some("*/*"));
        assert!(req.header("host").is_none());
        assert_eq!(req.query("fields"), Some("name only"));
    }

    #[test]
    fn request_line_needs_exactly_three_tokens() {
        for raw in [
            &b"GET /\r\n\r\n"[..],
            &b"GET / HTTP/1.1 extra\r\n\r\n"[..],
            &b"GET  / HTTP/1.1\r\n\r\n"[..],
        ] {
            assert!(matches!(parse_request(raw), Err(ParseError::RequestLine { .. })));
        }
    }

    #[test]
    fn header_without_colon_is_fatal() {
        let err = parse_request(b"GET / HTTP/1.1\r\nbroken header\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::MalformedHeader(line) if line == "broken header"));
    }

    #[test]
    fn body_loses_one_trailing_crlf() {
        let req = parse_request(b"POST /echo HTTP/1.1\r\n\r\nhello\r\n").unwrap();
        assert_eq!(req.body(), b"hello");
    }

    #[test]
    fn json_body_is_flattened_into_form() {
        let req = parse_request(
            b"POST /users HTTP/1.1\r\nContent-Type: application/json\r\n\r\n{\"user\":1}",
        )
        .unwrap();
        assert_eq!(req.form("user"), Some("1"));
    }

    #[test]
    fn decoder_waits_for_the_full_body() {
        let mut decoder = RequestDecoder::new(1024);
        let head = b"POST /form HTTP/1.1\r\nContent-Type: application/x-www-form-urlencoded\r\nContent-Length: 7\r\n\r\n";

        assert!(decoder.feed(&head[..20]).unwrap().is_none());
        assert!(decoder.feed(&head[20..]).unwrap().is_none());
        assert!(decoder.feed(b"a=1").unwrap().is_none());

        let req = decoder.feed(b"&b=2").unwrap().unwrap();
        assert_eq!(req.body(), b"a=1&b=2");
        assert_eq!(req.form("a"), Some("1"));
        assert_eq!(req.form("b"), Some("2"));
    }

    #[test]
    fn decoder_finds_a_blank_line_split_across_chunks() {
        let mut decoder = RequestDecoder::new(1024);
        let raw = b"POST /a HTTP/1.1\r\nContent-Length: 2\r\n\r\nok";

        for byte in &raw[..raw.len() - 1] {
            assert!(decoder.feed(std::slice::from_ref(byte)).unwrap().is_none());
        }
        let req = decoder.feed(b"k").unwrap().unwrap();
        assert_eq!(req.path(), "a");
        assert_eq!(req.body(), b"ok");
    }

    #[test]
    fn decoder_keeps_bytes_after_the_request() {
        let mut decoder = RequestDecoder::new(1024);
        let req = decoder
            .feed(b"GET /ws HTTP/1.1\r\nContent-Length: 0\r\n\r\n\x81\x00")
            .unwrap()
            .unwrap();
        assert_eq!(req.path(), "ws");
        assert_eq!(&decoder.into_remaining()[..], b"\x81\x00");
    }

    #[test]
    fn upgrade_request_without_length_leaves_frames_buffered() {
        let mut decoder = RequestDecoder::new(1024);
        let req = decoder
            .feed(b"GET /ws HTTP/1.1\r\nUpgrade: websocket\r\nConnection: Upgrade\r\n\r\n\x89\x00")
            .unwrap()
            .unwrap();
        assert!(req.body().is_empty());
        assert_eq!(&decoder.into_remaining()[..], b"\x89\x00");
    }

    #[test]
    fn decoder_enforces_its_limit() {
        let mut decoder = RequestDecoder::new(64);
        let err = decoder
            .feed(b"POST / HTTP/1.1\r\nContent-Length: 4096\r\n\r\n")
            .unwrap_err();
        assert!(matches!(err, ParseError::TooLarge { limit: 64 }));

        let mut decoder = RequestDecoder::new(16);
        assert!(decoder.feed(b"GET /a-very-long-path-without-end").is_err());
    }

    #[test]
    fn unknown_method_is_reported() {
        let err = parse_request(b"BREW /pot HTTP/1.1\r\n\r\n").unwrap_err();
        assert!(matches!(err, ParseError::UnknownMethod(m) if m == "BREW"));
    }
}
