//! Content-type driven body decoding into form fields.

use std::collections::HashMap;

use bytes::Bytes;
use percent_encoding::percent_decode_str;
use serde_json::Value;

use super::decode::find;

/// A file part of a `multipart/form-data` body.
#[derive(Clone, Debug)]
pub struct UploadedFile {
    pub filename: String,
    pub content_type: Option<String>,
    pub data: Bytes,
}

type Form = HashMap<String, String>;
type Files = HashMap<String, UploadedFile>;

/// Decodes `body` according to `content_type`. Unknown types yield nothing;
/// the raw bytes stay available on the request.
pub(crate) fn decode_body(content_type: Option<&str>, body: &Bytes) -> (Form, Files) {
    let Some(content_type) = content_type else {
        return Default::default();
    };
    let mut params = content_type.split(';');
    let media_type = params.next().unwrap_or_default().trim().to_ascii_lowercase();

    match media_type.as_str() {
        "application/x-www-form-urlencoded" => {
            (parse_urlencoded(&String::from_utf8_lossy(body)), Files::new())
        }
        "application/json" => (flatten_json(body), Files::new()),
        "multipart/form-data" => {
            let boundary = params.find_map(|p| {
                let (k, v) = p.split_once('=')?;
                k.trim().eq_ignore_ascii_case("boundary").then(|| v.trim().trim_matches('"'))
            });
            match boundary {
                Some(b) if !b.is_empty() => parse_multipart(b, body),
                _ => Default::default(),
            }
        }
        _ => Default::default(),
    }
}

/// `a=1&b=hello+world&c=%2F` → `{a: 1, b: hello world, c: /}`. Later
/// duplicates win.
pub(crate) fn parse_urlencoded(input: &str) -> Form {
    input
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(s: &str) -> String {
    percent_decode_str(&s.replace('+', " "))
        .decode_utf8_lossy()
        .into_owned()
}

// ── JSON ──────────────────────────────────────────────────────────────────────

/// Flattens a JSON document into form keys: nested objects and arrays become
/// `parent[child]` and `parent[0]`. Invalid JSON yields an empty form.
fn flatten_json(body: &[u8]) -> Form {
    let mut form = Form::new();
    if let Ok(value) = serde_json::from_slice::<Value>(body) {
        flatten_into(None, &value, &mut form);
    }
    form
}

fn flatten_into(prefix: Option<&str>, value: &Value, out: &mut Form) {
    let child_key = |key: &str| match prefix {
        Some(p) => format!("{p}[{key}]"),
        None => key.to_owned(),
    };

    match value {
        Value::Object(map) => {
            for (k, v) in map {
                flatten_into(Some(&child_key(k)), v, out);
            }
        }
        Value::Array(items) => {
            for (i, v) in items.iter().enumerate() {
                flatten_into(Some(&child_key(&i.to_string())), v, out);
            }
        }
        scalar => {
            // A bare scalar document has no key to live under.
            let Some(key) = prefix else { return };
            let text = match scalar {
                Value::String(s) => s.clone(),
                Value::Null => String::new(),
                other => other.to_string(),
            };
            out.insert(key.to_owned(), text);
        }
    }
}

// ── Multipart ─────────────────────────────────────────────────────────────────

fn parse_multipart(boundary: &str, body: &Bytes) -> (Form, Files) {
    let delimiter = format!("--{boundary}");
    let delimiter = delimiter.as_bytes();
    let mut form = Form::new();
    let mut files = Files::new();

    let mut rest = match find(body, delimiter) {
        Some(pos) => body.slice(pos + delimiter.len()..),
        None => return (form, files),
    };

    // Each iteration starts right after a delimiter.
    while !rest.starts_with(b"--") {
        let Some(end) = find(&rest, delimiter) else { break };
        let part = rest.slice(..end);
        rest = rest.slice(end + delimiter.len()..);

        let part = part.strip_prefix(b"\r\n").unwrap_or(&part[..]);
        let part = part.strip_suffix(b"\r\n").unwrap_or(part);
        let Some(split) = find(part, b"\r\n\r\n") else { continue };
        let Ok(head) = std::str::from_utf8(&part[..split]) else { continue };
        let data = &part[split + 4..];

        let mut name = None;
        let mut filename = None;
        let mut content_type = None;
        for line in head.split("\r\n") {
            let Some((key, value)) = line.split_once(':') else { continue };
            if key.trim().eq_ignore_ascii_case("content-disposition") {
                for param in value.split(';').skip(1) {
                    match param.split_once('=') {
                        Some((k, v)) if k.trim() == "name" => {
                            name = Some(v.trim().trim_matches('"').to_owned());
                        }
                        Some((k, v)) if k.trim() == "filename" => {
                            filename = Some(v.trim().trim_matches('"').to_owned());
                        }
                        _ => {}
                    }
                }
            } else if key.trim().eq_ignore_ascii_case("content-type") {
                content_type = Some(value.trim().to_owned());
            }
        }

        let Some(name) = name else { continue };
        match filename {
            Some(filename) => {
                files.insert(name, UploadedFile {
                    filename,
                    content_type,
                    data: Bytes::copy_from_slice(data),
                });
            }
            None => {
                form.insert(name, String::from_utf8_lossy(data).into_owned());
            }
        }
    }

    (form, files)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn urlencoded_pairs_are_decoded() {
        let form = parse_urlencoded("a=1&b=hello+world&c=%2Fpath&flag");
        assert_eq!(form["a"], "1");
        assert_eq!(form["b"], "hello world");
        assert_eq!(form["c"], "/path");
        assert_eq!(form["flag"], "");
    }

    #[test]
    fn nested_json_uses_bracket_keys() {
        let body = Bytes::from_static(
            br#"{"user":{"name":"ada","tags":["x","y"],"admin":true,"manager":null}}"#,
        );
        let (form, _) = decode_body(Some("application/json; charset=utf-8"), &body);
        assert_eq!(form["user[name]"], "ada");
        assert_eq!(form["user[tags][0]"], "x");
        assert_eq!(form["user[tags][1]"], "y");
        assert_eq!(form["user[admin]"], "true");
        assert_eq!(form["user[manager]"], "");
    }

    #[test]
    fn invalid_json_leaves_form_empty() {
        let (form, _) = decode_body(Some("application/json"), &Bytes::from_static(b"{oops"));
        assert!(form.is_empty());
    }

    #[test]
    fn multipart_splits_fields_and_files() {
        let body = Bytes::from_static(
            b"--XyZ\r\n\
              Content-Disposition: form-data; name=\"title\"\r\n\r\n\
              hello\r\n\
              --XyZ\r\n\
              Content-Disposition: form-data; name=\"doc\"; filename=\"a.txt\"\r\n\
              Content-Type: text/plain\r\n\r\n\
              file body\r\n\
              --XyZ--\r\n",
        );
        let (form, files) = decode_body(Some("multipart/form-data; boundary=XyZ"), &body);

        assert_eq!(form["title"], "hello");
        let doc = &files["doc"];
        assert_eq!(doc.filename, "a.txt");
        assert_eq!(doc.content_type.as_deref(), Some("text/plain"));
        assert_eq!(&doc.data[..], b"file body");
    }

    #[test]
    fn unknown_content_type_is_left_raw() {
        let (form, files) = decode_body(Some("image/png"), &Bytes::from_static(b"a=1"));
        assert!(form.is_empty() && files.is_empty());
    }
}
