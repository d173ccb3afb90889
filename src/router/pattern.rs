//! Segment patterns shared by path and subdomain matching.

use std::collections::HashMap;

#[derive(Clone, Debug, PartialEq, Eq)]
pub(crate) enum Segment {
    Literal(String),
    /// `{name}` matches any one segment and captures it.
    Param(String),
    /// `*` matches whatever is left, including nothing.
    Wildcard,
}

impl Segment {
    fn parse(raw: &str) -> Self {
        if raw == "*" {
            Self::Wildcard
        } else if let Some(name) = raw.strip_prefix('{').and_then(|r| r.strip_suffix('}')) {
            Self::Param(name.to_owned())
        } else {
            Self::Literal(raw.to_owned())
        }
    }
}

/// A parsed route pattern: `api/products/{id}`, `files/*`, or `{tenant}`.
#[derive(Clone, Debug)]
pub(crate) struct Pattern {
    raw: String,
    segments: Vec<Segment>,
    has_wildcard: bool,
}

impl Pattern {
    /// A `/`-separated path pattern. Surrounding slashes are ignored.
    pub(crate) fn path(raw: &str) -> Self {
        let raw = raw.trim_matches('/');
        Self::from_segments(raw, raw.split('/'))
    }

    /// A `.`-separated subdomain pattern, e.g. `{env}.{company}`.
    pub(crate) fn host(raw: &str) -> Self {
        let raw = raw.trim_matches('.');
        Self::from_segments(raw, raw.split('.'))
    }

    fn from_segments<'a>(raw: &str, parts: impl Iterator<Item = &'a str>) -> Self {
        let segments: Vec<Segment> = parts.map(Segment::parse).collect();
        let has_wildcard = segments.contains(&Segment::Wildcard);
        Self { raw: raw.to_owned(), segments, has_wildcard }
    }

    pub(crate) fn as_str(&self) -> &str {
        &self.raw
    }

    /// Matches `parts` segment by segment, writing captures into `params`
    /// only when the whole pattern matches.
    pub(crate) fn matches(&self, parts: &[&str], params: &mut HashMap<String, String>) -> bool {
        if self.raw == "*" {
            return true;
        }
        if parts.len() != self.segments.len() && !self.has_wildcard {
            return false;
        }

        let mut captured = Vec::new();
        for (i, segment) in self.segments.iter().enumerate() {
            match segment {
                Segment::Wildcard => break,
                Segment::Param(name) => match parts.get(i) {
                    Some(value) => captured.push((name.clone(), (*value).to_owned())),
                    None => return false,
                },
                Segment::Literal(literal) => {
                    if parts.get(i) != Some(&literal.as_str()) {
                        return false;
                    }
                }
            }
        }

        params.extend(captured);
        true
    }
}

/// Joins two path fragments with exactly one slash between them.
pub(crate) fn join(prefix: &str, path: &str) -> String {
    match (prefix.trim_matches('/'), path.trim_matches('/')) {
        ("", path) => path.to_owned(),
        (prefix, "") => prefix.to_owned(),
        (prefix, path) => format!("{prefix}/{path}"),
    }
}

/// Subdomain labels of `host`: everything before the last `offset` labels.
/// The port, if any, is dropped. `grpc.tracker.com` with offset 2 is `[grpc]`.
pub(crate) fn subdomain_labels(host: &str, offset: usize) -> Vec<&str> {
    let host = match host.rsplit_once(':') {
        Some((name, port)) if port.bytes().all(|b| b.is_ascii_digit()) => name,
        _ => host,
    };
    let labels: Vec<&str> = host.split('.').filter(|l| !l.is_empty()).collect();
    let keep = labels.len().saturating_sub(offset);
    labels[..keep].to_vec()
}
