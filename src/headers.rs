//! Case-insensitive header multimap.
//!
//! Names are matched ignoring ASCII case and stored in canonical form: the
//! first letter of every `-`-separated word is uppercased and the rest
//! lowercased. `CONTENT-type` becomes `Content-Type`; the `websocket` word is
//! spelled `WebSocket`, so `sec-websocket-accept` becomes
//! `Sec-WebSocket-Accept`.

/// An ordered list of `(name, value)` pairs. A name may repeat.
#[derive(Clone, Debug, Default, PartialEq, Eq)]
pub struct Headers {
    entries: Vec<(String, String)>,
}

impl Headers {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends a value, keeping any existing values for `name`.
    pub fn append(&mut self, name: &str, value: impl Into<String>) {
        self.entries.push((canonical_name(name), value.into()));
    }

    /// Replaces every value for `name` with `value`.
    pub fn set(&mut self, name: &str, value: impl Into<String>) {
        self.remove(name);
        self.append(name, value);
    }

    /// First value for `name`.
    pub fn get(&self, name: &str) -> Option<&str> {
        self.entries
            .iter()
            .find(|(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    /// Every value for `name`, in insertion order.
    pub fn get_all<'a>(&'a self, name: &'a str) -> impl Iterator<Item = &'a str> + 'a {
        self.entries
            .iter()
            .filter(move |(k, _)| k.eq_ignore_ascii_case(name))
            .map(|(_, v)| v.as_str())
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// True when any comma-separated token of any `name` value equals `token`,
    /// ignoring case. `Connection: keep-alive, Upgrade` contains `upgrade`.
    pub fn has_token(&self, name: &str, token: &str) -> bool {
        self.get_all(name)
            .flat_map(|v| v.split(','))
            .any(|t| t.trim().eq_ignore_ascii_case(token))
    }

    pub fn remove(&mut self, name: &str) {
        self.entries.retain(|(k, _)| !k.eq_ignore_ascii_case(name));
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = (&str, &str)> {
        self.entries.iter().map(|(k, v)| (k.as_str(), v.as_str()))
    }

    /// Entries ordered by name, case-insensitively. Values of a repeated
    /// name keep their insertion order.
    pub fn sorted(&self) -> Vec<(&str, &str)> {
        let mut out: Vec<_> = self.iter().collect();
        out.sort_by_key(|(k, _)| k.to_ascii_lowercase());
        out
    }
}

impl<'a> IntoIterator for &'a Headers {
    type Item = (&'a str, &'a str);
    type IntoIter = Box<dyn Iterator<Item = (&'a str, &'a str)> + 'a>;

    fn into_iter(self) -> Self::IntoIter {
        Box::new(self.iter())
    }
}

/// Words whose canonical form is not plain first-letter capitalization.
const SPECIAL_WORDS: &[&str] = &["WebSocket"];

/// Capitalizes each `-`-separated word: `x-TRACE-id` becomes `X-Trace-Id`.
/// `websocket` is written `WebSocket`, as in the handshake headers.
pub fn canonical_name(name: &str) -> String {
    let mut out = String::with_capacity(name.len());
    for (i, word) in name.trim().split('-').enumerate() {
        if i > 0 {
            out.push('-');
        }
        if let Some(special) = SPECIAL_WORDS.iter().find(|w| w.eq_ignore_ascii_case(word)) {
            out.push_str(special);
            continue;
        }
        let mut chars = word.chars();
        if let Some(first) = chars.next() {
            out.push(first.to_ascii_uppercase());
            out.extend(chars.map(|c| c.to_ascii_lowercase()));
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn canonicalizes_names() {
        assert_eq!(canonical_name("content-type"), "Content-Type");
        assert_eq!(canonical_name("x-request-id"), "X-Request-Id");
        assert_eq!(canonical_name("X-TRACE-ID"), "X-Trace-Id");
        assert_eq!(canonical_name("CONTENT-length"), "Content-Length");
        assert_eq!(canonical_name("Sec-WebSocket-Accept"), "Sec-WebSocket-Accept");
        assert_eq!(canonical_name("sec-websocket-key"), "Sec-WebSocket-Key");
    }

    #[test]
    fn lookup_ignores_case() {
        let mut h = Headers::new();
        h.append("Content-Type", "text/plain");
        assert_eq!(h.get("content-type"), Some("text/plain"));
        assert_eq!(h.get("CONTENT-TYPE"), Some("text/plain"));
    }

    #[test]
    fn multimap_keeps_every_value() {
        let mut h = Headers::new();
        h.append("set-cookie", "a=1");
        h.append("Set-Cookie", "b=2");
        assert_eq!(h.get_all("set-cookie").collect::<Vec<_>>(), ["a=1", "b=2"]);

        h.set("set-cookie", "c=3");
        assert_eq!(h.get_all("set-cookie").collect::<Vec<_>>(), ["c=3"]);
    }

    #[test]
    fn sorted_orders_by_name() {
        let mut h = Headers::new();
        h.append("x-b", "2");
        h.append("Accept", "*/*");
        h.append("x-a", "1");
        let names: Vec<_> = h.sorted().into_iter().map(|(k, _)| k).collect();
        assert_eq!(names, ["Accept", "X-A", "X-B"]);
    }

    #[test]
    fn token_lists_are_split_on_commas() {
        let mut h = Headers::new();
        h.append("connection", "keep-alive, Upgrade");
        assert!(h.has_token("Connection", "upgrade"));
        assert!(!h.has_token("Connection", "close"));
    }
}
