use crate::response::Response;

/// Serializes `res` into wire bytes.
///
/// Headers are written sorted by name. `Content-Length` is always computed
/// from the body and written last, replacing any value a handler set, even
/// when the body is empty.
pub fn encode_response(res: &Response) -> Vec<u8> {
    let mut out = Vec::with_capacity(128 + res.body.len());
    out.extend_from_slice(
        format!("{} {} {}\r\n", res.version, res.status, res.reason()).as_bytes(),
    );
    for (name, value) in res.headers.sorted() {
        if name.eq_ignore_ascii_case("content-length") {
            continue;
        }
        out.extend_from_slice(format!("{name}: {value}\r\n").as_bytes());
    }
    out.extend_from_slice(format!("Content-Length: {}\r\n\r\n", res.body.len()).as_bytes());
    out.extend_from_slice(&res.body);
    out
}
