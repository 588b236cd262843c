//! First-stage wire parsing: split raw request bytes into request line,
//! header block, and body, without touching header or body semantics.
//!
//! Malformed framing never fails here. The request degrades to safe
//! defaults (`GET / HTTP/1.1`) and surfaces later in the pipeline, usually
//! as a not-found or handler error response.

use memchr::memmem;

use crate::request::Method;

/// Output of the wire split. Header block and body are still raw; the
/// request line has been tokenized and defaulted.
#[derive(Debug, Clone, PartialEq)]
pub struct RawRequest {
    pub method: Method,
    /// Request-target before the `?`, undecoded.
    pub path: String,
    /// Raw query string after the `?`, without the `?` itself.
    pub query: String,
    pub protocol: String,
    pub header_block: String,
    pub body: Vec<u8>,
}

impl Default for RawRequest {
    fn default() -> Self {
        RawRequest {
            method: Method::Get,
            path: "/".to_string(),
            query: String::new(),
            protocol: "HTTP/1.1".to_string(),
            header_block: String::new(),
            body: Vec::new(),
        }
    }
}

/// Split raw bytes into request line, header block, and body.
pub fn parse(raw: &[u8]) -> RawRequest {
    if raw.is_empty() {
        return RawRequest::default();
    }

    // First CRLF ends the request line.
    let (line, remainder) = match memmem::find(raw, b"\r\n") {
        Some(i) => (&raw[..i], &raw[i + 2..]),
        None => (raw, &[][..]),
    };

    // First blank line splits headers from the body. Absent terminator
    // means everything left is headers and the body is empty.
    let (header_block, body) = match memmem::find(remainder, b"\r\n\r\n") {
        Some(i) => (&remainder[..i], &remainder[i + 4..]),
        None => (remainder, &[][..]),
    };

    let mut out = RawRequest {
        header_block: String::from_utf8_lossy(header_block).into_owned(),
        body: body.to_vec(),
        ..RawRequest::default()
    };

    // Request line: METHOD SP request-target SP protocol. A missing token
    // or unrecognized method keeps the default tuple.
    let line = String::from_utf8_lossy(line);
    let mut tokens = line.split(' ');
    let (method, target, protocol) = match (tokens.next(), tokens.next(), tokens.next()) {
        (Some(m), Some(t), Some(p)) if !m.is_empty() && !t.is_empty() && !p.is_empty() => {
            match Method::from_bytes(m.as_bytes()) {
                Some(method) => (method, t, p),
                None => return out,
            }
        }
        _ => return out,
    };

    out.method = method;
    out.protocol = protocol.to_string();
    match target.split_once('?') {
        Some((path, query)) => {
            out.path = path.to_string();
            out.query = query.to_string();
        }
        None => out.path = target.to_string(),
    }
    out
}
