//! Response builder and wire serializer.
//!
//! A `Response` accumulates status, headers, and a body value, then
//! `finalize` picks an encoding, serializes the body, computes
//! `Content-Length`, and assembles the LF-framed wire bytes.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;

use crate::error::{RavelError, RavelResult};
use crate::sniff;

// ═══════════════════════════════════════════════════════════════
// Status text table
// ═══════════════════════════════════════════════════════════════

/// Reason phrase for a status code, or `None` for codes the engine does
/// not recognize.
pub fn status_text(code: u16) -> Option<&'static str> {
    Some(match code {
        100 => "Continue",
        101 => "Switching Protocols",
        102 => "Processing",
        103 => "Early Hints",
        200 => "OK",
        201 => "Created",
        202 => "Accepted",
        203 => "Non-Authoritative Information",
        204 => "No Content",
        205 => "Reset Content",
        206 => "Partial Content",
        300 => "Multiple Choices",
        301 => "Moved Permanently",
        302 => "Found",
        303 => "See Other",
        304 => "Not Modified",
        307 => "Temporary Redirect",
        308 => "Permanent Redirect",
        400 => "Bad Request",
        401 => "Unauthorized",
        402 => "Payment Required",
        403 => "Forbidden",
        404 => "Not Found",
        405 => "Method Not Allowed",
        406 => "Not Acceptable",
        407 => "Proxy Authentication Required",
        408 => "Request Timeout",
        409 => "Conflict",
        410 => "Gone",
        411 => "Length Required",
        412 => "Precondition Failed",
        413 => "Payload Too Large",
        414 => "URI Too Long",
        415 => "Unsupported Media Type",
        416 => "Range Not Satisfiable",
        417 => "Expectation Failed",
        418 => "I'm a teapot",
        421 => "Misdirected Request",
        422 => "Unprocessable Entity",
        425 => "Too Early",
        426 => "Upgrade Required",
        428 => "Precondition Required",
        429 => "Too Many Requests",
        431 => "Request Header Fields Too Large",
        451 => "Unavailable For Legal Reasons",
        500 => "Internal Server Error",
        501 => "Not Implemented",
        502 => "Bad Gateway",
        503 => "Service Unavailable",
        504 => "Gateway Timeout",
        505 => "HTTP Version Not Supported",
        507 => "Insufficient Storage",
        508 => "Loop Detected",
        511 => "Network Authentication Required",
        _ => return None,
    })
}

// ═══════════════════════════════════════════════════════════════
// Body values and wire encodings
// ═══════════════════════════════════════════════════════════════

/// A response body value, held untyped until finalization.
#[derive(Debug, Clone, PartialEq)]
pub enum Payload {
    Text(String),
    Json(serde_json::Value),
    Bytes(Vec<u8>),
}

/// How the body is written onto the wire.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Encoding {
    Utf8,
    Base64,
    Binary,
}

/// Pick the wire encoding for a final content type.
fn encoding_for(content_type: &str) -> Encoding {
    let ct = content_type.to_ascii_lowercase();
    let ct = ct.split(';').next().unwrap_or("").trim();

    if ct.starts_with("image/")
        || ct.starts_with("video/")
        || ct.starts_with("audio/")
        || ct == "application/pdf"
        || ct == "application/octet-stream"
        || ct == "application/zip"
        || ct.starts_with("application/x-")
    {
        return Encoding::Base64;
    }
    if ct.starts_with("text/")
        || ct == "application/json"
        || ct == "application/xml"
        || ct == "application/javascript"
    {
        return Encoding::Utf8;
    }
    Encoding::Binary
}

/// Infer a content type from the body value, used when none is set.
fn infer_content_type(body: &Payload) -> &'static str {
    match body {
        Payload::Json(serde_json::Value::Object(_)) | Payload::Json(serde_json::Value::Array(_)) => {
            "application/json"
        }
        // Scalars (null, numbers, booleans, bare strings) read as plain text.
        Payload::Json(_) => "text/plain",
        Payload::Text(s) => {
            let t = s.trim();
            if !t.is_empty() && serde_json::from_str::<serde_json::Value>(t).is_ok() {
                "application/json"
            } else if s.contains('=') && s.contains('&') {
                "application/x-www-form-urlencoded"
            } else if s.contains("boundary=") {
                "multipart/form-data"
            } else {
                "text/plain"
            }
        }
        Payload::Bytes(b) => {
            if sniff::is_binary(b) {
                "application/octet-stream"
            } else {
                "text/plain"
            }
        }
    }
}

// ═══════════════════════════════════════════════════════════════
// Header value validation
// ═══════════════════════════════════════════════════════════════

/// Reject header values that could smuggle extra lines into the response.
/// Any CR or LF is fatal, as is a value posing as a new status line.
fn validate_header_value(name: &str, value: &str) -> RavelResult<()> {
    if value.contains('\r') || value.contains('\n') {
        return Err(RavelError::CrlfInjection {
            name: name.to_string(),
        });
    }
    if value.trim_start().starts_with("HTTP/") {
        return Err(RavelError::CrlfInjection {
            name: name.to_string(),
        });
    }
    Ok(())
}

// ═══════════════════════════════════════════════════════════════
// Response builder
// ═══════════════════════════════════════════════════════════════

/// Mutable response under construction. Created once per request with the
/// default security headers already applied.
#[derive(Debug, Clone)]
pub struct Response {
    status_code: u16,
    status_message: &'static str,
    /// Canonical-case name -> value, in insertion order.
    headers: Vec<(String, String)>,
    body: Option<Payload>,
    encoding: Option<Encoding>,
    /// Serialized body bytes, retained at finalization so the driver can
    /// read back what was written.
    wire_body: Option<Vec<u8>>,
}

impl Response {
    pub fn new() -> Self {
        let mut res = Response {
            status_code: 200,
            status_message: "OK",
            headers: Vec::new(),
            body: None,
            encoding: None,
            wire_body: None,
        };
        // Defaults every response carries unless explicitly overwritten.
        res.headers.push(("X-Content-Type-Options".into(), "nosniff".into()));
        res.headers.push(("X-Frame-Options".into(), "DENY".into()));
        res.headers.push(("X-XSS-Protection".into(), "1; mode=block".into()));
        res.headers.push((
            "Referrer-Policy".into(),
            "strict-origin-when-cross-origin".into(),
        ));
        res
    }

    pub fn status_code(&self) -> u16 {
        self.status_code
    }

    pub fn status_message(&self) -> &'static str {
        self.status_message
    }

    /// Set the status code; the reason phrase follows from the fixed table.
    pub fn set_status(&mut self, code: u16) -> RavelResult<()> {
        match status_text(code) {
            Some(message) => {
                self.status_code = code;
                self.status_message = message;
                Ok(())
            }
            None => Err(RavelError::UnknownStatusCode(code)),
        }
    }

    fn position(&self, name: &str) -> Option<usize> {
        self.headers
            .iter()
            .position(|(n, _)| n.eq_ignore_ascii_case(name))
    }

    pub fn header(&self, name: &str) -> Option<&str> {
        self.position(name).map(|i| self.headers[i].1.as_str())
    }

    pub fn headers(&self) -> &[(String, String)] {
        &self.headers
    }

    /// Merge headers with overwrite. Every value is validated against
    /// CRLF injection before it is stored.
    pub fn add_header(&mut self, name: &str, value: &str) -> RavelResult<()> {
        validate_header_value(name, value)?;
        match self.position(name) {
            Some(i) => self.headers[i].1 = value.to_string(),
            None => self.headers.push((name.to_string(), value.to_string())),
        }
        Ok(())
    }

    pub fn add_headers<'a, I>(&mut self, entries: I) -> RavelResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in entries {
            self.add_header(name, value)?;
        }
        Ok(())
    }

    pub fn remove_headers(&mut self, names: &[&str]) {
        self.headers
            .retain(|(n, _)| !names.iter().any(|r| r.eq_ignore_ascii_case(n)));
    }

    /// Add only the names not already present.
    pub fn set_headers_if_not_set<'a, I>(&mut self, entries: I) -> RavelResult<()>
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (name, value) in entries {
            if self.position(name).is_none() {
                self.add_header(name, value)?;
            }
        }
        Ok(())
    }

    pub fn body(&self) -> Option<&Payload> {
        self.body.as_ref()
    }

    /// Set the body, inferring `Content-Type` when none is present.
    pub fn set_body(&mut self, body: Payload) {
        if self.position("Content-Type").is_none() {
            let ct = infer_content_type(&body);
            // Inferred types never contain CR/LF.
            let _ = self.add_header("Content-Type", ct);
        }
        self.body = Some(body);
    }

    /// Drop the body value while keeping headers intact. Used for HEAD
    /// responses after the hooks have seen the intended body.
    pub fn clear_body(&mut self) {
        self.body = None;
    }

    pub fn encoding(&self) -> Option<Encoding> {
        self.encoding
    }

    /// Serialized body bytes, available after `finalize`.
    pub fn wire_body(&self) -> Option<&[u8]> {
        self.wire_body.as_deref()
    }

    /// Serialize the body per the chosen encoding.
    fn serialize_body(&mut self) -> Vec<u8> {
        let encoding = match self.header("Content-Type") {
            Some(ct) => encoding_for(ct),
            // No content type known: buffers get the magic-number test,
            // everything else is written as UTF-8.
            None => match &self.body {
                Some(Payload::Bytes(b)) if sniff::is_binary(b) => Encoding::Base64,
                _ => Encoding::Utf8,
            },
        };
        self.encoding = Some(encoding);

        match &self.body {
            None => Vec::new(),
            Some(Payload::Text(s)) => s.clone().into_bytes(),
            Some(Payload::Json(v)) => match v {
                serde_json::Value::Null => Vec::new(),
                serde_json::Value::String(s) => s.clone().into_bytes(),
                other => serde_json::to_string(other)
                    .unwrap_or_default()
                    .into_bytes(),
            },
            Some(Payload::Bytes(b)) => match encoding {
                Encoding::Base64 => BASE64.encode(b).into_bytes(),
                Encoding::Utf8 | Encoding::Binary => b.clone(),
            },
        }
    }

    /// Assemble the full wire message: status line, headers, blank line,
    /// body. `Content-Length` is the byte length of the serialized body
    /// and `Date` is stamped if absent.
    pub fn finalize(&mut self, protocol: &str) -> Vec<u8> {
        let body = self.serialize_body();

        // Content-Length and Date are framework-owned; bypassing
        // add_header here would still be safe, but the values are known
        // CRLF-free so the validating path is used for uniformity.
        let _ = self.add_header("Content-Length", &body.len().to_string());
        if self.position("Date").is_none() {
            let now = httpdate::fmt_http_date(std::time::SystemTime::now());
            let _ = self.add_header("Date", &now);
        }

        let mut head = String::with_capacity(256);
        head.push_str(protocol);
        head.push(' ');
        head.push_str(&self.status_code.to_string());
        head.push(' ');
        head.push_str(self.status_message);
        head.push('\n');
        let mut first = true;
        for (name, value) in &self.headers {
            if !first {
                head.push('\n');
            }
            first = false;
            head.push_str(name);
            head.push_str(": ");
            head.push_str(value);
        }
        head.push_str("\n\n");

        let mut wire = Vec::with_capacity(head.len() + body.len());
        wire.extend_from_slice(head.as_bytes());
        wire.extend_from_slice(&body);
        self.wire_body = Some(body);
        wire
    }
}

impl Default for Response {
    fn default() -> Self {
        Self::new()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn default_security_headers() {
        let res = Response::new();
        assert_eq!(res.header("X-Content-Type-Options"), Some("nosniff"));
        assert_eq!(res.header("X-Frame-Options"), Some("DENY"));
        assert_eq!(res.header("X-XSS-Protection"), Some("1; mode=block"));
        assert_eq!(
            res.header("Referrer-Policy"),
            Some("strict-origin-when-cross-origin")
        );
    }

    #[test]
    fn unknown_status_rejected() {
        let mut res = Response::new();
        assert!(res.set_status(799).is_err());
        res.set_status(204).unwrap();
        assert_eq!(res.status_message(), "No Content");
    }

    #[test]
    fn crlf_values_rejected() {
        let mut res = Response::new();
        assert!(res.add_header("X-A", "ok-value").is_ok());
        assert!(res.add_header("X-B", "bad\r\nSet-Cookie: x=1").is_err());
        assert!(res.add_header("X-C", "bad\nLocation: /evil").is_err());
        assert!(res.add_header("X-D", "HTTP/1.1 200 OK").is_err());
    }

    #[test]
    fn content_type_inference() {
        let mut res = Response::new();
        res.set_body(Payload::Json(json!({"a": 1})));
        assert_eq!(res.header("Content-Type"), Some("application/json"));

        let mut res = Response::new();
        res.set_body(Payload::Text("{\"k\":true}".to_string()));
        assert_eq!(res.header("Content-Type"), Some("application/json"));

        let mut res = Response::new();
        res.set_body(Payload::Text("a=1&b=2".to_string()));
        assert_eq!(
            res.header("Content-Type"),
            Some("application/x-www-form-urlencoded")
        );

        let mut res = Response::new();
        res.set_body(Payload::Text("plain words".to_string()));
        assert_eq!(res.header("Content-Type"), Some("text/plain"));

        let mut res = Response::new();
        res.set_body(Payload::Bytes(b"\x89PNG\r\n\x1a\n".to_vec()));
        assert_eq!(res.header("Content-Type"), Some("application/octet-stream"));

        let mut res = Response::new();
        res.set_body(Payload::Json(json!(42)));
        assert_eq!(res.header("Content-Type"), Some("text/plain"));
    }

    #[test]
    fn explicit_content_type_wins_over_inference() {
        let mut res = Response::new();
        res.add_header("Content-Type", "text/html").unwrap();
        res.set_body(Payload::Json(json!({"a": 1})));
        assert_eq!(res.header("Content-Type"), Some("text/html"));
    }

    #[test]
    fn encoding_selection() {
        assert_eq!(encoding_for("image/png"), Encoding::Base64);
        assert_eq!(encoding_for("application/x-tar"), Encoding::Base64);
        assert_eq!(encoding_for("application/pdf"), Encoding::Base64);
        assert_eq!(encoding_for("text/html; charset=utf-8"), Encoding::Utf8);
        assert_eq!(encoding_for("application/json"), Encoding::Utf8);
        assert_eq!(encoding_for("application/vnd.custom"), Encoding::Binary);
    }

    #[test]
    fn finalize_frames_with_lf_and_content_length() {
        let mut res = Response::new();
        res.set_body(Payload::Json(json!({"ok": true})));
        let wire = res.finalize("HTTP/1.1");
        let text = String::from_utf8(wire).unwrap();

        assert!(text.starts_with("HTTP/1.1 200 OK\n"));
        let (head, body) = text.split_once("\n\n").unwrap();
        assert_eq!(body, "{\"ok\":true}");
        assert!(head.contains("Content-Length: 11"));
        assert!(head.contains("Date: "));
        // LF framing throughout the head, no CR anywhere.
        assert!(!head.contains('\r'));
    }

    #[test]
    fn binary_body_is_base64_on_the_wire() {
        let payload = b"\x89PNG\r\n\x1a\n\x00\x00".to_vec();
        let mut res = Response::new();
        res.set_body(Payload::Bytes(payload.clone()));
        let wire = res.finalize("HTTP/1.1");
        let text = String::from_utf8(wire).unwrap();
        let (_, body) = text.split_once("\n\n").unwrap();
        assert_eq!(body, BASE64.encode(&payload));
        assert_eq!(res.encoding(), Some(Encoding::Base64));
        assert_eq!(res.wire_body().unwrap().len(), body.len());
    }

    #[test]
    fn header_crud() {
        let mut res = Response::new();
        res.add_headers([("X-One", "1"), ("X-Two", "2")]).unwrap();
        res.set_headers_if_not_set([("X-One", "overridden"), ("X-Three", "3")])
            .unwrap();
        assert_eq!(res.header("X-One"), Some("1"));
        assert_eq!(res.header("X-Three"), Some("3"));
        res.remove_headers(&["x-two"]);
        assert_eq!(res.header("X-Two"), None);
    }
}
