//! The parsed, read-only view of one HTTP request.

use std::collections::HashMap;
use std::fmt;
use std::net::IpAddr;

use crate::body::urlencoded::percent_decode;

/// The HTTP methods the engine recognizes. Anything else degrades to the
/// wire parser's safe defaults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Method {
    Get,
    Head,
    Post,
    Put,
    Patch,
    Delete,
    Options,
}

impl Method {
    pub fn from_bytes(b: &[u8]) -> Option<Self> {
        match b {
            b"GET" => Some(Method::Get),
            b"HEAD" => Some(Method::Head),
            b"POST" => Some(Method::Post),
            b"PUT" => Some(Method::Put),
            b"PATCH" => Some(Method::Patch),
            b"DELETE" => Some(Method::Delete),
            b"OPTIONS" => Some(Method::Options),
            _ => None,
        }
    }

    pub fn as_str(self) -> &'static str {
        match self {
            Method::Get => "GET",
            Method::Head => "HEAD",
            Method::Post => "POST",
            Method::Put => "PUT",
            Method::Patch => "PATCH",
            Method::Delete => "DELETE",
            Method::Options => "OPTIONS",
        }
    }
}

impl fmt::Display for Method {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// A file carried by a `multipart/form-data` part with a `filename`.
#[derive(Debug, Clone, PartialEq)]
pub struct UploadedFile {
    /// The part's field name.
    pub field: String,
    pub filename: String,
    /// Defaults to `application/octet-stream` when the part declares none.
    pub content_type: String,
    /// Size of the part content in bytes.
    pub size: usize,
    pub content: FileContent,
}

/// File content, kept as bytes for binary content types and as text
/// otherwise.
#[derive(Debug, Clone, PartialEq)]
pub enum FileContent {
    Bytes(Vec<u8>),
    Text(String),
}

/// The decoded `multipart/form-data` payload.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct MultipartForm {
    pub fields: HashMap<String, String>,
    pub files: Vec<UploadedFile>,
}

/// The decoded request body; the variant depends on the content type.
#[derive(Debug, Clone, PartialEq)]
pub enum RequestBody {
    Empty,
    Json(serde_json::Value),
    Form(HashMap<String, String>),
    Multipart(MultipartForm),
    Text(String),
    /// Undecoded bytes, delivered when the matched route sets the raw-body
    /// flag (or before decoding has run).
    Raw(Vec<u8>),
}

/// One parsed request. Built once per connection and read-only from the
/// pipeline's point of view; only `params` is filled in after route match.
#[derive(Debug, Clone)]
pub struct Request {
    pub method: Method,
    /// Path without the query string.
    pub path: String,
    /// E.g. `HTTP/1.1`.
    pub protocol: String,
    /// Lowercased name -> value; last wins on duplicates.
    pub headers: HashMap<String, String>,
    pub query: HashMap<String, String>,
    /// Captured `:name` segments of the matched route pattern.
    pub params: HashMap<String, String>,
    pub body: RequestBody,
    pub raw_body: Vec<u8>,
    pub client_ip: String,
}

impl Request {
    /// Case-insensitive header lookup (names are stored lowercased).
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(&name.to_ascii_lowercase()).map(String::as_str)
    }

    pub fn param(&self, name: &str) -> Option<&str> {
        self.params.get(name).map(String::as_str)
    }

    pub fn query_value(&self, name: &str) -> Option<&str> {
        self.query.get(name).map(String::as_str)
    }
}

/// Parse a raw query string into a name -> value map. Pairs split on `&`,
/// name/value on the first `=`; both sides are percent-decoded.
pub fn parse_query(raw: &str) -> HashMap<String, String> {
    let mut out = HashMap::new();
    for pair in raw.split('&') {
        if pair.is_empty() {
            continue;
        }
        let (name, value) = match pair.split_once('=') {
            Some((n, v)) => (n, v),
            None => (pair, ""),
        };
        if name.is_empty() {
            continue;
        }
        out.insert(percent_decode(name), percent_decode(value));
    }
    out
}

/// Resolve the client IP from `X-Forwarded-For` and the configured proxy
/// hop count, falling back to the socket peer address.
///
/// With `proxy_hops == 0` the raw header value is trusted as-is; otherwise
/// the address `proxy_hops` positions from the right of the list is taken,
/// and an out-of-range count yields the empty string.
pub fn resolve_client_ip(
    forwarded_for: Option<&str>,
    proxy_hops: usize,
    peer: Option<IpAddr>,
) -> String {
    let from_header = match forwarded_for {
        None => String::new(),
        Some(raw) if proxy_hops == 0 => raw.to_string(),
        Some(raw) => {
            let parts: Vec<&str> = raw.split(',').map(str::trim).collect();
            if proxy_hops <= parts.len() {
                parts[parts.len() - proxy_hops].to_string()
            } else {
                String::new()
            }
        }
    };

    if from_header.is_empty() {
        peer.map(|ip| ip.to_string()).unwrap_or_default()
    } else {
        from_header
    }
}
