//! Server configuration: explicit records with defaults, loadable from
//! environment variables (with `.env` support).

use std::fmt;
use std::sync::Arc;

use regex::Regex;
use serde::Deserialize;

use crate::request::Method;

/// Verbosity of the framework's own logging. Does not affect semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LogLevel {
    Off,
    Error,
    Warn,
    Info,
}

impl LogLevel {
    /// Directive string understood by `tracing_subscriber::EnvFilter`.
    pub fn as_directive(self) -> &'static str {
        match self {
            LogLevel::Off => "off",
            LogLevel::Error => "error",
            LogLevel::Warn => "warn",
            LogLevel::Info => "info",
        }
    }

    pub fn parse(s: &str) -> Option<Self> {
        match s.to_ascii_lowercase().as_str() {
            "off" => Some(LogLevel::Off),
            "error" => Some(LogLevel::Error),
            "warn" => Some(LogLevel::Warn),
            "info" => Some(LogLevel::Info),
            _ => None,
        }
    }
}

/// The `origin` field of the CORS configuration.
///
/// A single `is_allowed` dispatch covers all variants; the wildcard is the
/// only one that echoes `"*"` instead of the request origin.
#[derive(Clone)]
pub enum CorsOrigin {
    /// The literal `"*"`. Allows every origin.
    Any,
    /// A single origin, matched case-insensitively.
    Exact(String),
    /// A list of origins, matched case-insensitively.
    List(Vec<String>),
    /// A compiled pattern that must match the full origin string.
    Pattern(Regex),
    /// An arbitrary predicate over the origin string.
    Predicate(Arc<dyn Fn(&str) -> bool + Send + Sync>),
}

impl CorsOrigin {
    pub fn is_allowed(&self, origin: &str) -> bool {
        match self {
            CorsOrigin::Any => true,
            CorsOrigin::Exact(allowed) => allowed.eq_ignore_ascii_case(origin),
            CorsOrigin::List(allowed) => {
                allowed.iter().any(|a| a.eq_ignore_ascii_case(origin))
            }
            CorsOrigin::Pattern(re) => re
                .find(origin)
                .is_some_and(|m| m.start() == 0 && m.end() == origin.len()),
            CorsOrigin::Predicate(pred) => pred(origin),
        }
    }

    pub fn is_wildcard(&self) -> bool {
        matches!(self, CorsOrigin::Any)
    }
}

impl fmt::Debug for CorsOrigin {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            CorsOrigin::Any => f.write_str("Any"),
            CorsOrigin::Exact(o) => f.debug_tuple("Exact").field(o).finish(),
            CorsOrigin::List(o) => f.debug_tuple("List").field(o).finish(),
            CorsOrigin::Pattern(re) => f.debug_tuple("Pattern").field(&re.as_str()).finish(),
            CorsOrigin::Predicate(_) => f.write_str("Predicate(..)"),
        }
    }
}

/// Cross-origin resource sharing configuration.
#[derive(Debug, Clone)]
pub struct CorsConfig {
    pub enabled: bool,
    pub origin: CorsOrigin,
    pub credentials: bool,
    /// Methods advertised on preflight, comma-joined into
    /// `Access-Control-Allow-Methods`.
    pub methods: Vec<Method>,
    pub allowed_headers: Vec<String>,
    pub exposed_headers: Vec<String>,
    /// Seconds a preflight result may be cached.
    pub max_age: u32,
    /// Status code for the preflight short-circuit response.
    pub options_success_status: u16,
    /// When set, the preflight falls through to a user OPTIONS route.
    pub preflight_continue: bool,
}

impl Default for CorsConfig {
    fn default() -> Self {
        CorsConfig {
            enabled: false,
            origin: CorsOrigin::Any,
            credentials: false,
            methods: vec![
                Method::Get,
                Method::Head,
                Method::Post,
                Method::Put,
                Method::Patch,
                Method::Delete,
                Method::Options,
            ],
            allowed_headers: vec!["Content-Type".to_string(), "Authorization".to_string()],
            exposed_headers: Vec::new(),
            max_age: 86_400,
            options_success_status: 204,
            preflight_continue: false,
        }
    }
}

/// Limits applied to `application/json` bodies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct JsonLimits {
    /// Maximum body size in bytes.
    pub max_size: usize,
    /// Maximum nesting depth; the root counts as 1.
    pub max_depth: usize,
    /// Maximum number of keys per object.
    pub max_keys: usize,
    /// Maximum length of any key or string value.
    pub max_string_length: usize,
    /// Maximum number of elements per array.
    pub max_array_length: usize,
    /// When false, `__proto__` / `constructor` / `prototype` keys reject
    /// the body.
    pub allow_prototype_properties: bool,
}

impl Default for JsonLimits {
    fn default() -> Self {
        JsonLimits {
            max_size: 1_048_576,
            max_depth: 32,
            max_keys: 1_000,
            max_string_length: 65_536,
            max_array_length: 10_000,
            allow_prototype_properties: false,
        }
    }
}

/// Limits applied to `application/x-www-form-urlencoded` bodies.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct UrlEncodedLimits {
    pub max_size: usize,
    pub max_fields: usize,
    pub max_field_name_length: usize,
    pub max_field_length: usize,
}

impl Default for UrlEncodedLimits {
    fn default() -> Self {
        UrlEncodedLimits {
            max_size: 1_048_576,
            max_fields: 1_000,
            max_field_name_length: 256,
            max_field_length: 65_536,
        }
    }
}

/// Limits applied to `multipart/form-data` file uploads.
#[derive(Debug, Clone, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct FileUploadLimits {
    /// Per-file size cap in bytes.
    pub max_file_size: usize,
    /// Combined size cap across all files in one request.
    pub max_total_size: usize,
    pub max_files: usize,
    pub max_filename_length: usize,
    /// Lowercased extensions; empty means no allow-list.
    pub allowed_extensions: Vec<String>,
    /// Lowercased extensions that always reject.
    pub blocked_extensions: Vec<String>,
}

impl Default for FileUploadLimits {
    fn default() -> Self {
        FileUploadLimits {
            max_file_size: 10 * 1024 * 1024,
            max_total_size: 50 * 1024 * 1024,
            max_files: 10,
            max_filename_length: 255,
            allowed_extensions: Vec::new(),
            blocked_extensions: vec![
                "exe".to_string(),
                "bat".to_string(),
                "cmd".to_string(),
                "com".to_string(),
                "scr".to_string(),
                "ps1".to_string(),
                "sh".to_string(),
            ],
        }
    }
}

/// Body decoder configuration, one record per content type.
#[derive(Debug, Clone, Default, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BodyParserConfig {
    pub json: JsonLimits,
    pub url_encoded: UrlEncodedLimits,
    pub file_uploads: FileUploadLimits,
}

/// Top-level server configuration.
#[derive(Debug, Clone)]
pub struct Config {
    /// Listening port, 1-65535.
    pub port: u16,
    /// Bind address.
    pub host: String,
    /// How many proxies to skip when reading `X-Forwarded-For`.
    pub proxy_hops: usize,
    pub log_level: LogLevel,
    /// Whether to install SIGINT/SIGTERM handlers on listen.
    pub auto_graceful_shutdown: bool,
    pub cors: CorsConfig,
    pub body_parser: BodyParserConfig,
}

impl Default for Config {
    fn default() -> Self {
        Config {
            port: 5000,
            host: "0.0.0.0".to_string(),
            proxy_hops: 0,
            log_level: LogLevel::Info,
            auto_graceful_shutdown: true,
            cors: CorsConfig::default(),
            body_parser: BodyParserConfig::default(),
        }
    }
}

impl Config {
    /// Load configuration from environment variables (with `.env` support).
    ///
    /// Unset or unparsable variables fall back to the defaults.
    pub fn from_env() -> Self {
        let _ = dotenvy::dotenv();
        let defaults = Config::default();

        Config {
            port: std::env::var("RAVEL_PORT")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.port),
            host: std::env::var("RAVEL_HOST").unwrap_or(defaults.host),
            proxy_hops: std::env::var("RAVEL_PROXY_HOPS")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.proxy_hops),
            log_level: std::env::var("RAVEL_LOG_LEVEL")
                .ok()
                .and_then(|v| LogLevel::parse(&v))
                .unwrap_or(defaults.log_level),
            auto_graceful_shutdown: std::env::var("RAVEL_AUTO_SHUTDOWN")
                .ok()
                .and_then(|v| v.parse().ok())
                .unwrap_or(defaults.auto_graceful_shutdown),
            cors: defaults.cors,
            body_parser: defaults.body_parser,
        }
    }

    /// Full bind address.
    pub fn server_addr(&self) -> String {
        format!("{}:{}", self.host, self.port)
    }
}
