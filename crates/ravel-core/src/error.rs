use thiserror::Error;

/// Errors raised while parsing the header block of a request.
///
/// Every limit violation carries the offending bound so the pipeline's
/// error log names the exact rule that fired.
#[derive(Debug, Error, PartialEq, Eq)]
pub enum HeaderError {
    #[error("Too many headers: {count} lines exceeds the limit of {limit}")]
    TooManyHeaders { count: usize, limit: usize },

    #[error("Header name exceeds {limit} bytes")]
    NameTooLong { limit: usize },

    #[error("Header value exceeds {limit} bytes")]
    ValueTooLong { limit: usize },

    #[error("Invalid character in header name: {name:?}")]
    InvalidName { name: String },
}

/// Errors raised while decoding a request body.
#[derive(Debug, Error)]
pub enum BodyError {
    #[error("Invalid JSON body: {0}")]
    InvalidJson(#[from] serde_json::Error),

    #[error("JSON body of {size} bytes exceeds maxSize of {limit}")]
    JsonTooLarge { size: usize, limit: usize },

    #[error("JSON nesting exceeds maxDepth of {limit}")]
    JsonTooDeep { limit: usize },

    #[error("JSON object exceeds maxKeys of {limit}")]
    JsonTooManyKeys { limit: usize },

    #[error("JSON string exceeds maxStringLength of {limit}")]
    JsonStringTooLong { limit: usize },

    #[error("JSON array exceeds maxArrayLength of {limit}")]
    JsonArrayTooLong { limit: usize },

    #[error("prototype pollution attempt detected")]
    PrototypePollution,

    #[error("Form body of {size} bytes exceeds maxSize of {limit}")]
    FormTooLarge { size: usize, limit: usize },

    #[error("Form exceeds maxFields of {limit}")]
    FormTooManyFields { limit: usize },

    #[error("Form field name exceeds maxFieldNameLength of {limit}")]
    FormFieldNameTooLong { limit: usize },

    #[error("Form field value exceeds maxFieldLength of {limit}")]
    FormFieldTooLong { limit: usize },

    #[error("Multipart body is missing a boundary")]
    MissingBoundary,

    #[error("File {filename:?} exceeds maxFileSize of {limit} bytes")]
    FileTooLarge { filename: String, limit: usize },

    #[error("Combined upload size exceeds maxTotalSize of {limit} bytes")]
    TotalUploadTooLarge { limit: usize },

    #[error("Upload exceeds maxFiles of {limit}")]
    TooManyFiles { limit: usize },

    #[error("Filename exceeds maxFilenameLength of {limit}")]
    FilenameTooLong { limit: usize },

    #[error("File extension {extension:?} is not in the allowed list")]
    ExtensionNotAllowed { extension: String },

    #[error("File extension {extension:?} is blocked")]
    ExtensionBlocked { extension: String },
}

/// Central error type for the Ravel engine.
///
/// Registration and startup errors propagate to the caller; everything that
/// fires during a request is caught by the pipeline driver and surfaced
/// through the `onError` handler.
#[derive(Debug, Error)]
pub enum RavelError {
    #[error("Route {pattern} already exists for method {method}")]
    RouteConflict { method: crate::request::Method, pattern: String },

    #[error("Duplicate parameter names in pattern {pattern}: {}", .names.join(", "))]
    DuplicateParams { pattern: String, names: Vec<String> },

    #[error("Invalid port number")]
    InvalidPort,

    #[error("Server is already listening")]
    AlreadyListening,

    #[error("Unknown status code: {0}")]
    UnknownStatusCode(u16),

    #[error("CRLF sequence detected in value for header {name}")]
    CrlfInjection { name: String },

    #[error("CORS configuration error: origin \"*\" cannot be combined with credentials")]
    CorsWildcardCredentials,

    #[error(transparent)]
    Header(#[from] HeaderError),

    #[error(transparent)]
    Body(#[from] BodyError),

    #[error("Handler error: {0}")]
    Handler(String),

    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),
}

pub type RavelResult<T> = Result<T, RavelError>;
