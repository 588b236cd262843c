//! Ravel: a from-scratch HTTP/1.1 server framework.
//!
//! Raw TCP in, hand-parsed requests through a hooked pipeline to user
//! handlers, hand-serialized responses out. No HTTP library underneath.
//!
//! ```rust,ignore
//! use ravel_core::prelude::*;
//!
//! #[tokio::main]
//! async fn main() -> Result<(), Box<dyn std::error::Error>> {
//!     init_logging();
//!     let mut app = App::new();
//!     app.get("/hello/:name", |ctx| {
//!         Box::pin(async move {
//!             let name = ctx.request.param("name").unwrap_or("world").to_string();
//!             Ok(Some(Payload::Json(json!({ "hello": name }))))
//!         })
//!     })?;
//!     app.listen().await?;
//!     Ok(())
//! }
//! ```

pub mod app;
pub mod body;
pub mod config;
pub mod context;
pub mod cors;
pub mod error;
pub mod headers;
pub mod hooks;
pub mod logging;
pub mod pipeline;
pub mod request;
pub mod response;
pub mod router;
pub mod server;
pub mod sniff;
pub mod testing;
pub mod wire;

// ── Core type re-exports ───────────────────────────────────────
pub use app::{App, Group, RouteOptions};
pub use config::{
    BodyParserConfig, Config, CorsConfig, CorsOrigin, FileUploadLimits, JsonLimits, LogLevel,
    UrlEncodedLimits,
};
pub use context::Context;
pub use error::{BodyError, HeaderError, RavelError, RavelResult};
pub use logging::{init_logging, init_logging_for, init_logging_with_level};
pub use server::Server;

// ── Request/response re-exports ────────────────────────────────
pub use hooks::{BoxFuture, HandlerResult, HookFilter, HookStore, IntoHandler, IntoHook};
pub use request::{FileContent, Method, MultipartForm, Request, RequestBody, UploadedFile};
pub use response::{Encoding, Payload, Response};
pub use router::{Route, RouteRegistry};

// ── Test harness re-exports ────────────────────────────────────
pub use testing::{TestResponse, TestServer};

/// One-stop imports for application code.
pub mod prelude {
    pub use crate::app::{App, RouteOptions};
    pub use crate::config::{Config, CorsConfig, CorsOrigin, LogLevel};
    pub use crate::context::Context;
    pub use crate::error::{RavelError, RavelResult};
    pub use crate::hooks::{HandlerResult, HookFilter};
    pub use crate::logging::init_logging;
    pub use crate::request::{Method, RequestBody};
    pub use crate::response::Payload;
    pub use serde_json::json;
}
