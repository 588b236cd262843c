//! CORS gate: origin validation, response headers, and the preflight
//! short-circuit. Runs ahead of route matching in the pipeline.

use serde_json::json;

use crate::config::CorsConfig;
use crate::context::Context;
use crate::error::{RavelError, RavelResult};
use crate::request::Method;
use crate::response::Payload;

/// Whether the gate consumed the request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CorsOutcome {
    /// The response is complete; the pipeline finalizes and stops.
    Handled,
    /// Route matching and the hook chain proceed.
    NotHandled,
}

/// Run the CORS gate for one request.
///
/// The wildcard-with-credentials combination is a configuration error the
/// CORS spec forbids; it is raised rather than silently degraded so the
/// mistake is caught in testing.
pub fn apply(ctx: &mut Context, cfg: &CorsConfig) -> RavelResult<CorsOutcome> {
    if !cfg.enabled {
        return Ok(CorsOutcome::NotHandled);
    }
    if cfg.origin.is_wildcard() && cfg.credentials {
        return Err(RavelError::CorsWildcardCredentials);
    }

    let origin = ctx.request.header("origin").unwrap_or("").to_string();
    let allowed = cfg.origin.is_allowed(&origin);
    let is_preflight = ctx.request.method == Method::Options;

    if !allowed {
        if is_preflight {
            ctx.response.set_status(403)?;
            ctx.response.set_body(Payload::Json(json!({
                "error": "CORS: Origin not allowed",
                "origin": origin,
            })));
            return Ok(CorsOutcome::Handled);
        }
        // Unauthorized non-preflight requests proceed without CORS
        // headers; the browser enforces the block on its side.
        return Ok(CorsOutcome::NotHandled);
    }

    let allow_origin = if cfg.origin.is_wildcard() { "*" } else { origin.as_str() };

    if !is_preflight {
        ctx.response.add_header("Access-Control-Allow-Origin", allow_origin)?;
        ctx.response.add_header(
            "Access-Control-Allow-Credentials",
            if cfg.credentials { "true" } else { "false" },
        )?;
        return Ok(CorsOutcome::NotHandled);
    }

    let methods = cfg
        .methods
        .iter()
        .map(|m| m.as_str())
        .collect::<Vec<_>>()
        .join(", ");
    ctx.response.add_header("Access-Control-Allow-Origin", allow_origin)?;
    ctx.response.add_header("Access-Control-Allow-Methods", &methods)?;
    if !cfg.allowed_headers.is_empty() {
        ctx.response
            .add_header("Access-Control-Allow-Headers", &cfg.allowed_headers.join(", "))?;
    }
    if !cfg.exposed_headers.is_empty() {
        ctx.response
            .add_header("Access-Control-Expose-Headers", &cfg.exposed_headers.join(", "))?;
    }
    ctx.response.add_header(
        "Access-Control-Allow-Credentials",
        if cfg.credentials { "true" } else { "false" },
    )?;
    ctx.response
        .add_header("Access-Control-Max-Age", &cfg.max_age.to_string())?;
    ctx.response.set_status(cfg.options_success_status)?;

    if cfg.preflight_continue {
        // A user-registered OPTIONS route gets its chance; the headers
        // above stay on whatever response it builds.
        return Ok(CorsOutcome::NotHandled);
    }
    ctx.response.set_body(Payload::Text(String::new()));
    Ok(CorsOutcome::Handled)
}

/// Re-run the header-setting step for an error response, so failures
/// still carry CORS headers. Never fails; a second configuration error
/// here would mask the one being reported.
pub fn reapply_headers(ctx: &mut Context, cfg: &CorsConfig) {
    if !cfg.enabled || (cfg.origin.is_wildcard() && cfg.credentials) {
        return;
    }
    let origin = ctx.request.header("origin").unwrap_or("").to_string();
    if !cfg.origin.is_allowed(&origin) {
        return;
    }
    let allow_origin = if cfg.origin.is_wildcard() { "*" } else { origin.as_str() };
    let _ = ctx.response.add_header("Access-Control-Allow-Origin", allow_origin);
    let _ = ctx.response.add_header(
        "Access-Control-Allow-Credentials",
        if cfg.credentials { "true" } else { "false" },
    );
}
