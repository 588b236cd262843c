//! The request pipeline: CORS gate, route match, body decode, hook chain,
//! handler, and finalization, with the error fallbacks wrapped around all
//! of it.
//!
//! Execution order for a matched route is fixed: global before hooks,
//! route before hooks (group hooks already merged in front), handler,
//! route after hooks, global after hooks, body assignment, finalize.

use std::net::IpAddr;

use serde_json::json;

use crate::body;
use crate::config::Config;
use crate::context::Context;
use crate::cors::{self, CorsOutcome};
use crate::error::RavelError;
use crate::headers;
use crate::hooks::{HandlerResult, HookStore};
use crate::request::{self, Method, Request, RequestBody};
use crate::response::Payload;
use crate::router::{Route, RouteRegistry};
use crate::wire;

/// The immutable per-process engine: configuration, routes, and hooks.
/// Shared read-only across all connection tasks.
pub struct Engine {
    pub config: Config,
    pub registry: RouteRegistry,
    pub hooks: HookStore,
}

impl Engine {
    /// Turn one raw request message into one complete wire response.
    ///
    /// This never fails: parse errors and handler errors all end in a
    /// serialized error response.
    pub async fn handle_bytes(&self, raw: &[u8], peer: Option<IpAddr>) -> Vec<u8> {
        let parsed = wire::parse(raw);

        let headers = match headers::parse(&parsed.header_block) {
            Ok(h) => h,
            Err(e) => {
                // The request view degrades to defaults; the error still
                // produces a well-formed response via onError.
                let request = Request {
                    method: parsed.method,
                    path: parsed.path,
                    protocol: parsed.protocol,
                    headers: Default::default(),
                    query: request::parse_query(&parsed.query),
                    params: Default::default(),
                    body: RequestBody::Empty,
                    raw_body: parsed.body,
                    client_ip: peer.map(|ip| ip.to_string()).unwrap_or_default(),
                };
                let mut ctx = Context::new(request);
                return self.error_response(&mut ctx, e.into()).await;
            }
        };

        let client_ip = request::resolve_client_ip(
            headers.get("x-forwarded-for").map(String::as_str),
            self.config.proxy_hops,
            peer,
        );
        let request = Request {
            method: parsed.method,
            path: parsed.path,
            protocol: parsed.protocol,
            headers,
            query: request::parse_query(&parsed.query),
            params: Default::default(),
            body: RequestBody::Raw(parsed.body.clone()),
            raw_body: parsed.body,
            client_ip,
        };
        let mut ctx = Context::new(request);
        self.run(&mut ctx).await
    }

    /// Drive the pipeline for one context and serialize the response.
    pub async fn run(&self, ctx: &mut Context) -> Vec<u8> {
        match cors::apply(ctx, &self.config.cors) {
            Ok(CorsOutcome::Handled) => return finalize(ctx),
            Ok(CorsOutcome::NotHandled) => {}
            Err(e) => return self.error_response(ctx, e).await,
        }

        let Some((route, params)) = self
            .registry
            .lookup(ctx.request.method, &ctx.request.path)
        else {
            tracing::debug!(
                method = %ctx.request.method,
                path = %ctx.request.path,
                "no route matched"
            );
            let not_found = self.hooks.on_not_found.clone();
            match not_found(ctx).await {
                Ok(body) => {
                    if let Some(value) = body {
                        ctx.response.set_body(value);
                    }
                    return finalize(ctx);
                }
                Err(e) => return self.error_response(ctx, e).await,
            }
        };

        ctx.request.params = params;

        match self.run_matched(ctx, &route).await {
            Ok(returned) => {
                if let Some(value) = returned {
                    ctx.response.set_body(value);
                }
                // HEAD responses drop the body only now, after every hook
                // has seen the intended value.
                if ctx.request.method == Method::Head {
                    ctx.response.clear_body();
                }
                finalize(ctx)
            }
            Err(e) => self.error_response(ctx, e).await,
        }
    }

    /// Steps 3-7: decode the body, run the hook chain around the handler.
    async fn run_matched(&self, ctx: &mut Context, route: &Route) -> HandlerResult {
        if !route.raw_body {
            let content_type = ctx.request.header("content-type").map(str::to_string);
            let (main, boundary) = match content_type.as_deref() {
                Some(header) => {
                    let (main, boundary) = body::content_type_parts(header);
                    (Some(main), boundary)
                }
                None => (None, None),
            };
            ctx.request.body = body::decode(
                &ctx.request.raw_body,
                main.as_deref(),
                boundary.as_deref(),
                &self.config.body_parser,
            )?;
        }

        for global in &self.hooks.before_all {
            if global.filter.applies_to(&route.pattern) {
                (global.hook)(ctx).await?;
            }
        }
        for before in &route.before {
            before(ctx).await?;
        }

        let returned = (route.handler)(ctx).await?;

        for after in &route.after {
            after(ctx).await?;
        }
        for global in &self.hooks.after_all {
            if global.filter.applies_to(&route.pattern) {
                (global.hook)(ctx).await?;
            }
        }

        Ok(returned)
    }

    /// The error fallback: log, run `onError`, restore CORS headers,
    /// finalize. A failing `onError` degrades to the hardcoded 500.
    async fn error_response(&self, ctx: &mut Context, err: RavelError) -> Vec<u8> {
        tracing::error!(error = %err, path = %ctx.request.path, "request pipeline error");

        let on_error = self.hooks.on_error.clone();
        match on_error(ctx).await {
            Ok(body) => {
                if let Some(value) = body {
                    ctx.response.set_body(value);
                }
            }
            Err(e2) => {
                tracing::error!(error = %e2, "onError handler failed");
                // 500 is always in the status table.
                let _ = ctx.response.set_status(500);
                ctx.response.set_body(Payload::Json(json!({
                    "success": false,
                    "message": "Internal Server Error",
                })));
            }
        }

        cors::reapply_headers(ctx, &self.config.cors);
        finalize(ctx)
    }
}

fn finalize(ctx: &mut Context) -> Vec<u8> {
    ctx.response.finalize(&ctx.request.protocol)
}
