//! Hooks: the callables that run around route handlers, and the store for
//! the global ones.
//!
//! A handler's return value becomes the response body; hook return values
//! are ignored, hooks communicate by mutating the context.

use std::future::Future;
use std::pin::Pin;
use std::sync::Arc;

use serde_json::json;

use crate::context::Context;
use crate::error::{RavelError, RavelResult};
use crate::response::Payload;
use crate::router::normalize_path;

pub type BoxFuture<'a, T> = Pin<Box<dyn Future<Output = T> + Send + 'a>>;

/// What a handler produces: a body value, nothing, or an error the
/// pipeline routes through `onError`.
pub type HandlerResult = Result<Option<Payload>, RavelError>;

/// A route handler, `onError`, or `onNotFound`.
pub type HandlerFn =
    Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync>;

/// A before/after hook.
pub type HookFn =
    Arc<dyn for<'a> Fn(&'a mut Context) -> BoxFuture<'a, RavelResult<()>> + Send + Sync>;

/// Wrap a closure as a [`HandlerFn`].
pub fn handler<F>(f: F) -> HandlerFn
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Wrap a closure as a [`HookFn`].
pub fn hook<F>(f: F) -> HookFn
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, RavelResult<()>> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Conversion accepted by the setup surface wherever a handler goes.
pub trait IntoHandler {
    fn into_handler(self) -> HandlerFn;
}

impl<F> IntoHandler for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, HandlerResult> + Send + Sync + 'static,
{
    fn into_handler(self) -> HandlerFn {
        Arc::new(self)
    }
}

/// Conversion accepted by the setup surface wherever a hook goes.
pub trait IntoHook {
    fn into_hook(self) -> HookFn;
}

impl<F> IntoHook for F
where
    F: for<'a> Fn(&'a mut Context) -> BoxFuture<'a, RavelResult<()>> + Send + Sync + 'static,
{
    fn into_hook(self) -> HookFn {
        Arc::new(self)
    }
}

/// Route filter for a global hook. Patterns are compared against the
/// matched route's pattern, not the request path.
#[derive(Debug, Clone, Default)]
pub struct HookFilter {
    /// Empty means every route is included.
    pub routes_to_include: Vec<String>,
    pub routes_to_exclude: Vec<String>,
}

impl HookFilter {
    pub fn include(patterns: &[&str]) -> Self {
        HookFilter {
            routes_to_include: patterns.iter().map(|p| normalize_path(p)).collect(),
            routes_to_exclude: Vec::new(),
        }
    }

    pub fn exclude(patterns: &[&str]) -> Self {
        HookFilter {
            routes_to_include: Vec::new(),
            routes_to_exclude: patterns.iter().map(|p| normalize_path(p)).collect(),
        }
    }

    /// Whether the hook runs for a route with the given pattern.
    pub fn applies_to(&self, route_pattern: &str) -> bool {
        let included = self.routes_to_include.is_empty()
            || self.routes_to_include.iter().any(|p| p == route_pattern);
        let excluded = self.routes_to_exclude.iter().any(|p| p == route_pattern);
        included && !excluded
    }
}

/// One global hook with its filter.
#[derive(Clone)]
pub struct GlobalHook {
    pub hook: HookFn,
    pub filter: HookFilter,
}

/// Global before/after hooks in registration order, plus the error and
/// not-found handlers.
#[derive(Clone)]
pub struct HookStore {
    pub before_all: Vec<GlobalHook>,
    pub after_all: Vec<GlobalHook>,
    pub on_error: HandlerFn,
    pub on_not_found: HandlerFn,
}

impl HookStore {
    pub fn new() -> Self {
        HookStore {
            before_all: Vec::new(),
            after_all: Vec::new(),
            on_error: default_on_error(),
            on_not_found: default_on_not_found(),
        }
    }

    pub fn add_before_all(&mut self, hook: HookFn, filter: HookFilter) {
        self.before_all.push(GlobalHook { hook, filter });
    }

    pub fn add_after_all(&mut self, hook: HookFn, filter: HookFilter) {
        self.after_all.push(GlobalHook { hook, filter });
    }
}

impl Default for HookStore {
    fn default() -> Self {
        Self::new()
    }
}

fn default_on_error() -> HandlerFn {
    handler(|ctx| {
        Box::pin(async move {
            ctx.response.set_status(500)?;
            Ok(Some(Payload::Json(json!({
                "success": false,
                "message": "Internal Server Error",
            }))))
        })
    })
}

fn default_on_not_found() -> HandlerFn {
    handler(|ctx| {
        Box::pin(async move {
            ctx.response.set_status(404)?;
            Ok(Some(Payload::Json(json!({
                "success": false,
                "message": "404 Not Found",
            }))))
        })
    })
}
