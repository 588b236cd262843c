//! The fluent setup surface: verb registration, groups, global hooks, and
//! server startup.
//!
//! Everything here happens before `listen`; the registry and hook store
//! are frozen into the engine when the server is built.

use crate::config::Config;
use crate::error::RavelResult;
use crate::hooks::{HookFilter, HookFn, HookStore, IntoHandler, IntoHook};
use crate::pipeline::Engine;
use crate::request::Method;
use crate::router::{Route, RouteRegistry};
use crate::server::Server;

/// Per-route registration options: extra hooks and the raw-body flag.
#[derive(Default)]
pub struct RouteOptions {
    pub before: Vec<HookFn>,
    pub after: Vec<HookFn>,
    /// Deliver undecoded body bytes to the handler.
    pub raw_body: bool,
}

impl RouteOptions {
    pub fn before(mut self, hook: impl IntoHook) -> Self {
        self.before.push(hook.into_hook());
        self
    }

    pub fn after(mut self, hook: impl IntoHook) -> Self {
        self.after.push(hook.into_hook());
        self
    }

    pub fn raw_body(mut self) -> Self {
        self.raw_body = true;
        self
    }
}

/// A Ravel application under construction.
///
/// ```rust,ignore
/// let mut app = App::new();
/// app.get("/users/:id", |ctx| Box::pin(async move {
///     let id = ctx.request.param("id").unwrap_or_default().to_string();
///     Ok(Some(Payload::Json(json!({ "id": id }))))
/// }))?;
/// app.listen().await?;
/// ```
pub struct App {
    config: Config,
    registry: RouteRegistry,
    hooks: HookStore,
}

impl App {
    pub fn new() -> Self {
        Self::with_config(Config::default())
    }

    pub fn with_config(config: Config) -> Self {
        App {
            config,
            registry: RouteRegistry::new(),
            hooks: HookStore::new(),
        }
    }

    /// Load configuration from the environment.
    pub fn from_env() -> Self {
        Self::with_config(Config::from_env())
    }

    pub fn config(&self) -> &Config {
        &self.config
    }

    pub fn config_mut(&mut self) -> &mut Config {
        &mut self.config
    }

    /// Register a route with explicit options.
    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        handler: impl IntoHandler,
        opts: RouteOptions,
    ) -> RavelResult<&mut Self> {
        self.registry.register(Route {
            method,
            pattern: path.to_string(),
            handler: handler.into_handler(),
            before: opts.before,
            after: opts.after,
            raw_body: opts.raw_body,
        })?;
        Ok(self)
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Get, path, handler, RouteOptions::default())
    }

    pub fn head(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Head, path, handler, RouteOptions::default())
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Post, path, handler, RouteOptions::default())
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Put, path, handler, RouteOptions::default())
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Patch, path, handler, RouteOptions::default())
    }

    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Delete, path, handler, RouteOptions::default())
    }

    pub fn options(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Options, path, handler, RouteOptions::default())
    }

    /// Add a global before hook that runs for every route.
    pub fn before_all(&mut self, hook: impl IntoHook) -> &mut Self {
        self.hooks.add_before_all(hook.into_hook(), HookFilter::default());
        self
    }

    /// Add a global before hook limited by a route filter.
    pub fn before_all_filtered(&mut self, hook: impl IntoHook, filter: HookFilter) -> &mut Self {
        self.hooks.add_before_all(hook.into_hook(), filter);
        self
    }

    pub fn after_all(&mut self, hook: impl IntoHook) -> &mut Self {
        self.hooks.add_after_all(hook.into_hook(), HookFilter::default());
        self
    }

    pub fn after_all_filtered(&mut self, hook: impl IntoHook, filter: HookFilter) -> &mut Self {
        self.hooks.add_after_all(hook.into_hook(), filter);
        self
    }

    /// Replace the error handler. Its return value becomes the body of
    /// every failed request.
    pub fn on_error(&mut self, handler: impl IntoHandler) -> &mut Self {
        self.hooks.on_error = handler.into_handler();
        self
    }

    /// Replace the not-found handler.
    pub fn on_not_found(&mut self, handler: impl IntoHandler) -> &mut Self {
        self.hooks.on_not_found = handler.into_handler();
        self
    }

    /// Open a route group under a shared path prefix. Group hooks apply
    /// to every route registered through the group, so add them before
    /// the routes.
    pub fn group(&mut self, prefix: &str) -> Group<'_> {
        Group {
            app: self,
            prefix: prefix.to_string(),
            before: Vec::new(),
            after: Vec::new(),
        }
    }

    /// Freeze registration and build the server.
    pub fn build(self) -> RavelResult<Server> {
        Server::new(Engine {
            config: self.config,
            registry: self.registry,
            hooks: self.hooks,
        })
    }

    /// Build and serve on the configured address until shutdown.
    pub async fn listen(self) -> RavelResult<()> {
        self.build()?.listen().await
    }
}

impl Default for App {
    fn default() -> Self {
        Self::new()
    }
}

/// A group of routes sharing a path prefix and a set of hooks.
///
/// Group before hooks run ahead of each route's own before hooks; group
/// after hooks run behind each route's own after hooks.
pub struct Group<'a> {
    app: &'a mut App,
    prefix: String,
    before: Vec<HookFn>,
    after: Vec<HookFn>,
}

impl Group<'_> {
    pub fn before(&mut self, hook: impl IntoHook) -> &mut Self {
        self.before.push(hook.into_hook());
        self
    }

    pub fn after(&mut self, hook: impl IntoHook) -> &mut Self {
        self.after.push(hook.into_hook());
        self
    }

    pub fn route(
        &mut self,
        method: Method,
        path: &str,
        handler: impl IntoHandler,
        opts: RouteOptions,
    ) -> RavelResult<&mut Self> {
        let full = format!("{}/{}", self.prefix, path);

        let mut before = self.before.clone();
        before.extend(opts.before);
        let mut after = opts.after;
        after.extend(self.after.iter().cloned());

        self.app.route(
            method,
            &full,
            handler,
            RouteOptions {
                before,
                after,
                raw_body: opts.raw_body,
            },
        )?;
        Ok(self)
    }

    pub fn get(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Get, path, handler, RouteOptions::default())
    }

    pub fn post(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Post, path, handler, RouteOptions::default())
    }

    pub fn put(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Put, path, handler, RouteOptions::default())
    }

    pub fn patch(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Patch, path, handler, RouteOptions::default())
    }

    pub fn delete(&mut self, path: &str, handler: impl IntoHandler) -> RavelResult<&mut Self> {
        self.route(Method::Delete, path, handler, RouteOptions::default())
    }
}

impl App {
    /// Internal accessor for the test harness.
    pub(crate) fn into_parts(self) -> (Config, RouteRegistry, HookStore) {
        (self.config, self.registry, self.hooks)
    }
}
