//! Router façade: registration API, lazy index rebuilds and dispatch.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;
use std::time::Instant;

use arc_swap::ArcSwap;
use http::{Method, StatusCode, Uri};
use parking_lot::{Mutex, RwLock};
use tracing::{debug, info};

use super::matcher::{self, Snapshot};
use super::registry::{join_paths, Registry};
use super::route::{RouteId, RouteInfo, METHOD_USE};
use crate::config::RouterConfig;
use crate::dispatcher::{Ctx, Handler, ScanMode};
use crate::error::{DispatchError, RegistrationError};
use crate::server::{default_error_handler, ErrorHandler};

/// Embeddable HTTP request router.
///
/// Registration takes an exclusive lock on the registry and marks the
/// dispatch index dirty. The next dispatch rebuilds the index once and
/// publishes a new [`Snapshot`]; requests already in flight keep the
/// snapshot they started with.
pub struct Router {
    registry: Mutex<Registry>,
    snapshot: ArcSwap<Snapshot>,
    dirty: AtomicBool,
    pub(crate) error_handler: RwLock<ErrorHandler>,
}

impl Default for Router {
    fn default() -> Self {
        Self::new()
    }
}

impl Router {
    /// Router with [`RouterConfig::default()`].
    #[must_use]
    pub fn new() -> Self {
        Self::with_config(RouterConfig::default())
    }

    #[must_use]
    pub fn with_config(config: RouterConfig) -> Self {
        let registry = Registry::new(config);
        let snapshot = Snapshot::capture(&registry);
        Self {
            registry: Mutex::new(registry),
            snapshot: ArcSwap::from_pointee(snapshot),
            dirty: AtomicBool::new(true),
            error_handler: RwLock::new(default_error_handler()),
        }
    }

    #[must_use]
    pub fn config(&self) -> RouterConfig {
        self.registry.lock().config().clone()
    }

    /// Run `f` against the registry under the registration lock.
    fn with_registry<R>(&self, f: impl FnOnce(&mut Registry) -> R) -> R {
        let mut registry = self.registry.lock();
        let out = f(&mut registry);
        if registry.is_dirty() {
            self.dirty.store(true, Ordering::Release);
        }
        out
    }

    pub(crate) fn register_route(
        &self,
        method: &str,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<RouteId, RegistrationError> {
        self.with_registry(|reg| reg.register(method, path, handlers))
    }

    pub(crate) fn register_with(
        &self,
        f: impl FnOnce(&mut Registry) -> Result<RouteId, RegistrationError>,
    ) -> Result<RouteId, RegistrationError> {
        self.with_registry(f)
    }

    /// Start a group of routes sharing `prefix`. Non-empty `handlers`
    /// are registered as middleware on the prefix.
    ///
    /// # Errors
    ///
    /// Fails when the middleware registration fails.
    pub fn group<I>(&self, prefix: &str, handlers: I) -> Result<Group<'_>, RegistrationError>
    where
        I: IntoIterator<Item = Handler>,
    {
        Group::new(self, prefix.to_string(), handlers.into_iter().collect())
    }

    /// Mount every route of `sub` under `prefix`.
    ///
    /// Mounted routes are skipped by [`Router::dispatch`]; only
    /// [`Router::dispatch_mounted`] traverses them.
    ///
    /// # Errors
    ///
    /// Fails when a mounted path does not compile under this router's config.
    pub fn mount(&self, prefix: &str, sub: Router) -> Result<usize, RegistrationError> {
        let sub = sub.registry.into_inner();
        let count = self.with_registry(|reg| reg.absorb_mount(prefix, &sub))?;
        info!(prefix = %prefix, routes = count, "Sub-router mounted");
        Ok(count)
    }

    /// Give a route a display name for lookups and URL building.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::UnknownRoute`] for ids this router never issued.
    pub fn name(&self, id: RouteId, name: &str) -> Result<(), RegistrationError> {
        self.with_registry(|reg| reg.set_name(id, name))
    }

    /// First route registered under `name`.
    #[must_use]
    pub fn route_by_name(&self, name: &str) -> Option<RouteInfo> {
        self.snapshot()
            .routes()
            .iter()
            .find(|r| r.name() == Some(name))
            .map(|r| r.info())
    }

    /// Build a URL for a named route from parameter values.
    ///
    /// # Errors
    ///
    /// 404 status error for unknown names, [`DispatchError::MissingParam`]
    /// for parameters without a value.
    pub fn url_for(&self, name: &str, params: &[(&str, &str)]) -> Result<String, DispatchError> {
        let snapshot = self.snapshot();
        let route = snapshot
            .routes()
            .iter()
            .find(|r| r.name() == Some(name))
            .ok_or_else(|| {
                DispatchError::status(StatusCode::NOT_FOUND, format!("no route named `{name}`"))
            })?;
        route.pattern().build_url(|key| {
            params
                .iter()
                .find(|(k, _)| *k == key)
                .map(|(_, v)| *v)
        })
    }

    /// Every method-stack entry in match-priority order, with the
    /// concrete method it is registered under.
    #[must_use]
    pub fn routes(&self) -> Vec<RouteInfo> {
        let snapshot = self.snapshot();
        snapshot
            .methods()
            .iter()
            .enumerate()
            .flat_map(|(slot, method)| {
                snapshot.stack(slot).iter().filter_map(|id| {
                    snapshot.route(*id).map(|r| RouteInfo {
                        method: method.to_string(),
                        ..r.info()
                    })
                })
            })
            .collect()
    }

    /// Print all registered routes to stdout.
    pub fn dump_routes(&self) {
        let routes = self.routes();
        println!("[routes] count={}", routes.len());
        for r in routes {
            println!(
                "[route] {:<7} {:<32} -> {} ({} handlers){}",
                r.method,
                r.pattern,
                r.kind,
                r.handlers,
                r.name.map(|n| format!(" name={n}")).unwrap_or_default()
            );
        }
    }

    /// Current snapshot, rebuilding the dispatch index first if any
    /// registration happened since the last build.
    #[must_use]
    pub fn snapshot(&self) -> Arc<Snapshot> {
        if self.dirty.load(Ordering::Acquire) {
            let mut registry = self.registry.lock();
            if registry.is_dirty() {
                let start = Instant::now();
                let snapshot = Snapshot::capture(&registry);
                info!(
                    routes = registry.len(),
                    methods = snapshot.methods().len(),
                    buckets = snapshot.index().bucket_count(),
                    duration_us = start.elapsed().as_micros(),
                    "Dispatch index rebuilt"
                );
                self.snapshot.store(Arc::new(snapshot));
                registry.mark_clean();
            }
            self.dirty.store(false, Ordering::Release);
        }
        self.snapshot.load_full()
    }

    /// A fresh request context for `method` and an already decoded `path`.
    #[must_use]
    pub fn context(&self, method: Method, path: &str) -> Ctx {
        let uri = path.parse::<Uri>().unwrap_or_else(|_| Uri::from_static("/"));
        Ctx::new(self.snapshot(), method, uri, path.to_string())
    }

    /// Resolve the request and run the matched handler chain.
    ///
    /// # Errors
    ///
    /// `NotFound` / `MethodNotAllowed` when nothing matches, or whatever
    /// the handlers return.
    pub fn dispatch(&self, ctx: &mut Ctx) -> Result<bool, DispatchError> {
        self.scan(ctx, ScanMode::Normal)
    }

    /// Like [`Router::dispatch`] but only mount routes are considered.
    ///
    /// # Errors
    ///
    /// Same as [`Router::dispatch`].
    pub fn dispatch_mounted(&self, ctx: &mut Ctx) -> Result<bool, DispatchError> {
        self.scan(ctx, ScanMode::Mounts)
    }

    fn scan(&self, ctx: &mut Ctx, mode: ScanMode) -> Result<bool, DispatchError> {
        ctx.mode = mode;
        ctx.cursor = 0;
        ctx.route = None;
        ctx.handler_index = 0;
        ctx.matched = false;
        let result = matcher::next_route(ctx);
        if let Err(e) = &result {
            debug!(
                request_id = %ctx.request_id(),
                method = %ctx.method(),
                path = %ctx.path(),
                error = %e,
                "Dispatch failed"
            );
        }
        result
    }
}

/// Handle to a freshly registered route.
#[derive(Clone, Copy)]
pub struct RouteRef<'r> {
    router: &'r Router,
    id: RouteId,
}

impl<'r> RouteRef<'r> {
    #[must_use]
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Name the route.
    ///
    /// # Errors
    ///
    /// Propagates [`Router::name`] failures.
    pub fn name(self, name: &str) -> Result<Self, RegistrationError> {
        self.router.name(self.id, name)?;
        Ok(self)
    }
}

/// Registration surface shared by [`Router`] and [`Group`].
pub trait Routing {
    /// Register `handlers` for `method` (or `USE`) on `path`.
    ///
    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn add_handlers(
        &self,
        method: &str,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<RouteRef<'_>, RegistrationError>;

    /// The configured method set.
    fn methods(&self) -> Vec<Method>;

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn add<I>(&self, method: &str, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.add_handlers(method, path, handlers.into_iter().collect())
    }

    /// Middleware on every method, matched by path prefix.
    ///
    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn use_at<I>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError>
    where
        I: IntoIterator<Item = Handler>,
    {
        self.add(METHOD_USE, path, handlers)
    }

    /// A terminal route for every configured method.
    ///
    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn all<I>(&self, path: &str, handlers: I) -> Result<Vec<RouteId>, RegistrationError>
    where
        I: IntoIterator<Item = Handler>,
    {
        let handlers: Vec<Handler> = handlers.into_iter().collect();
        self.methods()
            .iter()
            .map(|m| self.add_handlers(m.as_str(), path, handlers.clone()).map(|r| r.id()))
            .collect()
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn get<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::GET.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn head<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::HEAD.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn post<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::POST.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn put<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::PUT.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn delete<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::DELETE.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn connect<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::CONNECT.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn options<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::OPTIONS.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn trace<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::TRACE.as_str(), path, handlers)
    }

    /// # Errors
    ///
    /// See [`RegistrationError`].
    fn patch<I: IntoIterator<Item = Handler>>(&self, path: &str, handlers: I) -> Result<RouteRef<'_>, RegistrationError> {
        self.add(Method::PATCH.as_str(), path, handlers)
    }
}

impl Routing for Router {
    fn add_handlers(
        &self,
        method: &str,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<RouteRef<'_>, RegistrationError> {
        let id = self.register_route(method, path, handlers)?;
        Ok(RouteRef { router: self, id })
    }

    fn methods(&self) -> Vec<Method> {
        self.registry.lock().methods().to_vec()
    }
}

/// Routes registered under a shared path prefix.
pub struct Group<'r> {
    router: &'r Router,
    prefix: String,
}

impl<'r> Group<'r> {
    fn new(
        router: &'r Router,
        prefix: String,
        handlers: Vec<Handler>,
    ) -> Result<Self, RegistrationError> {
        if !handlers.is_empty() {
            router.register_route(METHOD_USE, &prefix, handlers)?;
        }
        Ok(Self { router, prefix })
    }

    #[must_use]
    pub fn prefix(&self) -> &str {
        &self.prefix
    }

    #[must_use]
    pub fn router(&self) -> &'r Router {
        self.router
    }

    /// A nested group; prefixes concatenate.
    ///
    /// # Errors
    ///
    /// Fails when the middleware registration fails.
    pub fn group<I>(&self, prefix: &str, handlers: I) -> Result<Group<'r>, RegistrationError>
    where
        I: IntoIterator<Item = Handler>,
    {
        Group::new(
            self.router,
            join_paths(&self.prefix, prefix),
            handlers.into_iter().collect(),
        )
    }
}

impl Routing for Group<'_> {
    fn add_handlers(
        &self,
        method: &str,
        path: &str,
        handlers: Vec<Handler>,
    ) -> Result<RouteRef<'_>, RegistrationError> {
        let full = join_paths(&self.prefix, path);
        let id = self.router.register_route(method, &full, handlers)?;
        Ok(RouteRef {
            router: self.router,
            id,
        })
    }

    fn methods(&self) -> Vec<Method> {
        self.router.methods()
    }
}
