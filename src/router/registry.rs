//! Route registry: one arena of routes plus per-method stacks of route ids.
//!
//! Stack order is registration order, which is also match priority. A
//! middleware (`USE`) route is stored once in the arena and its id is
//! pushed onto every method stack.

use std::borrow::Cow;
use std::sync::Arc;

use http::Method;
use smallvec::SmallVec;
use tracing::debug;

use super::pattern::PathPattern;
use super::route::{Route, RouteId, RouteKind, METHOD_USE};
use crate::config::RouterConfig;
use crate::dispatcher::Handler;
use crate::error::RegistrationError;

pub(crate) type Slots = SmallVec<[usize; 16]>;

/// A fully resolved registration, ready to be pushed.
pub(crate) struct Registration {
    pub method: String,
    pub slots: Slots,
    pub path: String,
    pub pretty: String,
    pub kind: RouteKind,
    pub handlers: Vec<Handler>,
}

pub struct Registry {
    config: RouterConfig,
    methods: Vec<Method>,
    routes: Vec<Arc<Route>>,
    stacks: Vec<Vec<RouteId>>,
    dirty: bool,
}

impl Registry {
    #[must_use]
    pub fn new(config: RouterConfig) -> Self {
        let methods = config.normalized_methods();
        let stacks = vec![Vec::new(); methods.len()];
        Self {
            config,
            methods,
            routes: Vec::new(),
            stacks,
            dirty: true,
        }
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

    /// Configured methods; a method's position is its stack slot.
    #[must_use]
    pub fn methods(&self) -> &[Method] {
        &self.methods
    }

    #[must_use]
    pub fn method_slot(&self, method: &Method) -> Option<usize> {
        self.methods.iter().position(|m| m == method)
    }

    #[must_use]
    pub fn route(&self, id: RouteId) -> Option<&Route> {
        self.routes.get(id.0).map(|r| r.as_ref())
    }

    /// Route ids registered for a method slot, in match-priority order.
    #[must_use]
    pub fn stack(&self, slot: usize) -> &[RouteId] {
        self.stacks.get(slot).map_or(&[], |s| s.as_slice())
    }

    /// All routes in arena order.
    pub fn routes(&self) -> impl Iterator<Item = &Route> {
        self.routes.iter().map(|r| r.as_ref())
    }

    #[must_use]
    pub fn len(&self) -> usize {
        self.routes.len()
    }

    #[must_use]
    pub fn is_empty(&self) -> bool {
        self.routes.is_empty()
    }

    #[must_use]
    pub fn is_dirty(&self) -> bool {
        self.dirty
    }

    pub(crate) fn mark_clean(&mut self) {
        self.dirty = false;
    }

    pub(crate) fn arena(&self) -> &[Arc<Route>] {
        &self.routes
    }

    /// Returns `(path, pretty)`: the raw path with a leading slash and the
    /// normalized form used for matching.
    ///
    /// Case folding in `pretty` only touches literal segments; parameter
    /// names keep the spelling they were declared with.
    #[must_use]
    pub fn normalize(&self, raw: &str) -> (String, String) {
        let path = match raw {
            "" => "/".to_string(),
            p if p.starts_with('/') => p.to_string(),
            p => format!("/{p}"),
        };
        let pretty = pattern_path(&self.config, &path);
        (path, pretty)
    }

    /// Register a route by method token. `USE` registers middleware on every method.
    ///
    /// # Errors
    ///
    /// See [`RegistrationError`].
    pub fn register(
        &mut self,
        method: &str,
        raw_path: &str,
        handlers: Vec<Handler>,
    ) -> Result<RouteId, RegistrationError> {
        let kind = if method.eq_ignore_ascii_case(METHOD_USE) {
            RouteKind::Middleware
        } else {
            RouteKind::Terminal
        };
        self.register_kind(method, raw_path, kind, handlers)
    }

    pub(crate) fn register_kind(
        &mut self,
        method: &str,
        raw_path: &str,
        kind: RouteKind,
        handlers: Vec<Handler>,
    ) -> Result<RouteId, RegistrationError> {
        let (method, slots) = self.resolve_method(method)?;
        let (path, pretty) = self.normalize(raw_path);
        self.push(Registration {
            method,
            slots,
            path,
            pretty,
            kind,
            handlers,
        })
    }

    /// Upper-case a method token and resolve the stack slots it registers into.
    pub(crate) fn resolve_method(&self, method: &str) -> Result<(String, Slots), RegistrationError> {
        let token = method.to_ascii_uppercase();
        if token == METHOD_USE {
            return Ok((token, (0..self.methods.len()).collect()));
        }
        let slot = self
            .methods
            .iter()
            .position(|m| m.as_str() == token)
            .ok_or_else(|| RegistrationError::InvalidMethod {
                method: method.to_string(),
            })?;
        let mut slots = Slots::new();
        slots.push(slot);
        Ok((token, slots))
    }

    pub(crate) fn push(&mut self, reg: Registration) -> Result<RouteId, RegistrationError> {
        if reg.handlers.is_empty() && !reg.kind.is_mount() {
            return Err(RegistrationError::EmptyHandlerChain { path: reg.path });
        }
        let pattern = PathPattern::compile(&reg.pretty)?;

        if let Some(id) = self.find_mergeable(&reg) {
            let added = reg.handlers.len();
            let route = Arc::make_mut(&mut self.routes[id.0]);
            route.handlers.extend(reg.handlers);
            self.dirty = true;
            debug!(
                route_id = id.0,
                method = %reg.method,
                path = %reg.pretty,
                added_handlers = added,
                total_handlers = route.handlers.len(),
                "Handlers appended to existing route"
            );
            return Ok(id);
        }

        let id = RouteId(self.routes.len());
        debug!(
            route_id = id.0,
            method = %reg.method,
            path = %reg.path,
            pattern = %pattern.source(),
            kind = reg.kind.label(),
            handlers = reg.handlers.len(),
            "Route registered"
        );
        for slot in &reg.slots {
            self.stacks[*slot].push(id);
        }
        self.routes.push(Arc::new(Route {
            id,
            method: reg.method,
            path: reg.path,
            pattern,
            kind: reg.kind,
            name: None,
            handlers: reg.handlers,
        }));
        self.dirty = true;
        Ok(id)
    }

    fn find_mergeable(&self, reg: &Registration) -> Option<RouteId> {
        let slot = *reg.slots.first()?;
        self.stacks[slot].iter().copied().find(|id| {
            let existing = &self.routes[id.0];
            existing.kind.merges_with(&reg.kind)
                && existing.method == reg.method
                && existing.pattern.source() == reg.pretty
        })
    }

    pub(crate) fn set_name(&mut self, id: RouteId, name: &str) -> Result<(), RegistrationError> {
        let route = self
            .routes
            .get_mut(id.0)
            .ok_or(RegistrationError::UnknownRoute { id: id.0 })?;
        Arc::make_mut(route).name = Some(name.to_string());
        self.dirty = true;
        Ok(())
    }

    /// Re-register every route of `sub` under `prefix` as mount routes.
    pub(crate) fn absorb_mount(&mut self, prefix: &str, sub: &Registry) -> Result<usize, RegistrationError> {
        let mut count = 0;
        for route in sub.routes() {
            let slots: Slots = sub
                .methods
                .iter()
                .enumerate()
                .filter(|(slot, _)| sub.stacks[*slot].contains(&route.id))
                .filter_map(|(_, m)| self.method_slot(m))
                .collect();
            if slots.is_empty() {
                continue;
            }
            let (path, pretty) = self.normalize(&join_paths(prefix, &route.path));
            let id = self.push(Registration {
                method: route.method.clone(),
                slots,
                path,
                pretty,
                kind: RouteKind::Mount {
                    prefix_match: route.kind.prefix_match(),
                },
                handlers: route.handlers.clone(),
            })?;
            if let Some(name) = route.name() {
                self.set_name(id, name)?;
            }
            count += 1;
        }
        Ok(count)
    }
}

/// Case-fold and trailing-slash normalize a path per config.
///
/// Only ASCII is folded so byte offsets into the original path stay valid.
#[must_use]
pub fn detection_path(config: &RouterConfig, path: &str) -> String {
    let mut out = if config.case_sensitive {
        path.to_string()
    } else {
        path.to_ascii_lowercase()
    };
    if !config.strict_routing && out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Normalize a registered pattern: literal segments are case-folded like
/// [`detection_path`], `:name` and `*name` segments are kept verbatim.
#[must_use]
pub fn pattern_path(config: &RouterConfig, pattern: &str) -> String {
    let mut out = if config.case_sensitive {
        pattern.to_string()
    } else {
        pattern
            .split('/')
            .map(|part| {
                if part.starts_with(':') || part.starts_with('*') {
                    Cow::Borrowed(part)
                } else {
                    Cow::Owned(part.to_ascii_lowercase())
                }
            })
            .collect::<Vec<_>>()
            .join("/")
    };
    if !config.strict_routing && out.len() > 1 && out.ends_with('/') {
        out.pop();
    }
    out
}

/// Join a group or mount prefix with a route path.
#[must_use]
pub fn join_paths(prefix: &str, path: &str) -> String {
    if path.is_empty() {
        return prefix.to_string();
    }
    let prefix = prefix.trim_end_matches('/');
    if path.starts_with('/') {
        format!("{prefix}{path}")
    } else {
        format!("{prefix}/{path}")
    }
}
