//! Request matcher - hot path for request routing.
//!
//! A [`Snapshot`] is the frozen, read-only view of the registry that
//! requests route against: the route arena, the per-method stacks and
//! the [`DispatchIndex`] built from them. Snapshots are published
//! atomically, so a request never sees a partially rebuilt index.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::sync::Arc;
use std::time::{Duration, Instant};

use http::Method;
use tracing::{debug, warn};

use super::index::DispatchIndex;
use super::pattern::ParamRanges;
use super::registry::{detection_path, Registry};
use super::route::{Route, RouteId};
use crate::config::RouterConfig;
use crate::dispatcher::{Ctx, ScanMode};
use crate::error::DispatchError;

/// Bucket scans slower than this are logged at warn.
const SLOW_SCAN: Duration = Duration::from_micros(500);

/// Immutable routing state shared by in-flight requests.
#[derive(Debug)]
pub struct Snapshot {
    config: RouterConfig,
    methods: Vec<Method>,
    routes: Vec<Arc<Route>>,
    stacks: Vec<Vec<RouteId>>,
    index: DispatchIndex,
}

impl Snapshot {
    pub(crate) fn capture(registry: &Registry) -> Self {
        Self {
            config: registry.config().clone(),
            methods: registry.methods().to_vec(),
            routes: registry.arena().to_vec(),
            stacks: (0..registry.methods().len())
                .map(|slot| registry.stack(slot).to_vec())
                .collect(),
            index: DispatchIndex::build(registry),
        }
    }

    #[must_use]
    pub fn config(&self) -> &RouterConfig {
        &self.config
    }

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

    #[must_use]
    pub fn routes(&self) -> &[Arc<Route>] {
        &self.routes
    }

    #[must_use]
    pub fn stack(&self, slot: usize) -> &[RouteId] {
        self.stacks.get(slot).map_or(&[], |s| s.as_slice())
    }

    #[must_use]
    pub fn index(&self) -> &DispatchIndex {
        &self.index
    }

    /// First non-mount route matching the request, using the bucket index.
    #[must_use]
    pub fn first_match(&self, method: &Method, path: &str) -> Option<RouteId> {
        let slot = self.method_slot(method)?;
        let detection = detection_path(&self.config, path);
        self.first_in(self.index.bucket(slot, &detection), &detection)
    }

    /// First non-mount route matching the request by scanning the whole
    /// method stack. Reference semantics for [`Snapshot::first_match`].
    #[must_use]
    pub fn first_match_linear(&self, method: &Method, path: &str) -> Option<RouteId> {
        let slot = self.method_slot(method)?;
        let detection = detection_path(&self.config, path);
        self.first_in(self.stack(slot), &detection)
    }

    fn first_in(&self, candidates: &[RouteId], detection: &str) -> Option<RouteId> {
        let mut scratch = ParamRanges::new();
        candidates.iter().copied().find(|id| {
            let route = &self.routes[id.0];
            !route.kind().is_mount() && route.matches(detection, &mut scratch)
        })
    }

    /// Methods other than `slot` with a terminal route matching the path.
    fn allowed_methods(&self, slot: usize, detection: &str) -> Vec<Method> {
        let mut scratch = ParamRanges::new();
        self.methods
            .iter()
            .enumerate()
            .filter(|(other, _)| *other != slot)
            .filter(|(other, _)| {
                self.index.bucket(*other, detection).iter().any(|id| {
                    let route = &self.routes[id.0];
                    !route.kind().is_mount()
                        && !route.kind().is_middleware()
                        && route.matches(detection, &mut scratch)
                })
            })
            .map(|(_, m)| m.clone())
            .collect()
    }
}

/// Scan forward from the request's cursor and run the first handler of
/// the next matching route.
///
/// Returns `Ok(true)` once a route matched and its first handler
/// returned successfully.
pub(crate) fn next_route(ctx: &mut Ctx) -> Result<bool, DispatchError> {
    let snapshot = Arc::clone(&ctx.snapshot);
    let Some(slot) = ctx.method_slot else {
        return Err(DispatchError::NotFound {
            method: ctx.method().clone(),
            path: ctx.path().to_string(),
        });
    };
    let bucket = snapshot.index.bucket(slot, &ctx.detection_path);
    let want_mounts = ctx.mode == ScanMode::Mounts;
    let mut scratch = ParamRanges::new();
    let start = Instant::now();
    let from = ctx.cursor;

    while let Some(id) = bucket.get(ctx.cursor).copied() {
        ctx.cursor += 1;
        let route = &snapshot.routes[id.0];
        if route.kind().is_mount() != want_mounts {
            continue;
        }
        if !route.matches(&ctx.detection_path, &mut scratch) {
            continue;
        }

        warn_if_slow(ctx, start, ctx.cursor - from);
        std::mem::swap(&mut ctx.params, &mut scratch);
        ctx.route = Some(id);
        if !route.kind().is_middleware() {
            ctx.matched = true;
        }
        ctx.handler_index = 0;
        debug!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            route_id = id.0,
            route_pattern = %route.pattern().source(),
            kind = route.kind().label(),
            "Route matched"
        );

        if let Some(first) = route.handlers().first() {
            let first = Arc::clone(first);
            first(ctx)?;
        }
        return Ok(true);
    }

    warn_if_slow(ctx, start, ctx.cursor - from);
    let allowed = if !ctx.matched && !want_mounts {
        snapshot.allowed_methods(slot, &ctx.detection_path)
    } else {
        Vec::new()
    };
    if allowed.is_empty() {
        Err(DispatchError::NotFound {
            method: ctx.method().clone(),
            path: ctx.path().to_string(),
        })
    } else {
        Err(DispatchError::MethodNotAllowed { allowed })
    }
}

fn warn_if_slow(ctx: &Ctx, start: Instant, scanned: usize) {
    let elapsed = start.elapsed();
    if elapsed > SLOW_SCAN {
        warn!(
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
            scanned_routes = scanned,
            elapsed_us = elapsed.as_micros(),
            "Slow route scan"
        );
    }
}
