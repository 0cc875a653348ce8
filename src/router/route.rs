//! Route entity.

use std::fmt;
use std::path::Path;
use std::sync::Arc;

use serde::Serialize;

use super::pattern::{ParamRanges, PathPattern};
use crate::dispatcher::Handler;

/// Pseudo-method token for middleware registrations.
pub const METHOD_USE: &str = "USE";

/// Stable index of a route in the registry arena.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct RouteId(pub(crate) usize);

impl RouteId {
    #[must_use]
    pub fn index(self) -> usize {
        self.0
    }
}

impl fmt::Display for RouteId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "#{}", self.0)
    }
}

/// What a route does when it matches.
#[derive(Debug, Clone)]
pub enum RouteKind {
    /// Exact path match; sets the request's matched flag.
    Terminal,
    /// Prefix match; runs and may continue dispatch.
    Middleware,
    /// Belongs to a mounted sub-router; skipped by normal dispatch.
    Mount { prefix_match: bool },
    /// Static file delegate rooted at a directory; prefix match.
    Static { root: Arc<Path> },
}

impl RouteKind {
    /// Whether the route has middleware semantics.
    #[must_use]
    pub fn is_middleware(&self) -> bool {
        matches!(self, RouteKind::Middleware | RouteKind::Static { .. })
    }

    #[must_use]
    pub fn is_mount(&self) -> bool {
        matches!(self, RouteKind::Mount { .. })
    }

    pub(crate) fn prefix_match(&self) -> bool {
        match self {
            RouteKind::Terminal => false,
            RouteKind::Middleware | RouteKind::Static { .. } => true,
            RouteKind::Mount { prefix_match } => *prefix_match,
        }
    }

    /// Identical registrations of these kinds share one route.
    pub(crate) fn merges_with(&self, other: &RouteKind) -> bool {
        matches!(
            (self, other),
            (RouteKind::Terminal, RouteKind::Terminal) | (RouteKind::Middleware, RouteKind::Middleware)
        )
    }

    #[must_use]
    pub fn label(&self) -> &'static str {
        match self {
            RouteKind::Terminal => "terminal",
            RouteKind::Middleware => "middleware",
            RouteKind::Mount { .. } => "mount",
            RouteKind::Static { .. } => "static",
        }
    }
}

/// One registered (method, pattern, handler chain) association.
#[derive(Clone)]
pub struct Route {
    pub(crate) id: RouteId,
    pub(crate) method: String,
    pub(crate) path: String,
    pub(crate) pattern: PathPattern,
    pub(crate) kind: RouteKind,
    pub(crate) name: Option<String>,
    pub(crate) handlers: Vec<Handler>,
}

impl Route {
    #[must_use]
    pub fn id(&self) -> RouteId {
        self.id
    }

    /// Registered method token, `USE` for middleware.
    #[must_use]
    pub fn method(&self) -> &str {
        &self.method
    }

    /// Path as registered, with group and mount prefixes applied.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    #[must_use]
    pub fn pattern(&self) -> &PathPattern {
        &self.pattern
    }

    #[must_use]
    pub fn kind(&self) -> &RouteKind {
        &self.kind
    }

    #[must_use]
    pub fn name(&self) -> Option<&str> {
        self.name.as_deref()
    }

    #[must_use]
    pub fn handlers(&self) -> &[Handler] {
        &self.handlers
    }

    /// Apply the route match rule to a detection path.
    #[inline]
    pub fn matches(&self, path: &str, out: &mut ParamRanges) -> bool {
        self.pattern.matches(path, self.kind.prefix_match(), out)
    }

    #[must_use]
    pub fn info(&self) -> RouteInfo {
        RouteInfo {
            id: self.id.0,
            method: self.method.clone(),
            name: self.name.clone(),
            path: self.path.clone(),
            pattern: self.pattern.source().to_string(),
            kind: self.kind.label(),
            params: self
                .pattern
                .param_names()
                .iter()
                .map(|n| n.to_string())
                .collect(),
            handlers: self.handlers.len(),
        }
    }
}

impl fmt::Debug for Route {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Route")
            .field("id", &self.id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("kind", &self.kind)
            .field("name", &self.name)
            .field("handlers", &self.handlers.len())
            .finish()
    }
}

/// Serializable description of a route, used for listings.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
pub struct RouteInfo {
    pub id: usize,
    pub method: String,
    pub name: Option<String>,
    pub path: String,
    pub pattern: String,
    pub kind: &'static str,
    pub params: Vec<String>,
    pub handlers: usize,
}
