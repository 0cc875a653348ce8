//! Request context - hot path for handler chains.

#![deny(clippy::inefficient_to_string)]
#![deny(clippy::format_push_string)]
#![deny(clippy::unnecessary_to_owned)]

use std::fmt;
use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, CONTENT_TYPE};
use http::{Extensions, HeaderMap, Method, StatusCode, Uri};
use serde::Serialize;

use crate::error::DispatchError;
use crate::ids::RequestId;
use crate::router::matcher::{self, Snapshot};
use crate::router::{detection_path, ParamRanges, Route, RouteId};

/// A request handler. Handlers are shared between requests.
pub type Handler = Arc<dyn Fn(&mut Ctx) -> Result<(), DispatchError> + Send + Sync>;

/// Wrap a closure into a [`Handler`].
pub fn handler<F>(f: F) -> Handler
where
    F: Fn(&mut Ctx) -> Result<(), DispatchError> + Send + Sync + 'static,
{
    Arc::new(f)
}

/// Which routes a scan considers.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ScanMode {
    /// Every route except mounts.
    Normal,
    /// Mount routes only.
    Mounts,
}

/// Response under construction.
#[derive(Debug, Clone)]
pub struct Response {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
}

impl Default for Response {
    fn default() -> Self {
        Self {
            status: StatusCode::OK,
            headers: HeaderMap::new(),
            body: Bytes::new(),
        }
    }
}

impl Response {
    #[must_use]
    pub fn into_http(self) -> http::Response<Bytes> {
        let mut res = http::Response::new(self.body);
        *res.status_mut() = self.status;
        *res.headers_mut() = self.headers;
        res
    }
}

/// Per-request routing context.
pub struct Ctx {
    pub(crate) snapshot: Arc<Snapshot>,
    request_id: RequestId,
    method: Method,
    pub(crate) method_slot: Option<usize>,
    uri: Uri,
    path: String,
    pub(crate) detection_path: String,
    headers: HeaderMap,
    body: Bytes,
    pub(crate) mode: ScanMode,
    pub(crate) cursor: usize,
    pub(crate) route: Option<RouteId>,
    pub(crate) handler_index: usize,
    pub(crate) matched: bool,
    pub(crate) params: ParamRanges,
    response: Response,
    locals: Extensions,
}

impl Ctx {
    /// Build a context for an already decoded path.
    pub(crate) fn new(snapshot: Arc<Snapshot>, method: Method, uri: Uri, path: String) -> Self {
        let path = if path.starts_with('/') {
            path
        } else {
            let mut p = String::with_capacity(path.len() + 1);
            p.push('/');
            p.push_str(&path);
            p
        };
        let detection_path = detection_path(snapshot.config(), &path);
        let method_slot = snapshot.method_slot(&method);
        Self {
            snapshot,
            request_id: RequestId::new(),
            method,
            method_slot,
            uri,
            path,
            detection_path,
            headers: HeaderMap::new(),
            body: Bytes::new(),
            mode: ScanMode::Normal,
            cursor: 0,
            route: None,
            handler_index: 0,
            matched: false,
            params: ParamRanges::new(),
            response: Response::default(),
            locals: Extensions::new(),
        }
    }

    pub(crate) fn with_request(mut self, headers: HeaderMap, body: Bytes) -> Self {
        self.request_id =
            RequestId::from_header_or_new(headers.get("x-request-id").and_then(|v| v.to_str().ok()));
        self.headers = headers;
        self.body = body;
        self
    }

    #[must_use]
    pub fn request_id(&self) -> RequestId {
        self.request_id
    }

    #[must_use]
    pub fn method(&self) -> &Method {
        &self.method
    }

    #[must_use]
    pub fn uri(&self) -> &Uri {
        &self.uri
    }

    /// Request path as matched, original case.
    #[must_use]
    pub fn path(&self) -> &str {
        &self.path
    }

    /// Path after case folding and trailing-slash normalization.
    #[must_use]
    pub fn detection_path(&self) -> &str {
        &self.detection_path
    }

    #[must_use]
    pub fn query(&self) -> Option<&str> {
        self.uri.query()
    }

    #[must_use]
    pub fn headers(&self) -> &HeaderMap {
        &self.headers
    }

    #[must_use]
    pub fn header(&self, name: &str) -> Option<&str> {
        self.headers.get(name).and_then(|v| v.to_str().ok())
    }

    #[must_use]
    pub fn body(&self) -> &Bytes {
        &self.body
    }

    /// The route whose handler is currently running.
    #[must_use]
    pub fn route(&self) -> Option<&Route> {
        self.route.and_then(|id| self.snapshot.route(id))
    }

    /// Whether a non-middleware route has matched this request.
    #[must_use]
    pub fn matched(&self) -> bool {
        self.matched
    }

    /// Captured value of a path parameter of the current route.
    #[must_use]
    pub fn param(&self, name: &str) -> Option<&str> {
        let route = self.route()?;
        let i = route
            .pattern()
            .param_names()
            .iter()
            .position(|n| n.as_ref() == name)?;
        let (start, end) = *self.params.get(i)?;
        self.path.get(start..end)
    }

    /// Captured parameters of the current route in declaration order.
    pub fn params(&self) -> impl Iterator<Item = (&str, &str)> + '_ {
        let names = self.route().map_or(&[][..], |r| r.pattern().param_names());
        names.iter().zip(self.params.iter()).filter_map(|(n, (s, e))| {
            self.path.get(*s..*e).map(|v| (n.as_ref(), v))
        })
    }

    /// Request-scoped values shared between the handlers of one request.
    #[must_use]
    pub fn locals(&self) -> &Extensions {
        &self.locals
    }

    pub fn locals_mut(&mut self) -> &mut Extensions {
        &mut self.locals
    }

    #[must_use]
    pub fn response(&self) -> &Response {
        &self.response
    }

    pub fn response_mut(&mut self) -> &mut Response {
        &mut self.response
    }

    pub fn take_response(&mut self) -> Response {
        std::mem::take(&mut self.response)
    }

    /// Drop any partially written response.
    pub fn reset_response(&mut self) {
        self.response = Response::default();
    }

    pub fn status(&mut self, status: StatusCode) -> &mut Self {
        self.response.status = status;
        self
    }

    pub fn set_header(&mut self, name: HeaderName, value: HeaderValue) -> &mut Self {
        self.response.headers.insert(name, value);
        self
    }

    pub fn send(&mut self, body: impl Into<Bytes>) -> &mut Self {
        self.response.body = body.into();
        self
    }

    /// Send a plain-text body, defaulting the content type.
    pub fn send_string(&mut self, body: impl Into<String>) -> &mut Self {
        if !self.response.headers.contains_key(CONTENT_TYPE) {
            self.response.headers.insert(
                CONTENT_TYPE,
                HeaderValue::from_static("text/plain; charset=utf-8"),
            );
        }
        self.response.body = Bytes::from(body.into());
        self
    }

    /// Serialize `value` as the JSON body.
    ///
    /// # Errors
    ///
    /// Fails with a 500 status error when serialization fails.
    pub fn json<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), DispatchError> {
        let body = serde_json::to_vec(value).map_err(|e| {
            DispatchError::status(StatusCode::INTERNAL_SERVER_ERROR, e.to_string())
        })?;
        self.response
            .headers
            .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
        self.response.body = Bytes::from(body);
        Ok(())
    }

    /// Run the next handler of the current route, or resume scanning for
    /// the next matching route once the chain is exhausted.
    ///
    /// # Errors
    ///
    /// Propagates handler errors; fails with `NotFound` or
    /// `MethodNotAllowed` when no further route matches.
    pub fn next(&mut self) -> Result<(), DispatchError> {
        self.handler_index += 1;
        let next = self
            .route()
            .and_then(|r| r.handlers().get(self.handler_index))
            .map(Arc::clone);
        match next {
            Some(h) => h(self),
            None => matcher::next_route(self).map(|_| ()),
        }
    }
}

impl fmt::Debug for Ctx {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("Ctx")
            .field("request_id", &self.request_id)
            .field("method", &self.method)
            .field("path", &self.path)
            .field("route", &self.route)
            .field("handler_index", &self.handler_index)
            .field("matched", &self.matched)
            .field("status", &self.response.status)
            .finish()
    }
}
