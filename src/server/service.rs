use std::sync::Arc;

use bytes::Bytes;
use http::header::{HeaderName, HeaderValue, ALLOW};
use http::{Request, StatusCode};
use serde_json::json;
use tracing::{error, warn};

use super::request::decode_path;
use super::response::{error_body, write_json_error};
use crate::dispatcher::Ctx;
use crate::error::DispatchError;
use crate::router::Router;

/// Turns a dispatch error into a response on the request context.
pub type ErrorHandler = Arc<dyn Fn(&mut Ctx, &DispatchError) + Send + Sync>;

const X_REQUEST_ID: HeaderName = HeaderName::from_static("x-request-id");

/// `NotFound` → 404 `Cannot GET /path`, `MethodNotAllowed` → 405 with an
/// `Allow` header, `Status` → its own status, anything else → 500.
#[must_use]
pub fn default_error_handler() -> ErrorHandler {
    Arc::new(|ctx: &mut Ctx, err: &DispatchError| {
        write_json_error(ctx.response_mut(), err.status_code(), &error_body(err));
        if let DispatchError::MethodNotAllowed { allowed } = err {
            let allow = allowed
                .iter()
                .map(|m| m.as_str())
                .collect::<Vec<_>>()
                .join(", ");
            if let Ok(value) = HeaderValue::from_str(&allow) {
                ctx.set_header(ALLOW, value);
            }
        }
    })
}

impl Router {
    /// Replace the handler that renders dispatch errors.
    pub fn set_error_handler(&self, handler: ErrorHandler) {
        *self.error_handler.write() = handler;
    }

    /// Route a complete request and produce its response.
    ///
    /// Unknown method tokens are answered with 400 without dispatching.
    /// Every other outcome is either a handler-built response or the
    /// error handler's rendering of the dispatch error.
    pub fn handle(&self, req: Request<Bytes>) -> http::Response<Bytes> {
        let (parts, body) = req.into_parts();
        let snapshot = self.snapshot();

        if snapshot.method_slot(&parts.method).is_none() {
            warn!(method = %parts.method, path = %parts.uri.path(), "Invalid http method");
            let mut res = crate::dispatcher::Response::default();
            write_json_error(
                &mut res,
                StatusCode::BAD_REQUEST,
                &json!({ "error": "Invalid http method" }),
            );
            return res.into_http();
        }

        let path = decode_path(parts.uri.path(), snapshot.config().unescape_path).into_owned();
        let is_head = parts.method == http::Method::HEAD;
        let mut ctx = Ctx::new(snapshot, parts.method, parts.uri, path)
            .with_request(parts.headers, body);

        if let Err(err) = self.dispatch(&mut ctx) {
            let status = err.status_code();
            if status.is_server_error() {
                error!(
                    request_id = %ctx.request_id(),
                    method = %ctx.method(),
                    path = %ctx.path(),
                    error = %err,
                    "Request failed"
                );
            }
            let handler = Arc::clone(&self.error_handler.read());
            ctx.reset_response();
            handler(&mut ctx, &err);
        }

        if let Ok(id) = HeaderValue::from_str(&ctx.request_id().to_string()) {
            ctx.set_header(X_REQUEST_ID, id);
        }
        let mut res = ctx.take_response();
        if is_head {
            res.body = Bytes::new();
        }
        res.into_http()
    }
}
