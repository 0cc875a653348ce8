use std::time::Duration;

use tracing::{debug, error, info_span, warn, Span};

use super::Middleware;
use crate::dispatcher::Ctx;
use crate::error::DispatchError;

/// Opens a `request` span and logs each completed request, at debug for
/// 2xx/3xx, warn for 4xx and error for 5xx.
pub struct TracingMiddleware;

impl Middleware for TracingMiddleware {
    fn span(&self, ctx: &Ctx) -> Option<Span> {
        Some(info_span!(
            "request",
            request_id = %ctx.request_id(),
            method = %ctx.method(),
            path = %ctx.path(),
        ))
    }

    fn after(&self, ctx: &Ctx, err: Option<&DispatchError>, latency: Duration) {
        let status = err.map_or(ctx.response().status, DispatchError::status_code);
        let route = ctx.route().map(|r| r.pattern().source().to_string());
        let latency_us = latency.as_micros();
        if status.is_server_error() {
            error!(status = status.as_u16(), latency_us, route = ?route, error = ?err.map(ToString::to_string), "Request completed");
        } else if status.is_client_error() {
            warn!(status = status.as_u16(), latency_us, route = ?route, "Request completed");
        } else {
            debug!(status = status.as_u16(), latency_us, route = ?route, "Request completed");
        }
    }
}
