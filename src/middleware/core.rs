use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use http::StatusCode;
use tracing::Span;

use crate::dispatcher::{handler, Ctx, Handler};
use crate::error::DispatchError;

pub trait Middleware: Send + Sync {
    /// Span entered for the rest of the chain.
    fn span(&self, _ctx: &Ctx) -> Option<Span> {
        None
    }
    /// Returning an error short-circuits the chain.
    fn before(&self, _ctx: &mut Ctx) -> Option<DispatchError> {
        None
    }
    fn after(&self, _ctx: &Ctx, _error: Option<&DispatchError>, _latency: Duration) {}
}

/// Adapt a [`Middleware`] into a handler that runs `before`, the rest of
/// the dispatch via [`Ctx::next`], then `after`.
pub fn wrap<M: Middleware + 'static>(middleware: M) -> Handler {
    let middleware = Arc::new(middleware);
    handler(move |ctx: &mut Ctx| {
        let span = middleware.span(ctx).unwrap_or_else(Span::none);
        let _entered = span.enter();
        if let Some(err) = middleware.before(ctx) {
            middleware.after(ctx, Some(&err), Duration::ZERO);
            return Err(err);
        }
        let start = Instant::now();
        let result = ctx.next();
        middleware.after(ctx, result.as_ref().err(), start.elapsed());
        result
    })
}

/// Terminal fallback answering 404 with `body`.
pub fn not_found(body: impl Into<Bytes>) -> Handler {
    let body: Bytes = body.into();
    handler(move |ctx: &mut Ctx| {
        ctx.status(StatusCode::NOT_FOUND).send(body.clone());
        Ok(())
    })
}
