//! Middleware helpers built on the `USE` route mechanism.
//!
//! A [`Middleware`] is adapted into an ordinary [`Handler`](crate::dispatcher::Handler)
//! with [`wrap`]; register it with `use_at` like any other middleware.

mod core;
mod tracing;

pub use self::core::{not_found, wrap, Middleware};
pub use self::tracing::TracingMiddleware;
