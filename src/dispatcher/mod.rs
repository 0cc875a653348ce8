//! # Dispatcher Module
//!
//! The dispatcher module holds the request-scoped side of routing: the
//! [`Ctx`] a request carries through its handler chain, the [`Handler`]
//! type routes store, and the [`Response`] handlers build.
//!
//! ## Handler Chains
//!
//! Every route owns an ordered list of handlers. When a route matches,
//! its first handler runs. A handler can:
//!
//! - finish the request by writing a response and returning `Ok(())`
//! - fail with a [`DispatchError`](crate::error::DispatchError)
//! - call [`Ctx::next`] to run the next handler of the same route, or,
//!   once the route's handlers are exhausted, resume scanning the bucket
//!   for the next matching route
//!
//! ```rust
//! use triroute::dispatcher::handler;
//! use triroute::router::{Router, Routing};
//!
//! let router = Router::new();
//! router
//!     .use_at("/", [handler(|ctx| {
//!         ctx.locals_mut().insert(42u32);
//!         ctx.next()
//!     })])
//!     .unwrap();
//! router
//!     .get("/users/:id", [handler(|ctx| {
//!         let id = ctx.param("id").unwrap_or_default().to_string();
//!         ctx.send_string(id);
//!         Ok(())
//!     })])
//!     .unwrap();
//! ```
//!
//! ## Request State
//!
//! The scan cursor, the captured parameter ranges and the response under
//! construction live in the `Ctx`, so concurrent requests never share
//! mutable state. Captured parameters are byte ranges into the request
//! path kept in a `SmallVec`, so matching does not allocate for routes
//! with up to [`MAX_INLINE_PARAMS`](crate::router::MAX_INLINE_PARAMS)
//! parameters.

mod core;

pub use self::core::{handler, Ctx, Handler, Response};
pub(crate) use self::core::ScanMode;
