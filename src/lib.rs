//! # triroute
//!
//! **triroute** is an embeddable HTTP request router: register handler
//! chains against path patterns and methods, then resolve requests with
//! Express-style "next" semantics.
//!
//! ## Overview
//!
//! A router keeps one ordered route stack per HTTP method. Registration
//! order is match priority. For dispatch, each stack is split into buckets
//! keyed by the first three bytes of a route's literal prefix, so a
//! request only scans the routes that could match it while still seeing
//! them in registration order.
//!
//! ## Architecture
//!
//! The library is organized into several key modules:
//!
//! - **[`router`]** - Path compiler, route registry, dispatch index,
//!   request matcher and the static file delegate
//! - **[`dispatcher`]** - Per-request context, handler type and response builder
//! - **[`server`]** - Adapter from `http::Request` to dispatch and from
//!   dispatch errors to responses
//! - **[`middleware`]** - Middleware trait, request tracing and fallbacks
//! - **[`static_files`]** - Filesystem backend with caching, ranges and gzip
//! - **[`config`]** - Router configuration from files and environment
//! - **[`manifest`]** - Declarative route manifests used by the `triroute` binary
//!
//! ### Request Flow
//!
//! ```mermaid
//! sequenceDiagram
//!     participant Client
//!     participant Server as Router::handle
//!     participant Matcher as Matcher
//!     participant MW as Middleware (USE)
//!     participant Route as Terminal route
//!
//!     Client->>Server: GET /api/users/42
//!     Server->>Server: decode path, build Ctx
//!     Server->>Matcher: dispatch(ctx)
//!     Matcher->>Matcher: bucket "/ap", scan from cursor
//!     Matcher->>MW: first handler of USE /api
//!     MW->>Matcher: ctx.next()
//!     Matcher->>Route: first handler of GET /api/users/:id
//!     Route-->>Server: Ok, response written
//!     alt nothing matched
//!         Matcher-->>Server: NotFound / MethodNotAllowed
//!         Server->>Server: error handler renders 404 / 405
//!     end
//!     Server-->>Client: http::Response
//! ```
//!
//! ## Quick Start
//!
//! ```rust
//! use bytes::Bytes;
//! use triroute::dispatcher::handler;
//! use triroute::middleware::{wrap, TracingMiddleware};
//! use triroute::router::{Router, Routing};
//!
//! let router = Router::new();
//! router.use_at("/", [wrap(TracingMiddleware)]).unwrap();
//! router
//!     .get("/hello/:name", [handler(|ctx| {
//!         let greeting = format!("hello {}", ctx.param("name").unwrap_or("?"));
//!         ctx.send_string(greeting);
//!         Ok(())
//!     })])
//!     .unwrap();
//!
//! let req = http::Request::get("/hello/world").body(Bytes::new()).unwrap();
//! let res = router.handle(req);
//! assert_eq!(res.status(), 200);
//! assert_eq!(res.body().as_ref(), b"hello world");
//! ```
//!
//! ## Concurrency
//!
//! Registration takes a `parking_lot` mutex and marks the index dirty.
//! The first dispatch afterwards rebuilds the index and publishes it with
//! `arc-swap`; requests hold an `Arc` to the snapshot they started with
//! and never take a lock.

pub mod cli;
pub mod config;
pub mod dispatcher;
pub mod error;
pub mod ids;
pub mod logging;
pub mod manifest;
pub mod middleware;
pub mod router;
pub mod server;
pub mod static_files;

pub use config::RouterConfig;
pub use error::{DispatchError, MissReason, RegistrationError};
pub use router::{Router, Routing};
