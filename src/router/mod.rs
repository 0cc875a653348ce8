//! # Router Module
//!
//! The router module turns registered path patterns into a dispatch
//! structure and resolves incoming requests against it.
//!
//! ## Overview
//!
//! The router is responsible for:
//! - Compiling path patterns (`/users/:id`, `/files/*`) into segment matchers
//! - Keeping per-method route stacks in registration order
//! - Indexing each stack by a 3-byte path prefix so a request only scans
//!   the routes that could possibly match it
//! - Resolving requests with middleware "next" semantics
//! - Delegating path prefixes to a static file server
//!
//! ## Architecture
//!
//! The router uses a two-phase approach:
//!
//! 1. **Registration**: Routes are compiled and appended to the
//!    [`Registry`]. Registering the same method and path twice appends the
//!    new handlers to the existing route. Every registration marks the
//!    dispatch index dirty.
//!
//! 2. **Dispatch**: On the first request after a registration the
//!    [`DispatchIndex`] is rebuilt and published as an immutable
//!    [`Snapshot`]. Requests scan the bucket for the first 3 bytes of
//!    their path; routes whose literal prefix is shorter than 3 bytes
//!    live in every bucket, so the bucketed scan visits candidates in the
//!    same order as a scan of the whole stack.
//!
//! ## Example
//!
//! ```rust
//! use triroute::dispatcher::handler;
//! use triroute::router::{Router, Routing};
//! use http::Method;
//!
//! let router = Router::new();
//! router
//!     .get("/pets/:id", [handler(|ctx| {
//!         let id = ctx.param("id").unwrap_or_default().to_string();
//!         ctx.send_string(id);
//!         Ok(())
//!     })])
//!     .unwrap();
//!
//! let mut ctx = router.context(Method::GET, "/pets/42");
//! assert!(router.dispatch(&mut ctx).unwrap());
//! assert_eq!(ctx.response().body.as_ref(), b"42");
//! ```
//!
//! ## Performance
//!
//! - Matching walks segments byte by byte and records parameters as
//!   ranges into the request path, without allocating for up to
//!   [`MAX_INLINE_PARAMS`] parameters
//! - Bucket lookup is a single hash lookup on a `[u8; 3]` key
//! - Readers never take a lock once the index is built

mod core;
mod index;
pub(crate) mod matcher;
mod pattern;
mod registry;
mod route;
mod static_delegate;

pub use self::core::{Group, RouteRef, Router, Routing};
pub use index::{bucket_key, DispatchIndex, BUCKET_KEY_LEN};
pub use matcher::Snapshot;
pub use pattern::{ParamRanges, PathPattern, Segment, MAX_INLINE_PARAMS, MAX_PARAMS};
pub use registry::{detection_path, join_paths, pattern_path, Registry};
pub use route::{Route, RouteId, RouteInfo, RouteKind, METHOD_USE};
pub use static_delegate::{rewrite_path, SkipPredicate, StaticConfig};
