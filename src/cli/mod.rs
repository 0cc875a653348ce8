//! # CLI Module
//!
//! Command-line interface for inspecting route manifests.
//!
//! ## Commands
//!
//! ### `routes`
//!
//! Print every method-stack entry in match-priority order:
//!
//! ```bash
//! triroute routes routes.yaml
//! triroute routes routes.yaml --json
//! ```
//!
//! ### `buckets`
//!
//! Print the dispatch index layout per method. The `""` bucket holds the
//! routes every request scans:
//!
//! ```bash
//! triroute buckets routes.yaml --method GET
//! ```
//!
//! ### `resolve`
//!
//! Dispatch a request against the manifest and print the handlers that
//! ran, the captured parameters, or the dispatch error:
//!
//! ```bash
//! triroute resolve routes.yaml GET /api/users/42
//! triroute resolve routes.yaml GET /admin/stats --mounted
//! ```

mod commands;


pub use commands::{execute, run_cli, Cli, Commands};
