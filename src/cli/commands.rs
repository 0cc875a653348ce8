use std::fmt::Write as _;
use std::path::{Path, PathBuf};

use anyhow::{Context, Result};
use clap::{Parser, Subcommand};
use http::Method;
use serde_json::json;

use crate::manifest::{Manifest, ResolveTrace};
use crate::router::Router;

/// Command-line interface for triroute
#[derive(Parser)]
#[command(name = "triroute")]
#[command(about = "Inspect and exercise route manifests", long_about = None)]
pub struct Cli {
    /// Log at debug level (overrides TRIROUTE_LOG_LEVEL)
    #[arg(short, long, global = true, default_value_t = false)]
    pub verbose: bool,

    /// The subcommand to execute
    #[command(subcommand)]
    pub command: Commands,
}

#[derive(Subcommand)]
pub enum Commands {
    /// Print the route table in match-priority order
    Routes {
        /// Route manifest (YAML, TOML or JSON)
        manifest: PathBuf,

        /// Print JSON instead of a table
        #[arg(long, default_value_t = false)]
        json: bool,
    },
    /// Print the dispatch index bucket layout
    Buckets {
        /// Route manifest (YAML, TOML or JSON)
        manifest: PathBuf,

        /// Only this method
        #[arg(short, long)]
        method: Option<String>,
    },
    /// Resolve a request and print the handler chain that ran
    Resolve {
        /// Route manifest (YAML, TOML or JSON)
        manifest: PathBuf,

        /// Request method
        method: String,

        /// Request path, already decoded
        path: String,

        /// Only consider mounted sub-router routes
        #[arg(long, default_value_t = false)]
        mounted: bool,
    },
}

fn load_router(path: &Path) -> Result<Router> {
    Manifest::load(path)?
        .build()
        .with_context(|| format!("failed to build router from {}", path.display()))
}

fn parse_method(raw: &str) -> Result<Method> {
    Method::from_bytes(raw.to_ascii_uppercase().as_bytes())
        .with_context(|| format!("invalid method `{raw}`"))
}

/// Run a command and return what it prints.
///
/// # Errors
///
/// Manifest loading or registration failures. A request that does not
/// resolve is reported in the output, not as an error.
pub fn execute(command: &Commands) -> Result<String> {
    let mut out = String::new();
    match command {
        Commands::Routes { manifest, json } => {
            let router = load_router(manifest)?;
            let routes = router.routes();
            if *json {
                out = serde_json::to_string_pretty(&routes)?;
                out.push('\n');
            } else {
                for r in routes {
                    writeln!(
                        out,
                        "{:<7} {:<40} {:<10} handlers={}{}",
                        r.method,
                        r.path,
                        r.kind,
                        r.handlers,
                        r.name.map(|n| format!(" name={n}")).unwrap_or_default()
                    )?;
                }
            }
        }
        Commands::Buckets { manifest, method } => {
            let router = load_router(manifest)?;
            let only = method.as_deref().map(parse_method).transpose()?;
            let snapshot = router.snapshot();
            for (slot, m) in snapshot.methods().iter().enumerate() {
                if only.as_ref().is_some_and(|o| o != m) {
                    continue;
                }
                writeln!(out, "{m}")?;
                for (key, ids) in snapshot.index().layout(slot) {
                    let patterns: Vec<String> = ids
                        .iter()
                        .filter_map(|id| snapshot.route(*id))
                        .map(|r| r.pattern().source().to_string())
                        .collect();
                    writeln!(out, "  {key:?} -> [{}]", patterns.join(", "))?;
                }
            }
        }
        Commands::Resolve {
            manifest,
            method,
            path,
            mounted,
        } => {
            let router = load_router(manifest)?;
            let mut ctx = router.context(parse_method(method)?, path);
            let result = if *mounted {
                router.dispatch_mounted(&mut ctx)
            } else {
                router.dispatch(&mut ctx)
            };
            let params: serde_json::Map<String, serde_json::Value> = ctx
                .params()
                .map(|(k, v)| (k.to_string(), json!(v)))
                .collect();
            let report = match result {
                Ok(_) => json!({
                    "status": ctx.response().status.as_u16(),
                    "route": ctx.route().map(|r| r.pattern().source().to_string()),
                    "handlers": ResolveTrace::of(&ctx),
                    "params": params,
                }),
                Err(e) => json!({
                    "status": e.status_code().as_u16(),
                    "error": e.to_string(),
                    "handlers": ResolveTrace::of(&ctx),
                }),
            };
            out = serde_json::to_string_pretty(&report)?;
            out.push('\n');
        }
    }
    Ok(out)
}

/// Parse arguments, set up logging and run the command.
///
/// # Errors
///
/// See [`execute`].
pub fn run_cli(cli: Cli) -> Result<()> {
    let mut log = crate::logging::LogConfig::from_env();
    if cli.verbose {
        log.log_level = "debug".to_string();
    }
    crate::logging::init_logging(&log)?;
    print!("{}", execute(&cli.command)?);
    Ok(())
}
