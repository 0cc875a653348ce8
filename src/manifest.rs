//! Route manifests: a declarative description of a router used by the
//! `triroute` binary to inspect route tables and bucket layouts and to
//! trace how a request would be resolved.
//!
//! ```yaml
//! config:
//!   strict_routing: false
//! routes:
//!   - { method: USE, path: /api }
//!   - { method: GET, path: /api/users/:id, name: user }
//! statics:
//!   - { prefix: /assets, root: ./public, max_age: 3600 }
//! mounts:
//!   - prefix: /admin
//!     routes:
//!       - { method: GET, path: /stats }
//! ```

use std::path::{Path, PathBuf};

use anyhow::{bail, Context, Result};
use serde::{Deserialize, Serialize};

use crate::config::RouterConfig;
use crate::dispatcher::{handler, Ctx, Handler};
use crate::router::{Router, Routing, StaticConfig, METHOD_USE};

#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct Manifest {
    pub config: RouterConfig,
    pub routes: Vec<RouteEntry>,
    pub statics: Vec<StaticEntry>,
    pub mounts: Vec<MountEntry>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RouteEntry {
    pub method: String,
    pub path: String,
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

impl RouteEntry {
    /// Label recorded in the resolve trace.
    #[must_use]
    pub fn label(&self) -> String {
        self.name
            .clone()
            .unwrap_or_else(|| format!("{} {}", self.method.to_ascii_uppercase(), self.path))
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StaticEntry {
    pub prefix: String,
    pub root: PathBuf,
    #[serde(flatten)]
    pub options: StaticConfig,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct MountEntry {
    pub prefix: String,
    #[serde(default)]
    pub routes: Vec<RouteEntry>,
}

/// Labels of the handlers that ran for one request, in order.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct ResolveTrace(pub Vec<String>);

impl ResolveTrace {
    /// Trace recorded on `ctx`, empty when no manifest handler ran.
    #[must_use]
    pub fn of(ctx: &Ctx) -> Vec<String> {
        ctx.locals()
            .get::<ResolveTrace>()
            .map(|t| t.0.clone())
            .unwrap_or_default()
    }

    fn push(ctx: &mut Ctx, label: &str) {
        match ctx.locals_mut().get_mut::<ResolveTrace>() {
            Some(trace) => trace.0.push(label.to_string()),
            None => {
                ctx.locals_mut()
                    .insert(ResolveTrace(vec![label.to_string()]));
            }
        }
    }
}

/// Handler that records `label`; middleware continues dispatch, terminal
/// routes answer with the label.
fn recorder(label: String, middleware: bool) -> Handler {
    handler(move |ctx: &mut Ctx| {
        ResolveTrace::push(ctx, &label);
        if middleware {
            ctx.next()
        } else {
            ctx.send_string(label.clone());
            Ok(())
        }
    })
}

impl Manifest {
    /// Load a manifest, picking the format from the file extension
    /// (`.yaml`/`.yml`, `.toml`, `.json`).
    ///
    /// # Errors
    ///
    /// Fails when the file cannot be read or parsed.
    pub fn load(path: impl AsRef<Path>) -> Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("failed to read manifest {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or("")
            .to_ascii_lowercase();
        let manifest = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => bail!("unsupported manifest format `{other}` for {}", path.display()),
        };
        Ok(manifest)
    }

    /// Build a router whose handlers record their labels into a
    /// [`ResolveTrace`].
    ///
    /// # Errors
    ///
    /// Fails on the first registration error, naming the entry.
    pub fn build(&self) -> Result<Router> {
        let router = Router::with_config(self.config.clone().with_env_overrides());
        register_entries(&router, &self.routes)?;

        for entry in &self.statics {
            let label = format!("static {}", entry.prefix);
            let options = entry
                .options
                .clone()
                .with_modify_response(handler(move |ctx: &mut Ctx| {
                    ResolveTrace::push(ctx, &label);
                    Ok(())
                }));
            router
                .static_dir(&entry.prefix, &entry.root, options)
                .with_context(|| format!("static {} -> {}", entry.prefix, entry.root.display()))?;
        }

        for mount in &self.mounts {
            let sub = Router::with_config(router.config());
            register_entries(&sub, &mount.routes)?;
            router
                .mount(&mount.prefix, sub)
                .with_context(|| format!("mount {}", mount.prefix))?;
        }
        Ok(router)
    }
}

fn register_entries(router: &Router, entries: &[RouteEntry]) -> Result<()> {
    for entry in entries {
        let middleware = entry.method.eq_ignore_ascii_case(METHOD_USE);
        let route = router
            .add(&entry.method, &entry.path, [recorder(entry.label(), middleware)])
            .with_context(|| format!("route {} {}", entry.method, entry.path))?;
        if let Some(name) = &entry.name {
            route.name(name)?;
        }
    }
    Ok(())
}
