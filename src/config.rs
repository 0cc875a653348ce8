//! # Router Configuration
//!
//! [`RouterConfig`] controls how registered paths and request paths are
//! normalized and which HTTP methods the router accepts.
//!
//! ## Sources
//!
//! Configuration is layered:
//!
//! 1. [`RouterConfig::default()`]
//! 2. A YAML, TOML or JSON file loaded with [`RouterConfig::load`]
//! 3. Environment overrides applied by [`RouterConfig::with_env_overrides`]
//!
//! ## Environment Variables
//!
//! | Variable                  | Field            | Example           |
//! |---------------------------|------------------|-------------------|
//! | `TRIROUTE_CASE_SENSITIVE` | `case_sensitive` | `true`            |
//! | `TRIROUTE_STRICT_ROUTING` | `strict_routing` | `1`               |
//! | `TRIROUTE_UNESCAPE_PATH`  | `unescape_path`  | `yes`             |
//! | `TRIROUTE_METHODS`        | `methods`        | `GET,POST,PURGE`  |
//!
//! ## Example
//!
//! ```yaml
//! case_sensitive: false
//! strict_routing: true
//! methods: [GET, HEAD, POST]
//! ```

use std::env;
use std::path::Path;

use anyhow::{bail, Context};
use http::Method;
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

/// Methods accepted when no explicit set is configured.
pub fn default_methods() -> Vec<Method> {
    vec![
        Method::GET,
        Method::HEAD,
        Method::POST,
        Method::PUT,
        Method::DELETE,
        Method::CONNECT,
        Method::OPTIONS,
        Method::TRACE,
        Method::PATCH,
    ]
}

/// Path normalization and method-set options.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(default)]
pub struct RouterConfig {
    /// When `false`, registered and requested paths are ASCII-lowercased before matching.
    pub case_sensitive: bool,
    /// When `false`, a single trailing `/` is stripped (except for `/` itself).
    pub strict_routing: bool,
    /// Percent-decode request paths before matching.
    pub unescape_path: bool,
    /// The finite set of accepted HTTP method tokens.
    #[serde(with = "method_tokens")]
    pub methods: Vec<Method>,
}

impl Default for RouterConfig {
    fn default() -> Self {
        Self {
            case_sensitive: false,
            strict_routing: false,
            unescape_path: false,
            methods: default_methods(),
        }
    }
}

impl RouterConfig {
    /// Defaults with environment overrides applied.
    #[must_use]
    pub fn from_env() -> Self {
        Self::default().with_env_overrides()
    }

    /// Load a configuration file; the format is picked from the extension.
    pub fn load(path: impl AsRef<Path>) -> anyhow::Result<Self> {
        let path = path.as_ref();
        let content = std::fs::read_to_string(path)
            .with_context(|| format!("reading router config {}", path.display()))?;
        let ext = path
            .extension()
            .and_then(|e| e.to_str())
            .unwrap_or_default()
            .to_ascii_lowercase();
        let config: RouterConfig = match ext.as_str() {
            "yaml" | "yml" => serde_yaml::from_str(&content)?,
            "toml" => toml::from_str(&content)?,
            "json" => serde_json::from_str(&content)?,
            other => bail!("unsupported config format `{other}` for {}", path.display()),
        };
        debug!(path = %path.display(), ?config, "Router config loaded");
        Ok(config)
    }

    /// Apply `TRIROUTE_*` environment variables on top of this config.
    #[must_use]
    pub fn with_env_overrides(mut self) -> Self {
        if let Some(v) = env_flag("TRIROUTE_CASE_SENSITIVE") {
            self.case_sensitive = v;
        }
        if let Some(v) = env_flag("TRIROUTE_STRICT_ROUTING") {
            self.strict_routing = v;
        }
        if let Some(v) = env_flag("TRIROUTE_UNESCAPE_PATH") {
            self.unescape_path = v;
        }
        if let Ok(raw) = env::var("TRIROUTE_METHODS") {
            match parse_method_list(&raw) {
                Ok(methods) if !methods.is_empty() => self.methods = methods,
                Ok(_) => warn!("TRIROUTE_METHODS is empty, keeping configured methods"),
                Err(e) => warn!(error = %e, "Ignoring invalid TRIROUTE_METHODS"),
            }
        }
        self
    }

    /// Methods upper-cased and de-duplicated, preserving first occurrence.
    pub(crate) fn normalized_methods(&self) -> Vec<Method> {
        let mut out: Vec<Method> = Vec::with_capacity(self.methods.len());
        for m in &self.methods {
            let upper = match Method::from_bytes(m.as_str().to_ascii_uppercase().as_bytes()) {
                Ok(m) => m,
                Err(_) => continue,
            };
            if !out.contains(&upper) {
                out.push(upper);
            }
        }
        out
    }
}

fn env_flag(name: &str) -> Option<bool> {
    let raw = env::var(name).ok()?;
    match raw.trim().to_ascii_lowercase().as_str() {
        "1" | "true" | "yes" | "on" => Some(true),
        "0" | "false" | "no" | "off" => Some(false),
        _ => {
            warn!(var = name, value = %raw, "Ignoring non-boolean environment value");
            None
        }
    }
}

/// Parse a comma separated list of method tokens.
pub fn parse_method_list(raw: &str) -> Result<Vec<Method>, http::method::InvalidMethod> {
    raw.split(',')
        .map(str::trim)
        .filter(|s| !s.is_empty())
        .map(|s| Method::from_bytes(s.to_ascii_uppercase().as_bytes()))
        .collect()
}

mod method_tokens {
    use http::Method;
    use serde::{de::Error, Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(methods: &[Method], s: S) -> Result<S::Ok, S::Error> {
        s.collect_seq(methods.iter().map(Method::as_str))
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Vec<Method>, D::Error> {
        let tokens = Vec::<String>::deserialize(d)?;
        tokens
            .iter()
            .map(|t| Method::from_bytes(t.to_ascii_uppercase().as_bytes()).map_err(D::Error::custom))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_defaults() {
        let cfg = RouterConfig::default();
        assert!(!cfg.case_sensitive);
        assert!(!cfg.strict_routing);
        assert_eq!(cfg.methods.len(), 9);
        assert_eq!(cfg.methods[0], Method::GET);
    }

    #[test]
    fn test_yaml_partial_uses_defaults() {
        let cfg: RouterConfig =
            serde_yaml::from_str("strict_routing: true\nmethods: [get, Post]\n").unwrap();
        assert!(cfg.strict_routing);
        assert!(!cfg.case_sensitive);
        assert_eq!(cfg.methods, vec![Method::GET, Method::POST]);
    }

    #[test]
    fn test_toml_and_json() {
        let cfg: RouterConfig = toml::from_str("case_sensitive = true").unwrap();
        assert!(cfg.case_sensitive);
        let cfg: RouterConfig = serde_json::from_str(r#"{"methods":["PURGE"]}"#).unwrap();
        assert_eq!(cfg.methods, vec![Method::from_bytes(b"PURGE").unwrap()]);
    }

    #[test]
    fn test_load_from_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("router.yaml");
        std::fs::write(&path, "unescape_path: true\n").unwrap();
        let cfg = RouterConfig::load(&path).unwrap();
        assert!(cfg.unescape_path);

        let bad = dir.path().join("router.ini");
        std::fs::write(&bad, "x=1").unwrap();
        assert!(RouterConfig::load(&bad).is_err());
    }

    #[test]
    fn test_parse_method_list() {
        let methods = parse_method_list("get, post ,,DELETE").unwrap();
        assert_eq!(methods, vec![Method::GET, Method::POST, Method::DELETE]);
    }

    #[test]
    fn test_normalized_methods_dedupes() {
        let cfg = RouterConfig {
            methods: vec![Method::GET, Method::GET, Method::POST],
            ..RouterConfig::default()
        };
        assert_eq!(cfg.normalized_methods(), vec![Method::GET, Method::POST]);
    }
}
