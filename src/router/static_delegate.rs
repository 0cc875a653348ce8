//! Static delegate: a prefix route that hands requests to a [`FileServer`]
//! and falls through to later routes when the file is missing.

use std::fmt;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use std::time::Duration;

use http::header::{HeaderValue, CACHE_CONTROL, CONTENT_DISPOSITION};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::core::Router;
use super::registry::Registration;
use super::route::{RouteId, RouteKind};
use crate::config::RouterConfig;
use crate::dispatcher::{handler, Ctx, Handler};
use crate::error::{DispatchError, RegistrationError};
use crate::static_files::{FileServer, FileServerOptions, DEFAULT_CACHE_DURATION, DEFAULT_INDEX};

/// Predicate that, when true, skips serving and continues dispatch.
pub type SkipPredicate = Arc<dyn Fn(&Ctx) -> bool + Send + Sync>;

/// Options for [`Router::static_dir`].
#[derive(Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct StaticConfig {
    /// Index file served for directory requests.
    pub index: String,
    /// Generate listings for directories without an index file.
    pub browse: bool,
    pub byte_range: bool,
    /// Gzip compressible files for clients that accept it.
    pub compress: bool,
    /// In-memory file cache lifetime in seconds; `0` disables the cache.
    #[serde(with = "seconds")]
    pub cache_duration: Duration,
    /// `Cache-Control: public, max-age=N` on served files when non-zero.
    pub max_age: u32,
    /// Serve files as attachments.
    pub download: bool,
    #[serde(skip)]
    pub next: Option<SkipPredicate>,
    /// Runs after a file was served successfully.
    #[serde(skip)]
    pub modify_response: Option<Handler>,
}

impl Default for StaticConfig {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            browse: false,
            byte_range: false,
            compress: false,
            cache_duration: DEFAULT_CACHE_DURATION,
            max_age: 0,
            download: false,
            next: None,
            modify_response: None,
        }
    }
}

impl StaticConfig {
    #[must_use]
    pub fn with_next<F>(mut self, f: F) -> Self
    where
        F: Fn(&Ctx) -> bool + Send + Sync + 'static,
    {
        self.next = Some(Arc::new(f));
        self
    }

    #[must_use]
    pub fn with_modify_response(mut self, h: Handler) -> Self {
        self.modify_response = Some(h);
        self
    }

    fn file_server_options(&self) -> FileServerOptions {
        FileServerOptions {
            index: if self.index.is_empty() {
                DEFAULT_INDEX.to_string()
            } else {
                self.index.clone()
            },
            browse: self.browse,
            byte_range: self.byte_range,
            compress: self.compress,
            cache_duration: self.cache_duration,
        }
    }

    fn cache_control(&self) -> Option<HeaderValue> {
        (self.max_age > 0)
            .then(|| HeaderValue::from_str(&format!("public, max-age={}", self.max_age)).ok())
            .flatten()
    }
}

impl fmt::Debug for StaticConfig {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("StaticConfig")
            .field("index", &self.index)
            .field("browse", &self.browse)
            .field("byte_range", &self.byte_range)
            .field("compress", &self.compress)
            .field("cache_duration", &self.cache_duration)
            .field("max_age", &self.max_age)
            .field("download", &self.download)
            .field("next", &self.next.is_some())
            .field("modify_response", &self.modify_response.is_some())
            .finish()
    }
}

mod seconds {
    use std::time::Duration;

    use serde::{Deserialize, Deserializer, Serializer};

    pub fn serialize<S: Serializer>(d: &Duration, s: S) -> Result<S::Ok, S::Error> {
        s.serialize_u64(d.as_secs())
    }

    pub fn deserialize<'de, D: Deserializer<'de>>(d: D) -> Result<Duration, D::Error> {
        u64::deserialize(d).map(Duration::from_secs)
    }
}

/// Normalize a static prefix: leading `/`, case folding, truncation at
/// the first `*`, and no trailing `/` except for the root.
#[must_use]
pub(crate) fn normalize_prefix(config: &RouterConfig, raw: &str) -> String {
    let mut prefix = match raw {
        "" => "/".to_string(),
        p if p.starts_with('/') => p.to_string(),
        p => format!("/{p}"),
    };
    if !config.case_sensitive {
        prefix.make_ascii_lowercase();
    }
    if let Some(star) = prefix.find('*') {
        prefix.truncate(star);
    }
    if prefix.len() > 1 && prefix.ends_with('/') {
        prefix.pop();
    }
    if prefix.is_empty() {
        prefix.push('/');
    }
    prefix
}

/// Path handed to the file server for a request under `prefix`.
///
/// The prefix is stripped; an empty remainder becomes `/` and a leading
/// `/` is ensured. `rewrite_path("/assets", "/assets/sub/file.txt")` is
/// `/sub/file.txt`.
#[must_use]
pub fn rewrite_path(prefix: &str, path: &str) -> String {
    let rest = if prefix == "/" {
        path
    } else {
        path.get(prefix.len()..).unwrap_or("")
    };
    match rest {
        "" => "/".to_string(),
        r if r.starts_with('/') => r.to_string(),
        r => format!("/{r}"),
    }
}

fn static_handler(prefix: String, server: Arc<FileServer>, config: StaticConfig) -> Handler {
    let cache_control = config.cache_control();
    handler(move |ctx: &mut Ctx| {
        if let Some(skip) = &config.next {
            if skip(ctx) {
                return ctx.next();
            }
        }

        let rel = rewrite_path(&prefix, ctx.path());
        let base = if prefix == "/" {
            ""
        } else {
            ctx.path().get(..prefix.len()).unwrap_or(prefix.as_str())
        };
        match server.serve_under(ctx.method(), base, &rel, ctx.headers()) {
            Ok(served) => {
                let attachment = config.download.then(|| attachment_header(served.file.as_deref()));
                let response = ctx.response_mut();
                response.status = served.status;
                response.headers.extend(served.headers);
                response.body = served.body;
                if let Some(Some(value)) = attachment {
                    response.headers.insert(CONTENT_DISPOSITION, value);
                }
                if let Some(value) = &cache_control {
                    response.headers.insert(CACHE_CONTROL, value.clone());
                }
                match &config.modify_response {
                    Some(modify) => modify(ctx),
                    None => Ok(()),
                }
            }
            Err(DispatchError::FilesystemMiss { path, reason }) => {
                debug!(
                    request_id = %ctx.request_id(),
                    prefix = %prefix,
                    file = %path,
                    reason = %reason,
                    "Static miss, continuing dispatch"
                );
                ctx.reset_response();
                ctx.next()
            }
            Err(e) => Err(e),
        }
    })
}

fn attachment_header(file: Option<&Path>) -> Option<HeaderValue> {
    match file.and_then(Path::file_name).and_then(|n| n.to_str()) {
        Some(name) => HeaderValue::from_str(&format!("attachment; filename=\"{name}\"")).ok(),
        None => Some(HeaderValue::from_static("attachment")),
    }
}

impl Router {
    /// Serve files under `root` for requests below `prefix`, on GET and HEAD.
    ///
    /// A miss (not found or forbidden) resets the response and continues
    /// dispatch with the next matching route.
    ///
    /// # Errors
    ///
    /// [`RegistrationError::InvalidMethod`] when GET or HEAD is not part
    /// of the configured method set.
    pub fn static_dir(
        &self,
        prefix: &str,
        root: impl AsRef<Path>,
        config: StaticConfig,
    ) -> Result<RouteId, RegistrationError> {
        let root = match root.as_ref() {
            r if r.as_os_str().is_empty() => PathBuf::from("."),
            r => r.to_path_buf(),
        };
        let prefix = normalize_prefix(&self.config(), prefix);
        let server = Arc::new(FileServer::new(root.clone(), config.file_server_options()));
        let h = static_handler(prefix.clone(), server, config);

        let id = self.register_with(|reg| {
            let (method, mut slots) = reg.resolve_method(http::Method::GET.as_str())?;
            let (_, head) = reg.resolve_method(http::Method::HEAD.as_str())?;
            slots.extend(head);
            let (path, pretty) = reg.normalize(&prefix);
            reg.push(Registration {
                method,
                slots,
                path,
                pretty,
                kind: RouteKind::Static {
                    root: Arc::from(root.as_path()),
                },
                handlers: vec![h],
            })
        })?;
        info!(prefix = %prefix, root = %root.display(), route_id = id.index(), "Static directory registered");
        Ok(id)
    }
}
