//! Filesystem backend for the static delegate.
//!
//! [`FileServer`] maps a rewritten URL path onto a root directory, refuses
//! anything that would escape it, and answers with file contents, an
//! index file, or an optional directory listing. File bodies are kept in
//! a shared in-memory cache for `cache_duration`.

use std::fs;
use std::io::{self, Write};
use std::path::{Component, Path, PathBuf};
use std::sync::Arc;
use std::time::{Duration, Instant};

use bytes::Bytes;
use dashmap::DashMap;
use flate2::write::GzEncoder;
use flate2::Compression;
use http::header::{
    HeaderValue, ACCEPT_ENCODING, ACCEPT_RANGES, CONTENT_ENCODING, CONTENT_LENGTH, CONTENT_RANGE,
    CONTENT_TYPE, RANGE, VARY,
};
use http::{HeaderMap, Method, StatusCode};
use tracing::{debug, warn};

use crate::error::{DispatchError, MissReason};

/// Default index file looked up for directory requests.
pub const DEFAULT_INDEX: &str = "index.html";

/// Default lifetime of a cached file body.
pub const DEFAULT_CACHE_DURATION: Duration = Duration::from_secs(10);

/// Backend behavior switches.
#[derive(Debug, Clone)]
pub struct FileServerOptions {
    pub index: String,
    pub browse: bool,
    pub byte_range: bool,
    pub compress: bool,
    /// Zero disables the cache.
    pub cache_duration: Duration,
}

impl Default for FileServerOptions {
    fn default() -> Self {
        Self {
            index: DEFAULT_INDEX.to_string(),
            browse: false,
            byte_range: false,
            compress: false,
            cache_duration: DEFAULT_CACHE_DURATION,
        }
    }
}

/// A successfully served file or listing.
#[derive(Debug, Clone)]
pub struct ServedFile {
    pub status: StatusCode,
    pub headers: HeaderMap,
    pub body: Bytes,
    /// Filesystem path that produced the body; `None` for listings.
    pub file: Option<PathBuf>,
}

#[derive(Debug, Clone)]
struct CachedFile {
    body: Bytes,
    gzipped: Option<Bytes>,
    loaded: Instant,
}

/// Serves files below a root directory.
#[derive(Debug)]
pub struct FileServer {
    base_dir: PathBuf,
    options: FileServerOptions,
    cache: Arc<DashMap<PathBuf, CachedFile>>,
}

impl FileServer {
    pub fn new<P: Into<PathBuf>>(base: P, options: FileServerOptions) -> Self {
        Self {
            base_dir: base.into(),
            options,
            cache: Arc::new(DashMap::new()),
        }
    }

    #[must_use]
    pub fn root(&self) -> &Path {
        &self.base_dir
    }

    #[must_use]
    pub fn options(&self) -> &FileServerOptions {
        &self.options
    }

    /// Number of file bodies currently cached.
    #[must_use]
    pub fn cached_files(&self) -> usize {
        self.cache.len()
    }

    fn map_path(&self, url_path: &str) -> Option<PathBuf> {
        let mut pb = self.base_dir.clone();
        for comp in Path::new(url_path.trim_start_matches('/')).components() {
            match comp {
                Component::Normal(s) => pb.push(s),
                Component::CurDir => {}
                _ => return None,
            }
        }
        Some(pb)
    }

    fn content_type(path: &Path) -> &'static str {
        match path
            .extension()
            .and_then(|s| s.to_str())
            .unwrap_or("")
            .to_ascii_lowercase()
            .as_str()
        {
            "html" | "htm" => "text/html; charset=utf-8",
            "css" => "text/css; charset=utf-8",
            "js" | "mjs" => "application/javascript",
            "json" | "map" => "application/json",
            "txt" => "text/plain; charset=utf-8",
            "xml" => "application/xml",
            "svg" => "image/svg+xml",
            "png" => "image/png",
            "jpg" | "jpeg" => "image/jpeg",
            "gif" => "image/gif",
            "ico" => "image/x-icon",
            "webp" => "image/webp",
            "wasm" => "application/wasm",
            "pdf" => "application/pdf",
            "woff" => "font/woff",
            "woff2" => "font/woff2",
            _ => "application/octet-stream",
        }
    }

    fn compressible(content_type: &str) -> bool {
        content_type.starts_with("text/")
            || content_type.starts_with("application/javascript")
            || content_type.starts_with("application/json")
            || content_type.starts_with("application/xml")
            || content_type.starts_with("image/svg")
    }

    /// Serve `url_path` (already rewritten relative to the root).
    ///
    /// # Errors
    ///
    /// [`DispatchError::FilesystemMiss`] when nothing servable exists or
    /// the path is outside the root; [`DispatchError::Io`] for other
    /// filesystem failures.
    pub fn serve(
        &self,
        method: &Method,
        url_path: &str,
        request_headers: &HeaderMap,
    ) -> Result<ServedFile, DispatchError> {
        self.serve_under(method, "", url_path, request_headers)
    }

    /// Like [`serve`](Self::serve) for a server published below `base`
    /// (for example `/assets`); directory listings link to `base` + path.
    ///
    /// # Errors
    ///
    /// See [`serve`](Self::serve).
    pub fn serve_under(
        &self,
        method: &Method,
        base: &str,
        url_path: &str,
        request_headers: &HeaderMap,
    ) -> Result<ServedFile, DispatchError> {
        let miss = |reason| DispatchError::FilesystemMiss {
            path: url_path.to_string(),
            reason,
        };
        let mut path = self.map_path(url_path).ok_or_else(|| miss(MissReason::Forbidden))?;
        let meta = fs::metadata(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => miss(MissReason::NotFound),
            io::ErrorKind::PermissionDenied => miss(MissReason::Forbidden),
            _ => DispatchError::Io(e),
        })?;

        if meta.is_dir() {
            let index = path.join(&self.options.index);
            if index.is_file() {
                path = index;
            } else if self.options.browse {
                return self.listing(method, &path, base, url_path);
            } else {
                return Err(miss(MissReason::Forbidden));
            }
        }

        let cached = self.load(&path).map_err(|e| match e.kind() {
            io::ErrorKind::NotFound => miss(MissReason::NotFound),
            io::ErrorKind::PermissionDenied => miss(MissReason::Forbidden),
            _ => DispatchError::Io(e),
        })?;
        let content_type = Self::content_type(&path);
        let total = cached.body.len();

        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static(content_type));
        if self.options.byte_range {
            headers.insert(ACCEPT_RANGES, HeaderValue::from_static("bytes"));
        }

        let range = if self.options.byte_range {
            request_headers.get(RANGE).and_then(|v| v.to_str().ok())
        } else {
            None
        };

        let (status, body) = match range.map(|r| parse_range(r, total)) {
            Some(Some((start, end))) => {
                insert_header(&mut headers, CONTENT_RANGE, &format!("bytes {start}-{end}/{total}"));
                (StatusCode::PARTIAL_CONTENT, cached.body.slice(start..=end))
            }
            Some(None) => {
                insert_header(&mut headers, CONTENT_RANGE, &format!("bytes */{total}"));
                (StatusCode::RANGE_NOT_SATISFIABLE, Bytes::new())
            }
            None => {
                let wants_gzip = self.options.compress
                    && Self::compressible(content_type)
                    && accepts_gzip(request_headers);
                match (&cached.gzipped, wants_gzip) {
                    (Some(gz), true) => {
                        headers.insert(CONTENT_ENCODING, HeaderValue::from_static("gzip"));
                        headers.insert(VARY, HeaderValue::from_static("Accept-Encoding"));
                        (StatusCode::OK, gz.clone())
                    }
                    _ => (StatusCode::OK, cached.body.clone()),
                }
            }
        };

        insert_header(&mut headers, CONTENT_LENGTH, &body.len().to_string());
        debug!(
            file = %path.display(),
            status = status.as_u16(),
            bytes = body.len(),
            "Static file served"
        );
        Ok(ServedFile {
            status,
            headers,
            body: if *method == Method::HEAD { Bytes::new() } else { body },
            file: Some(path),
        })
    }

    fn load(&self, path: &Path) -> io::Result<CachedFile> {
        let ttl = self.options.cache_duration;
        if !ttl.is_zero() {
            if let Some(entry) = self.cache.get(path) {
                if entry.loaded.elapsed() < ttl {
                    return Ok(entry.value().clone());
                }
            }
            self.evict_expired(ttl);
        }

        let body = Bytes::from(fs::read(path)?);
        let gzipped = if self.options.compress && Self::compressible(Self::content_type(path)) {
            match gzip(&body) {
                Ok(gz) => Some(Bytes::from(gz)),
                Err(e) => {
                    warn!(file = %path.display(), error = %e, "Gzip compression failed");
                    None
                }
            }
        } else {
            None
        };
        let entry = CachedFile {
            body,
            gzipped,
            loaded: Instant::now(),
        };
        if !ttl.is_zero() {
            self.cache.insert(path.to_path_buf(), entry.clone());
        }
        Ok(entry)
    }

    /// Drop cache entries older than `ttl`, including files that were
    /// deleted or never requested again.
    fn evict_expired(&self, ttl: Duration) {
        let before = self.cache.len();
        self.cache.retain(|_, entry| entry.loaded.elapsed() < ttl);
        let evicted = before.saturating_sub(self.cache.len());
        if evicted > 0 {
            debug!(evicted, remaining = self.cache.len(), "Expired static cache entries evicted");
        }
    }

    fn listing(
        &self,
        method: &Method,
        dir: &Path,
        base: &str,
        url_path: &str,
    ) -> Result<ServedFile, DispatchError> {
        let mut names: Vec<String> = fs::read_dir(dir)?
            .filter_map(Result::ok)
            .map(|e| {
                let mut name = e.file_name().to_string_lossy().into_owned();
                if e.file_type().map(|t| t.is_dir()).unwrap_or(false) {
                    name.push('/');
                }
                name
            })
            .collect();
        names.sort();

        // absolute links resolve the same with or without a trailing slash
        let dir_url = format!("{}{}", base.trim_end_matches('/'), url_path.trim_end_matches('/'));
        let title = escape_html(if dir_url.is_empty() { "/" } else { &dir_url });
        let mut html = format!(
            "<html><head><title>{title}</title></head><body><h1>{title}</h1><ul>"
        );
        if !dir_url.is_empty() {
            let parent = match dir_url.rsplit_once('/') {
                Some((p, _)) if !p.is_empty() => format!("{p}/"),
                _ => "/".to_string(),
            };
            html.push_str("<li><a href=\"");
            html.push_str(&escape_html(&parent));
            html.push_str("\">..</a></li>");
        }
        for name in &names {
            let (stem, slash) = match name.strip_suffix('/') {
                Some(stem) => (stem, "/"),
                None => (name.as_str(), ""),
            };
            let href = format!("{dir_url}/{}{slash}", urlencoding::encode(stem));
            html.push_str("<li><a href=\"");
            html.push_str(&escape_html(&href));
            html.push_str("\">");
            html.push_str(&escape_html(name));
            html.push_str("</a></li>");
        }
        html.push_str("</ul></body></html>");

        let body = Bytes::from(html);
        let mut headers = HeaderMap::new();
        headers.insert(CONTENT_TYPE, HeaderValue::from_static("text/html; charset=utf-8"));
        insert_header(&mut headers, CONTENT_LENGTH, &body.len().to_string());
        Ok(ServedFile {
            status: StatusCode::OK,
            headers,
            body: if *method == Method::HEAD { Bytes::new() } else { body },
            file: None,
        })
    }
}

fn insert_header(headers: &mut HeaderMap, name: http::header::HeaderName, value: &str) {
    if let Ok(v) = HeaderValue::from_str(value) {
        headers.insert(name, v);
    }
}

fn accepts_gzip(headers: &HeaderMap) -> bool {
    headers
        .get_all(ACCEPT_ENCODING)
        .iter()
        .filter_map(|v| v.to_str().ok())
        .flat_map(|v| v.split(','))
        .any(|enc| enc.trim().split(';').next() == Some("gzip"))
}

fn gzip(data: &[u8]) -> io::Result<Vec<u8>> {
    let mut encoder = GzEncoder::new(Vec::with_capacity(data.len() / 2), Compression::default());
    encoder.write_all(data)?;
    encoder.finish()
}

/// Parse a single `bytes=` range against a body of `total` bytes.
///
/// Returns inclusive `(start, end)`, or `None` when unsatisfiable.
fn parse_range(header: &str, total: usize) -> Option<(usize, usize)> {
    let spec = header.trim().strip_prefix("bytes=")?;
    if spec.contains(',') || total == 0 {
        return None;
    }
    let (start, end) = spec.split_once('-')?;
    let (start, end) = match (start.trim(), end.trim()) {
        ("", suffix) => {
            let n: usize = suffix.parse().ok()?;
            if n == 0 {
                return None;
            }
            (total.saturating_sub(n), total - 1)
        }
        (s, "") => (s.parse().ok()?, total - 1),
        (s, e) => (s.parse().ok()?, e.parse::<usize>().ok()?.min(total - 1)),
    };
    (start <= end && start < total).then_some((start, end))
}

fn escape_html(s: &str) -> String {
    let mut out = String::with_capacity(s.len());
    for c in s.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            _ => out.push(c),
        }
    }
    out
}

#[cfg(test)]
mod tests {
    use super::*;
    use flate2::read::GzDecoder;
    use std::io::Read;

    fn fixture() -> tempfile::TempDir {
        let dir = tempfile::tempdir().unwrap();
        fs::write(dir.path().join("hello.txt"), "Hello\n").unwrap();
        fs::write(dir.path().join("index.html"), "<h1>home</h1>").unwrap();
        fs::create_dir(dir.path().join("sub")).unwrap();
        fs::write(dir.path().join("sub").join("data.json"), "{\"a\":1}").unwrap();
        dir
    }

    #[test]
    fn test_map_path_prevents_traversal() {
        let sf = FileServer::new("tests/staticdata", FileServerOptions::default());
        assert!(sf.map_path("../Cargo.toml").is_none());
        assert!(sf.map_path("/a/../../Cargo.toml").is_none());
        assert!(sf.map_path("/./hello.txt").is_some());
    }

    #[test]
    fn test_serve_plain_file() {
        let dir = fixture();
        let sf = FileServer::new(dir.path(), FileServerOptions::default());
        let served = sf.serve(&Method::GET, "/hello.txt", &HeaderMap::new()).unwrap();
        assert_eq!(served.status, StatusCode::OK);
        assert_eq!(served.headers[CONTENT_TYPE], "text/plain; charset=utf-8");
        assert_eq!(served.headers[CONTENT_LENGTH], "6");
        assert_eq!(served.body.as_ref(), b"Hello\n");
    }

    #[test]
    fn test_directory_serves_index() {
        let dir = fixture();
        let sf = FileServer::new(dir.path(), FileServerOptions::default());
        let served = sf.serve(&Method::GET, "/", &HeaderMap::new()).unwrap();
        assert_eq!(served.body.as_ref(), b"<h1>home</h1>");
    }

    #[test]
    fn test_directory_without_index_is_forbidden_unless_browsing() {
        let dir = fixture();
        let sf = FileServer::new(dir.path(), FileServerOptions::default());
        let err = sf.serve(&Method::GET, "/sub", &HeaderMap::new()).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::FilesystemMiss { reason: MissReason::Forbidden, .. }
        ));

        let browse = FileServer::new(
            dir.path(),
            FileServerOptions { browse: true, ..FileServerOptions::default() },
        );
        let served = browse.serve(&Method::GET, "/sub", &HeaderMap::new()).unwrap();
        let html = String::from_utf8(served.body.to_vec()).unwrap();
        assert!(html.contains("data.json"));
    }

    #[test]
    fn test_listing_links_are_absolute() {
        let dir = fixture();
        fs::write(dir.path().join("sub").join("a b.txt"), "x").unwrap();
        let browse = FileServer::new(
            dir.path(),
            FileServerOptions { browse: true, ..FileServerOptions::default() },
        );
        for url_path in ["/sub", "/sub/"] {
            let served = browse
                .serve_under(&Method::GET, "/assets", url_path, &HeaderMap::new())
                .unwrap();
            let html = String::from_utf8(served.body.to_vec()).unwrap();
            assert!(html.contains(r#"href="/assets/sub/data.json""#), "{html}");
            assert!(html.contains(r#"href="/assets/sub/a%20b.txt""#), "{html}");
            assert!(html.contains(r#"href="/assets/">..</a>"#), "{html}");
        }

        let root = FileServer::new(
            dir.path(),
            FileServerOptions {
                browse: true,
                index: "missing.html".to_string(),
                ..FileServerOptions::default()
            },
        );
        let served = root.serve(&Method::GET, "/", &HeaderMap::new()).unwrap();
        let html = String::from_utf8(served.body.to_vec()).unwrap();
        assert!(html.contains(r#"href="/sub/""#), "{html}");
        assert!(html.contains(r#"href="/hello.txt""#), "{html}");
        assert!(!html.contains(">..</a>"), "{html}");
    }

    #[test]
    fn test_expired_entries_are_evicted() {
        let dir = fixture();
        let sf = FileServer::new(
            dir.path(),
            FileServerOptions {
                cache_duration: Duration::from_millis(200),
                ..FileServerOptions::default()
            },
        );
        sf.serve(&Method::GET, "/hello.txt", &HeaderMap::new()).unwrap();
        sf.serve(&Method::GET, "/sub/data.json", &HeaderMap::new()).unwrap();
        assert_eq!(sf.cached_files(), 2);

        fs::remove_file(dir.path().join("sub").join("data.json")).unwrap();
        std::thread::sleep(Duration::from_millis(300));

        sf.serve(&Method::GET, "/hello.txt", &HeaderMap::new()).unwrap();
        assert_eq!(sf.cached_files(), 1);
    }

    #[test]
    fn test_missing_file_and_traversal_are_misses() {
        let dir = fixture();
        let sf = FileServer::new(dir.path(), FileServerOptions::default());
        let err = sf.serve(&Method::GET, "/nope.txt", &HeaderMap::new()).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::FilesystemMiss { reason: MissReason::NotFound, .. }
        ));
        let err = sf.serve(&Method::GET, "/../secret", &HeaderMap::new()).unwrap_err();
        assert!(matches!(
            err,
            DispatchError::FilesystemMiss { reason: MissReason::Forbidden, .. }
        ));
    }

    #[test]
    fn test_head_has_length_without_body() {
        let dir = fixture();
        let sf = FileServer::new(dir.path(), FileServerOptions::default());
        let served = sf.serve(&Method::HEAD, "/hello.txt", &HeaderMap::new()).unwrap();
        assert!(served.body.is_empty());
        assert_eq!(served.headers[CONTENT_LENGTH], "6");
    }

    #[test]
    fn test_byte_ranges() {
        let dir = fixture();
        let sf = FileServer::new(
            dir.path(),
            FileServerOptions { byte_range: true, ..FileServerOptions::default() },
        );
        let mut req = HeaderMap::new();
        req.insert(RANGE, HeaderValue::from_static("bytes=1-3"));
        let served = sf.serve(&Method::GET, "/hello.txt", &req).unwrap();
        assert_eq!(served.status, StatusCode::PARTIAL_CONTENT);
        assert_eq!(served.body.as_ref(), b"ell");
        assert_eq!(served.headers[CONTENT_RANGE], "bytes 1-3/6");

        req.insert(RANGE, HeaderValue::from_static("bytes=10-"));
        let served = sf.serve(&Method::GET, "/hello.txt", &req).unwrap();
        assert_eq!(served.status, StatusCode::RANGE_NOT_SATISFIABLE);
        assert_eq!(served.headers[CONTENT_RANGE], "bytes */6");
    }

    #[test]
    fn test_parse_range_forms() {
        assert_eq!(parse_range("bytes=0-0", 5), Some((0, 0)));
        assert_eq!(parse_range("bytes=-2", 5), Some((3, 4)));
        assert_eq!(parse_range("bytes=2-", 5), Some((2, 4)));
        assert_eq!(parse_range("bytes=2-100", 5), Some((2, 4)));
        assert_eq!(parse_range("bytes=4-2", 5), None);
        assert_eq!(parse_range("bytes=0-1,3-4", 5), None);
        assert_eq!(parse_range("items=0-1", 5), None);
    }

    #[test]
    fn test_gzip_when_accepted() {
        let dir = fixture();
        let sf = FileServer::new(
            dir.path(),
            FileServerOptions { compress: true, ..FileServerOptions::default() },
        );
        let mut req = HeaderMap::new();
        req.insert(ACCEPT_ENCODING, HeaderValue::from_static("br, gzip;q=0.8"));
        let served = sf.serve(&Method::GET, "/hello.txt", &req).unwrap();
        assert_eq!(served.headers[CONTENT_ENCODING], "gzip");
        let mut out = String::new();
        GzDecoder::new(served.body.as_ref()).read_to_string(&mut out).unwrap();
        assert_eq!(out, "Hello\n");

        let plain = sf.serve(&Method::GET, "/hello.txt", &HeaderMap::new()).unwrap();
        assert!(plain.headers.get(CONTENT_ENCODING).is_none());
    }

    #[test]
    fn test_cache_serves_stale_body_until_expiry() {
        let dir = fixture();
        let sf = FileServer::new(dir.path(), FileServerOptions::default());
        sf.serve(&Method::GET, "/hello.txt", &HeaderMap::new()).unwrap();
        fs::write(dir.path().join("hello.txt"), "Changed\n").unwrap();
        let served = sf.serve(&Method::GET, "/hello.txt", &HeaderMap::new()).unwrap();
        assert_eq!(served.body.as_ref(), b"Hello\n");
        assert_eq!(sf.cached_files(), 1);

        let uncached = FileServer::new(
            dir.path(),
            FileServerOptions { cache_duration: Duration::ZERO, ..FileServerOptions::default() },
        );
        let served = uncached.serve(&Method::GET, "/hello.txt", &HeaderMap::new()).unwrap();
        assert_eq!(served.body.as_ref(), b"Changed\n");
        assert_eq!(uncached.cached_files(), 0);
    }
}
