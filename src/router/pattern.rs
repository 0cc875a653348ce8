//! Path pattern compiler.
//!
//! Turns a normalized path pattern such as `/users/:id/files/*` into a
//! sequence of [`Segment`]s that can be matched against request paths
//! without allocating.
//!
//! ## Grammar
//!
//! | Part      | Meaning                                                    |
//! |-----------|------------------------------------------------------------|
//! | `users`   | literal segment, matched byte for byte                     |
//! | `:id`     | named parameter, captures exactly one non-empty segment    |
//! | `*`       | greedy catch-all named `*`, final segment only             |
//! | `*rest`   | greedy catch-all named `rest`, final segment only          |
//!
//! Captured values are recorded as byte ranges into the matched path
//! ([`ParamRanges`]), in parameter declaration order.

use std::sync::Arc;

use smallvec::SmallVec;

use crate::error::{DispatchError, RegistrationError};

/// Hard upper bound on parameters per pattern.
pub const MAX_PARAMS: usize = 30;

/// Maximum number of captured parameters before the range buffer spills to the heap.
/// Most routes have ≤4 path params (e.g. `/users/:id/posts/:post_id`).
pub const MAX_INLINE_PARAMS: usize = 8;

/// Byte ranges of captured parameter values, in declaration order.
pub type ParamRanges = SmallVec<[(usize, usize); MAX_INLINE_PARAMS]>;

/// One compiled part of a path pattern.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Segment {
    Literal(Box<str>),
    Param { name: Arc<str>, greedy: bool },
}

/// A compiled path pattern.
#[derive(Debug, Clone)]
pub struct PathPattern {
    source: String,
    segments: Vec<Segment>,
    param_names: Vec<Arc<str>>,
    /// Length of the literal text every matching path starts with.
    required_prefix_len: usize,
    is_root: bool,
    is_wildcard_root: bool,
    trailing_slash: bool,
}

impl PathPattern {
    /// Compile a normalized pattern.
    ///
    /// # Errors
    ///
    /// Returns [`RegistrationError::InvalidPattern`] for empty or duplicate
    /// parameter names and non-final catch-alls, and
    /// [`RegistrationError::TooManyParams`] above [`MAX_PARAMS`].
    pub fn compile(pattern: &str) -> Result<Self, RegistrationError> {
        let source = match pattern {
            "" => "/".to_string(),
            p if p.starts_with('/') => p.to_string(),
            p => format!("/{p}"),
        };

        let invalid = |reason: &str| RegistrationError::InvalidPattern {
            pattern: source.clone(),
            reason: reason.to_string(),
        };

        let parts: Vec<(usize, &str)> = {
            let mut offset = 0;
            let mut out = Vec::new();
            for part in source.split('/') {
                if !part.is_empty() {
                    out.push((offset, part));
                }
                offset += part.len() + 1;
            }
            out
        };

        let mut segments = Vec::with_capacity(parts.len());
        let mut param_names: Vec<Arc<str>> = Vec::new();
        let mut required_prefix_len = source.len();
        let last = parts.len().saturating_sub(1);

        for (i, (offset, part)) in parts.iter().enumerate() {
            let (name, greedy) = if let Some(name) = part.strip_prefix(':') {
                if name.is_empty() {
                    return Err(invalid("empty parameter name"));
                }
                (name, false)
            } else if let Some(name) = part.strip_prefix('*') {
                if i != last {
                    return Err(invalid("catch-all must be the final segment"));
                }
                (if name.is_empty() { "*" } else { name }, true)
            } else {
                segments.push(Segment::Literal((*part).into()));
                continue;
            };

            if param_names.iter().any(|n| n.as_ref() == name) {
                return Err(invalid(&format!("duplicate parameter `{name}`")));
            }
            if param_names.is_empty() {
                // the slash before a catch-all is optional, so it is not required
                required_prefix_len = if greedy { offset - 1 } else { *offset };
            }
            let name: Arc<str> = Arc::from(name);
            param_names.push(Arc::clone(&name));
            segments.push(Segment::Param { name, greedy });
        }

        if param_names.len() > MAX_PARAMS {
            return Err(RegistrationError::TooManyParams {
                pattern: source,
                count: param_names.len(),
                limit: MAX_PARAMS,
            });
        }

        let ends_greedy = matches!(segments.last(), Some(Segment::Param { greedy: true, .. }));
        Ok(Self {
            is_root: source == "/",
            is_wildcard_root: source == "/*",
            trailing_slash: source.len() > 1 && source.ends_with('/') && !ends_greedy,
            required_prefix_len,
            segments,
            param_names,
            source,
        })
    }

    /// The normalized pattern text this was compiled from.
    #[must_use]
    pub fn source(&self) -> &str {
        &self.source
    }

    #[must_use]
    pub fn segments(&self) -> &[Segment] {
        &self.segments
    }

    /// Parameter names in declaration order.
    #[must_use]
    pub fn param_names(&self) -> &[Arc<str>] {
        &self.param_names
    }

    #[must_use]
    pub fn is_root(&self) -> bool {
        self.is_root
    }

    #[must_use]
    pub fn is_wildcard_root(&self) -> bool {
        self.is_wildcard_root
    }

    /// Literal text that every path matched by this pattern starts with.
    #[must_use]
    pub fn required_prefix(&self) -> &str {
        &self.source[..self.required_prefix_len]
    }

    /// Match `path` against the pattern, recording captures in `out`.
    ///
    /// With `prefix` set (middleware semantics) a literal-only pattern
    /// matches any path starting with its text, so `/api` also matches
    /// `/apix`. Patterns with parameters match a leading run of whole
    /// segments.
    pub fn matches(&self, path: &str, prefix: bool, out: &mut ParamRanges) -> bool {
        out.clear();
        let bytes = path.as_bytes();
        let len = bytes.len();

        if self.is_root {
            return prefix || path == "/";
        }
        if self.is_wildcard_root {
            out.push((len.min(1), len));
            return true;
        }
        if prefix && self.param_names.is_empty() {
            return path.starts_with(self.source.as_str());
        }

        let mut pos = 0;
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => {
                    if pos >= len || bytes[pos] != b'/' {
                        return false;
                    }
                    let start = pos + 1;
                    let end = start + text.len();
                    if end > len || &bytes[start..end] != text.as_bytes() {
                        return false;
                    }
                    if end < len && bytes[end] != b'/' {
                        return false;
                    }
                    pos = end;
                }
                Segment::Param { greedy: false, .. } => {
                    if pos >= len || bytes[pos] != b'/' {
                        return false;
                    }
                    let start = pos + 1;
                    let end = bytes[start..]
                        .iter()
                        .position(|b| *b == b'/')
                        .map_or(len, |i| start + i);
                    if end == start {
                        return false;
                    }
                    out.push((start, end));
                    pos = end;
                }
                Segment::Param { greedy: true, .. } => {
                    if pos == len {
                        out.push((len, len));
                    } else if bytes[pos] == b'/' {
                        out.push((pos + 1, len));
                    } else {
                        return false;
                    }
                    pos = len;
                }
            }
        }

        if self.trailing_slash {
            if pos >= len || bytes[pos] != b'/' {
                return false;
            }
            pos += 1;
            return pos == len || prefix;
        }

        pos == len || (prefix && bytes[pos] == b'/')
    }

    /// Substitute parameter values back into the pattern.
    ///
    /// # Errors
    ///
    /// [`DispatchError::MissingParam`] when `lookup` has no value for a parameter.
    pub fn build_url<'a>(
        &self,
        lookup: impl Fn(&str) -> Option<&'a str>,
    ) -> Result<String, DispatchError> {
        let mut url = String::with_capacity(self.source.len());
        for seg in &self.segments {
            match seg {
                Segment::Literal(text) => {
                    url.push('/');
                    url.push_str(text);
                }
                Segment::Param { name, greedy } => {
                    let value = match lookup(name) {
                        Some(v) => v,
                        None if *greedy => "",
                        None => {
                            return Err(DispatchError::MissingParam {
                                name: name.to_string(),
                            })
                        }
                    };
                    if *greedy && value.is_empty() {
                        continue;
                    }
                    url.push('/');
                    if *greedy {
                        url.push_str(value.trim_start_matches('/'));
                    } else {
                        url.push_str(value);
                    }
                }
            }
        }
        if url.is_empty() || self.trailing_slash {
            url.push('/');
        }
        Ok(url)
    }
}
