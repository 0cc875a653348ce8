use std::borrow::Cow;
use std::collections::HashMap;

use tracing::debug;

/// Percent-decode a request path when `unescape` is set.
///
/// Paths that do not decode to valid UTF-8 are returned unchanged.
#[must_use]
pub fn decode_path(raw: &str, unescape: bool) -> Cow<'_, str> {
    if !unescape || !raw.contains('%') {
        return Cow::Borrowed(raw);
    }
    match urlencoding::decode(raw) {
        Ok(decoded) => decoded,
        Err(e) => {
            debug!(path = %raw, error = %e, "Path is not valid UTF-8 after decoding, kept raw");
            Cow::Borrowed(raw)
        }
    }
}

/// Parse a query string into decoded key/value pairs. Later keys win.
///
/// `+` is treated as a space, as browsers encode form submissions.
#[must_use]
pub fn parse_query_params(query: Option<&str>) -> HashMap<String, String> {
    let Some(query) = query else {
        return HashMap::new();
    };
    query
        .split('&')
        .filter(|pair| !pair.is_empty())
        .map(|pair| {
            let (k, v) = pair.split_once('=').unwrap_or((pair, ""));
            (decode_component(k), decode_component(v))
        })
        .collect()
}

fn decode_component(s: &str) -> String {
    let spaced = s.replace('+', " ");
    match urlencoding::decode(&spaced) {
        Ok(v) => v.into_owned(),
        Err(_) => spaced,
    }
}
