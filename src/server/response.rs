use bytes::Bytes;
use http::header::{HeaderValue, CONTENT_TYPE};
use http::StatusCode;
use serde_json::{json, Value};

use crate::dispatcher::Response;
use crate::error::DispatchError;

/// JSON body used for error responses: `{"error": message}`.
#[must_use]
pub fn error_body(err: &DispatchError) -> Value {
    json!({ "error": err.to_string() })
}

/// Overwrite `res` with a JSON error.
pub fn write_json_error(res: &mut Response, status: StatusCode, body: &Value) {
    res.status = status;
    res.headers
        .insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    res.body = Bytes::from(body.to_string());
}
