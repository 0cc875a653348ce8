//! Transport adapter: converts `http::Request`s into dispatches and
//! dispatch errors into responses.

pub mod request;
pub mod response;
pub mod service;

pub use request::{decode_path, parse_query_params};
pub use response::{error_body, write_json_error};
pub use service::{default_error_handler, ErrorHandler};
