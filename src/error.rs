//! Error types for registration and dispatch.
//!
//! Registration errors are programming errors: they are returned to the
//! caller of the registration API immediately and are never retried.
//! Dispatch errors are per request; the [`server`](crate::server) adapter
//! converts them into responses and the process keeps serving.

use http::{Method, StatusCode};
use thiserror::Error;

/// Failure raised while registering a route.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum RegistrationError {
    /// Method token is neither `USE` nor part of the configured method set.
    #[error("invalid http method `{method}`")]
    InvalidMethod { method: String },

    /// A non-mount route was registered without any handler.
    #[error("missing handler in route `{path}`")]
    EmptyHandlerChain { path: String },

    /// The path pattern violates the pattern grammar.
    #[error("invalid path pattern `{pattern}`: {reason}")]
    InvalidPattern { pattern: String, reason: String },

    /// The pattern declares more parameters than the per-request buffer holds.
    #[error("path pattern `{pattern}` declares {count} parameters (limit {limit})")]
    TooManyParams {
        pattern: String,
        count: usize,
        limit: usize,
    },

    /// A route id that the registry never handed out.
    #[error("unknown route id {id}")]
    UnknownRoute { id: usize },
}

/// Failure raised while resolving or handling a request.
#[derive(Debug, Error)]
pub enum DispatchError {
    /// No route matched the request.
    #[error("Cannot {method} {path}")]
    NotFound { method: Method, path: String },

    /// No route matched for this method, but routes of other methods match the path.
    #[error("Method Not Allowed")]
    MethodNotAllowed { allowed: Vec<Method> },

    /// The static file backend found nothing servable at the rewritten path.
    #[error("static file {reason}: {path}")]
    FilesystemMiss { path: String, reason: MissReason },

    /// A handler failed with an explicit HTTP status.
    #[error("{message}")]
    Status { status: StatusCode, message: String },

    /// URL building was asked for a parameter it was not given.
    #[error("missing value for route parameter `{name}`")]
    MissingParam { name: String },

    #[error(transparent)]
    Io(#[from] std::io::Error),
}

/// Why the static file backend could not serve a path.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum MissReason {
    NotFound,
    Forbidden,
}

impl std::fmt::Display for MissReason {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            MissReason::NotFound => f.write_str("not found"),
            MissReason::Forbidden => f.write_str("forbidden"),
        }
    }
}

impl DispatchError {
    /// Convenience constructor for handler-reported failures.
    pub fn status(status: StatusCode, message: impl Into<String>) -> Self {
        DispatchError::Status {
            status,
            message: message.into(),
        }
    }

    /// HTTP status the transport layer should answer with.
    #[must_use]
    pub fn status_code(&self) -> StatusCode {
        match self {
            DispatchError::NotFound { .. } => StatusCode::NOT_FOUND,
            DispatchError::MethodNotAllowed { .. } => StatusCode::METHOD_NOT_ALLOWED,
            DispatchError::FilesystemMiss { reason, .. } => match reason {
                MissReason::NotFound => StatusCode::NOT_FOUND,
                MissReason::Forbidden => StatusCode::FORBIDDEN,
            },
            DispatchError::Status { status, .. } => *status,
            DispatchError::MissingParam { .. } | DispatchError::Io(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
        }
    }
}
