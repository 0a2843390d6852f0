//! Error types for the EmitKit client.
//!
//! # Design
//! Every failed call returns one of three variants. Rate limiting (429) and
//! payload validation (400 with field details) get dedicated variants
//! because callers act on them differently: wait out the window, or fix the
//! payload. Everything else, including transport failures and timeouts, is
//! a [`GenericError`] whose [`ErrorKind`] says where it came from.
//!
//! All variants answer [`Error::message`], [`Error::status_code`] and
//! [`Error::request_id`], so callers can log or branch without matching.
//!
//! Construction-time problems are reported separately as [`ConfigError`].

use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::rate_limit::RateLimitSnapshot;

/// Result alias for calls made through the client.
pub type Result<T, E = Error> = std::result::Result<T, E>;

/// A failed API call.
#[derive(Debug, Clone, Error)]
pub enum Error {
    #[error(transparent)]
    Generic(#[from] GenericError),

    #[error(transparent)]
    RateLimited(#[from] RateLimitError),

    #[error(transparent)]
    Validation(#[from] ValidationError),
}

impl Error {
    pub fn message(&self) -> String {
        match self {
            Error::Generic(err) => err.message.clone(),
            Error::RateLimited(err) => err.to_string(),
            Error::Validation(err) => err.message.clone(),
        }
    }

    /// HTTP status of the response, or `None` when no response arrived.
    pub fn status_code(&self) -> Option<u16> {
        match self {
            Error::Generic(err) => err.status_code,
            Error::RateLimited(_) => Some(429),
            Error::Validation(_) => Some(400),
        }
    }

    pub fn request_id(&self) -> Option<&str> {
        match self {
            Error::Generic(err) => err.request_id.as_deref(),
            Error::RateLimited(err) => err.request_id.as_deref(),
            Error::Validation(err) => err.request_id.as_deref(),
        }
    }

    /// Rate-limit snapshot attached to a 429.
    pub fn rate_limit(&self) -> Option<&RateLimitSnapshot> {
        match self {
            Error::RateLimited(err) => Some(&err.rate_limit),
            _ => None,
        }
    }

    /// Field-level errors attached to a validation failure.
    pub fn field_errors(&self) -> Option<&[FieldError]> {
        match self {
            Error::Validation(err) => Some(&err.field_errors),
            _ => None,
        }
    }

    pub fn is_timeout(&self) -> bool {
        matches!(self, Error::Generic(err) if err.kind == ErrorKind::Timeout)
    }
}

/// Where a [`GenericError`] originated.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ErrorKind {
    /// The server answered with a non-2xx status.
    Http,
    /// No response within the effective timeout.
    Timeout,
    /// The transport failed before any response arrived.
    Network,
    /// A 2xx body could not be decoded into the expected shape.
    Decode,
    /// The request payload could not be serialized.
    Encode,
}

/// Any failure that is neither a rate limit nor a structured validation error.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct GenericError {
    pub kind: ErrorKind,
    pub message: String,
    pub status_code: Option<u16>,
    pub request_id: Option<String>,
    /// Raw `details` member of the error body, if the server sent one.
    pub details: Option<serde_json::Value>,
}

impl GenericError {
    pub(crate) fn http(
        status: u16,
        message: impl Into<String>,
        request_id: Option<String>,
        details: Option<serde_json::Value>,
    ) -> Self {
        Self {
            kind: ErrorKind::Http,
            message: message.into(),
            status_code: Some(status),
            request_id,
            details,
        }
    }

    pub(crate) fn timeout(after_ms: u128) -> Self {
        Self::without_response(ErrorKind::Timeout, format!("Request timed out after {after_ms}ms"))
    }

    pub(crate) fn network(message: impl Into<String>) -> Self {
        Self::without_response(ErrorKind::Network, message)
    }

    pub(crate) fn encode(message: impl Into<String>) -> Self {
        Self::without_response(ErrorKind::Encode, message)
    }

    pub(crate) fn decode(status: u16, message: impl Into<String>, request_id: Option<String>) -> Self {
        Self {
            kind: ErrorKind::Decode,
            message: message.into(),
            status_code: Some(status),
            request_id,
            details: None,
        }
    }

    fn without_response(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
            status_code: None,
            request_id: None,
            details: None,
        }
    }
}

/// The server rejected the call with 429.
#[derive(Debug, Clone, Error)]
#[error("Rate limit exceeded. Resets in {}s", .rate_limit.reset_in_secs())]
pub struct RateLimitError {
    pub rate_limit: RateLimitSnapshot,
    pub request_id: Option<String>,
}

/// The server rejected the payload with 400 and per-field details.
#[derive(Debug, Clone, Error)]
#[error("{message}")]
pub struct ValidationError {
    pub message: String,
    pub field_errors: Vec<FieldError>,
    pub request_id: Option<String>,
}

/// One offending field in a [`ValidationError`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct FieldError {
    /// Path from the payload root to the field, e.g. `["metadata", "amount"]`.
    pub path: Vec<String>,
    pub message: String,
}

impl FieldError {
    /// Dotted form of [`path`](Self::path).
    pub fn dotted_path(&self) -> String {
        self.path.join(".")
    }
}

/// The client could not be constructed.
#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("API key must not be empty")]
    MissingApiKey,

    #[error("environment variable {name} is not set")]
    MissingEnv { name: &'static str },

    #[error("environment variable {name} has invalid value {value:?}")]
    InvalidEnv { name: &'static str, value: String },

    #[error("failed to build HTTP client: {0}")]
    HttpClient(#[from] reqwest::Error),
}
