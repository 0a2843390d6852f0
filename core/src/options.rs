//! Per-call request options and the typed success envelope.

use std::time::Duration;

use serde::Serialize;
use uuid::Uuid;

use crate::rate_limit::RateLimitSnapshot;

/// Options for a single call. Not retained after the call returns.
#[derive(Debug, Clone, Default)]
pub struct RequestOptions {
    /// Sent as `Idempotency-Key`. Reuse the same key when retrying a call so
    /// the server can replay the original result instead of acting twice.
    pub idempotency_key: Option<String>,
    /// Overrides the client-wide timeout for this call.
    pub timeout: Option<Duration>,
    /// Extra headers, applied after the client's own and replacing any with
    /// the same name.
    pub headers: Vec<(String, String)>,
}

impl RequestOptions {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn idempotency_key(mut self, key: impl Into<String>) -> Self {
        self.idempotency_key = Some(key.into());
        self
    }

    /// Use a fresh random idempotency key. Keep the returned options around
    /// and pass them again when retrying.
    pub fn with_generated_idempotency_key(self) -> Self {
        self.idempotency_key(Uuid::new_v4().to_string())
    }

    pub fn timeout(mut self, timeout: Duration) -> Self {
        self.timeout = Some(timeout);
        self
    }

    pub fn header(mut self, name: impl Into<String>, value: impl Into<String>) -> Self {
        self.headers.push((name.into(), value.into()));
        self
    }
}

/// A successful call.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct ApiResponse<T> {
    pub data: T,
    /// Rate-limit state reported on this response; zeroed if the server sent
    /// no rate-limit headers.
    pub rate_limit: RateLimitSnapshot,
    /// Server-assigned id, useful in support requests.
    pub request_id: String,
    /// True when the server returned a stored result for a repeated
    /// idempotency key instead of executing the call again.
    pub was_replayed: bool,
}
