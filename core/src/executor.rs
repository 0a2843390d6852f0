//! Turns one API call into exactly one HTTP round-trip.
//!
//! # Design
//! `send` is split into three steps so that each can be exercised alone:
//!
//! 1. [`RequestExecutor::build_request`] assembles headers and body.
//! 2. The transport runs under `tokio::time::timeout`. It is called once;
//!    failures are returned to the caller, never retried here.
//! 3. [`RequestExecutor::parse_response`] records the rate-limit headers and
//!    either decodes the `{data, requestId}` envelope or classifies the
//!    failure.
//!
//! The executor keeps no per-call state. The only shared mutable state is
//! the rate-limit slot, where concurrent calls race and the last writer wins.

use std::sync::Arc;

use reqwest::header::{HeaderName, HeaderValue};
use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::Value;
use tracing::{debug, warn};

use crate::classify::{body_request_id, classify};
use crate::config::ClientConfig;
use crate::error::{Error, GenericError, Result};
use crate::http::{set_header, HttpMethod, HttpRequest, HttpResponse};
use crate::options::{ApiResponse, RequestOptions};
use crate::rate_limit::RateLimitTracker;
use crate::transport::TransportError;

pub const IDEMPOTENCY_KEY_HEADER: &str = "Idempotency-Key";
pub const REPLAY_HEADER: &str = "X-Idempotent-Replay";
pub const REQUEST_ID_HEADER: &str = "X-Request-Id";

const USER_AGENT: &str = concat!("emitkit-rust/", env!("CARGO_PKG_VERSION"));

/// Sends requests on behalf of an [`EmitKit`](crate::EmitKit) client.
#[derive(Debug, Clone)]
pub struct RequestExecutor {
    config: Arc<ClientConfig>,
    rate_limit: Arc<RateLimitTracker>,
}

impl RequestExecutor {
    pub(crate) fn new(config: Arc<ClientConfig>, rate_limit: Arc<RateLimitTracker>) -> Self {
        Self { config, rate_limit }
    }

    /// Send `body` to `path` and decode the response's `data` as `T`.
    pub async fn send<T, B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<ApiResponse<T>>
    where
        T: DeserializeOwned,
        B: Serialize + ?Sized,
    {
        let request = self.build_request(method, path, body, options)?;
        let timeout = options.timeout.unwrap_or(self.config.timeout);
        let timeout_ms = u64::try_from(timeout.as_millis()).unwrap_or(u64::MAX);

        debug!(
            %method,
            url = %request.url,
            idempotent = options.idempotency_key.is_some(),
            timeout_ms,
            "sending request"
        );

        let response = match tokio::time::timeout(timeout, self.config.transport.send(request, timeout)).await {
            Ok(Ok(response)) => response,
            Ok(Err(TransportError::Timeout)) | Err(_) => {
                warn!(%method, path, timeout_ms, "request timed out");
                return Err(GenericError::timeout(timeout.as_millis()).into());
            }
            Ok(Err(TransportError::Network(message))) => {
                warn!(%method, path, error = %message, "request failed without a response");
                return Err(GenericError::network(message).into());
            }
        };

        debug!(%method, path, status = response.status, "received response");
        self.parse_response(response)
    }

    /// Build the outbound request without sending it.
    pub fn build_request<B>(
        &self,
        method: HttpMethod,
        path: &str,
        body: Option<&B>,
        options: &RequestOptions,
    ) -> Result<HttpRequest>
    where
        B: Serialize + ?Sized,
    {
        let body = body
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| GenericError::encode(format!("failed to serialize request body: {e}")))?;

        let mut headers = vec![
            ("Authorization".to_string(), format!("Bearer {}", self.config.api_key)),
            ("User-Agent".to_string(), USER_AGENT.to_string()),
        ];
        if body.is_some() {
            headers.push(("Content-Type".to_string(), "application/json".to_string()));
        }
        if let Some(key) = &options.idempotency_key {
            headers.push((IDEMPOTENCY_KEY_HEADER.to_string(), key.clone()));
        }
        for (name, value) in &options.headers {
            set_header(&mut headers, name, value);
        }
        for (name, value) in &headers {
            check_header(name, value)?;
        }

        Ok(HttpRequest {
            method,
            url: format!("{}/{}", self.config.base_url, path.trim_start_matches('/')),
            headers,
            body,
        })
    }

    /// Record rate-limit state from `response`, then decode it or classify
    /// the failure.
    pub fn parse_response<T: DeserializeOwned>(&self, response: HttpResponse) -> Result<ApiResponse<T>> {
        let rate_limit = self.rate_limit.update(&response);

        if !response.is_success() {
            let body: Value = serde_json::from_str(&response.body).unwrap_or_else(|_| Value::Object(Default::default()));
            let request_id = body_request_id(&body).or_else(|| header_request_id(&response));
            let err = classify(response.status, &body, request_id, rate_limit);
            if let Error::RateLimited(limited) = &err {
                warn!(
                    remaining = limited.rate_limit.remaining,
                    reset_in_ms = limited.rate_limit.reset_in_ms,
                    "rate limit exceeded"
                );
            }
            return Err(err);
        }

        let mut body: Value = serde_json::from_str(&response.body).map_err(|e| {
            GenericError::decode(
                response.status,
                format!("invalid JSON in response body: {e}"),
                header_request_id(&response),
            )
        })?;
        let request_id = body_request_id(&body)
            .or_else(|| header_request_id(&response))
            .unwrap_or_default();
        let data = body.get_mut("data").map(Value::take).unwrap_or(Value::Null);
        let data = serde_json::from_value(data).map_err(|e| {
            GenericError::decode(
                response.status,
                format!("unexpected response data: {e}"),
                Some(request_id.clone()),
            )
        })?;

        Ok(ApiResponse {
            data,
            rate_limit: rate_limit.unwrap_or_default(),
            request_id,
            was_replayed: response
                .header(REPLAY_HEADER)
                .is_some_and(|value| value.trim().eq_ignore_ascii_case("true")),
        })
    }
}

/// Reject headers that can never go on the wire, before anything is sent.
fn check_header(name: &str, value: &str) -> Result<()> {
    HeaderName::from_bytes(name.as_bytes())
        .map_err(|e| GenericError::encode(format!("invalid header name {name:?}: {e}")))?;
    HeaderValue::from_str(value).map_err(|e| GenericError::encode(format!("invalid header value for {name}: {e}")))?;
    Ok(())
}

fn header_request_id(response: &HttpResponse) -> Option<String> {
    response.header(REQUEST_ID_HEADER).map(str::to_string)
}
