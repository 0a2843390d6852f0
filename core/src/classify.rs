//! Maps a non-2xx response onto the client's error taxonomy.
//!
//! Classification is a pure function of the status code, the parsed body and
//! the rate-limit snapshot already taken from the same response. It performs
//! no I/O and never retries.

use serde_json::Value;

use crate::error::{Error, FieldError, GenericError, RateLimitError, ValidationError};
use crate::rate_limit::RateLimitSnapshot;

const DEFAULT_VALIDATION_MESSAGE: &str = "Validation error";

/// Classify a failed response.
///
/// `body` is the parsed error body, or an empty object if the body was not
/// JSON. `rate_limit` is the snapshot parsed from this response's headers.
pub fn classify(
    status: u16,
    body: &Value,
    request_id: Option<String>,
    rate_limit: Option<RateLimitSnapshot>,
) -> Error {
    match status {
        429 => RateLimitError {
            rate_limit: rate_limit.unwrap_or_default(),
            request_id,
        }
        .into(),
        400 => match body.get("details").and_then(field_errors) {
            Some(field_errors) => ValidationError {
                message: error_message(body)
                    .unwrap_or(DEFAULT_VALIDATION_MESSAGE)
                    .to_string(),
                field_errors,
                request_id,
            }
            .into(),
            None => generic(status, body, request_id),
        },
        _ => generic(status, body, request_id),
    }
}

/// The `requestId` member of a response body, if it is a string.
pub(crate) fn body_request_id(body: &Value) -> Option<String> {
    body.get("requestId")
        .and_then(Value::as_str)
        .map(str::to_string)
}

fn generic(status: u16, body: &Value, request_id: Option<String>) -> Error {
    let message = error_message(body)
        .map(str::to_string)
        .unwrap_or_else(|| format!("Request failed with status {status}"));
    GenericError::http(status, message, request_id, body.get("details").cloned()).into()
}

fn error_message(body: &Value) -> Option<&str> {
    body.get("error")
        .and_then(Value::as_str)
        .filter(|message| !message.is_empty())
}

/// Read `details` as a list of field errors. Any entry that is not
/// `{path: [..], message: ".."}` makes the whole list malformed.
fn field_errors(details: &Value) -> Option<Vec<FieldError>> {
    details.as_array()?.iter().map(field_error).collect()
}

fn field_error(entry: &Value) -> Option<FieldError> {
    let path = entry
        .get("path")?
        .as_array()?
        .iter()
        .map(|segment| match segment {
            Value::String(name) => Some(name.clone()),
            Value::Number(index) if index.is_u64() => Some(index.to_string()),
            _ => None,
        })
        .collect::<Option<Vec<_>>>()?;
    let message = entry.get("message")?.as_str()?.to_string();
    Some(FieldError { path, message })
}

#[cfg(test)]
mod tests {
    use serde_json::json;

    use super::*;
    use crate::error::ErrorKind;

    fn snapshot() -> RateLimitSnapshot {
        RateLimitSnapshot {
            limit: 100,
            remaining: 0,
            reset_at: 1_700_000_060,
            reset_in_ms: 60_000,
        }
    }

    #[test]
    fn too_many_requests_carries_snapshot() {
        let err = classify(429, &json!({"error": "Rate limit exceeded"}), Some("req_1".into()), Some(snapshot()));
        match err {
            Error::RateLimited(err) => {
                assert_eq!(err.rate_limit, snapshot());
                assert_eq!(err.request_id.as_deref(), Some("req_1"));
            }
            other => panic!("expected rate limit error, got {other:?}"),
        }
    }

    #[test]
    fn too_many_requests_without_headers_uses_zeroed_snapshot() {
        let err = classify(429, &json!({}), None, None);
        assert_eq!(err.rate_limit(), Some(&RateLimitSnapshot::default()));
    }

    #[test]
    fn bad_request_with_details_is_validation() {
        let body = json!({
            "error": "Validation error",
            "details": [
                {"path": ["channelName"], "message": "Required"},
                {"path": ["metadata", "items", 2], "message": "Expected string"}
            ],
            "requestId": "req_123"
        });
        let err = classify(400, &body, body_request_id(&body), None);
        let fields = err.field_errors().expect("validation error");
        assert_eq!(fields.len(), 2);
        assert_eq!(fields[0].path, vec!["channelName"]);
        assert_eq!(fields[0].message, "Required");
        assert_eq!(fields[1].path, vec!["metadata", "items", "2"]);
        assert_eq!(err.request_id(), Some("req_123"));
        assert_eq!(err.message(), "Validation error");
    }

    #[test]
    fn bad_request_without_details_is_generic() {
        let err = classify(400, &json!({"error": "Invalid JSON body"}), None, None);
        match err {
            Error::Generic(err) => {
                assert_eq!(err.status_code, Some(400));
                assert_eq!(err.kind, ErrorKind::Http);
                assert_eq!(err.message, "Invalid JSON body");
            }
            other => panic!("expected generic error, got {other:?}"),
        }
    }

    #[test]
    fn bad_request_with_malformed_details_is_generic() {
        let body = json!({"error": "Bad", "details": [{"path": "channelName", "message": "Required"}]});
        let err = classify(400, &body, None, None);
        assert!(err.field_errors().is_none());
        match err {
            Error::Generic(err) => assert_eq!(err.details, Some(body["details"].clone())),
            other => panic!("expected generic error, got {other:?}"),
        }

        let err = classify(400, &json!({"details": "nope"}), None, None);
        assert!(matches!(err, Error::Generic(_)));
    }

    #[test]
    fn other_status_uses_server_message() {
        let err = classify(401, &json!({"error": "Unauthorized"}), None, None);
        assert_eq!(err.status_code(), Some(401));
        assert_eq!(err.message(), "Unauthorized");
        assert!(err.field_errors().is_none());
    }

    #[test]
    fn other_status_without_message_uses_default() {
        let err = classify(503, &json!({}), None, None);
        assert_eq!(err.status_code(), Some(503));
        assert_eq!(err.message(), "Request failed with status 503");
    }
}
