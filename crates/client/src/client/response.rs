//! Response classification
//!
//! A pure mapping from an HTTP response to either a parsed payload or a
//! typed [`ApiError`]. Nothing here performs I/O, so the whole table is
//! unit-testable without a transport.

use std::time::Duration;

use serde_json::{Map, Value};
use tracing::debug;

use crate::error::ApiError;

/// Wait applied when a 429 carries no usable `Retry-After` header.
pub const DEFAULT_RETRY_AFTER: Duration = Duration::from_secs(60);

const DEFAULT_UNAUTHORIZED_MESSAGE: &str = "Invalid or expired credential";

/// The transport-level view of one HTTP response
#[derive(Debug, Clone)]
pub struct RawResponse {
    /// HTTP status code
    pub status: u16,
    /// Raw `Retry-After` header value, when present
    pub retry_after: Option<String>,
    /// Response body as text
    pub body: String,
}

/// Classify a response into a payload or a typed error
///
/// `path` is the request path the response answers; it supplies the
/// resource type and identifier for 404s.
pub fn classify(response: &RawResponse, path: &str) -> Result<Value, ApiError> {
    match response.status {
        200 | 201 => Ok(parse_success_body(&response.body)),
        // No content; the body is not even inspected.
        204 => Ok(Value::Object(Map::new())),
        401 => Err(ApiError::Unauthorized {
            message: remote_message(&response.body)
                .unwrap_or_else(|| DEFAULT_UNAUTHORIZED_MESSAGE.to_string()),
        }),
        404 => {
            let (resource_type, identifier) = resource_from_path(path);
            Err(ApiError::NotFound { resource_type, identifier })
        }
        429 => Err(ApiError::RateLimited {
            retry_after: parse_retry_after(response.retry_after.as_deref()),
        }),
        400 => Err(ApiError::Validation {
            message: remote_message(&response.body)
                .unwrap_or_else(|| fallback_message(response)),
        }),
        status => Err(ApiError::Api {
            status,
            message: remote_message(&response.body)
                .unwrap_or_else(|| fallback_message(response)),
        }),
    }
}

/// Parse a 200/201 body, treating anything unparsable as an empty payload
///
/// The service is documented to sometimes answer success with an empty or
/// non-JSON body; those responses count as an empty success payload, not
/// an error.
fn parse_success_body(body: &str) -> Value {
    if body.trim().is_empty() {
        return Value::Object(Map::new());
    }
    match serde_json::from_str(body) {
        Ok(value) => value,
        Err(err) => {
            debug!("Success response with unparsable body ({err}), treating as empty");
            Value::Object(Map::new())
        }
    }
}

/// Extract the remote error message from a body's `err` or `error` field
fn remote_message(body: &str) -> Option<String> {
    let parsed: Value = serde_json::from_str(body).ok()?;
    let field = parsed.get("err").or_else(|| parsed.get("error"))?;
    match field {
        Value::String(message) => Some(message.clone()),
        Value::Null => None,
        other => Some(other.to_string()),
    }
}

fn fallback_message(response: &RawResponse) -> String {
    let trimmed = response.body.trim();
    if trimmed.is_empty() {
        format!("HTTP {}", response.status)
    } else {
        trimmed.to_string()
    }
}

/// Parse a `Retry-After` header value as seconds
///
/// Absent or malformed values (including the HTTP-date form, which the
/// service does not use) fall back to [`DEFAULT_RETRY_AFTER`].
fn parse_retry_after(header: Option<&str>) -> Duration {
    header
        .and_then(|value| value.trim().parse::<f64>().ok())
        .filter(|secs| secs.is_finite() && *secs >= 0.0)
        .map(Duration::from_secs_f64)
        .unwrap_or(DEFAULT_RETRY_AFTER)
}

/// Derive (resource type, identifier) from the first two path segments
fn resource_from_path(path: &str) -> (String, Option<String>) {
    let mut segments = path.split('/').filter(|segment| !segment.is_empty());
    let resource_type =
        segments.next().map_or_else(|| "resource".to_string(), str::to_string);
    let identifier = segments.next().map(str::to_string);
    (resource_type, identifier)
}

#[cfg(test)]
mod tests {
    use super::*;

    fn response(status: u16, body: &str) -> RawResponse {
        RawResponse { status, retry_after: None, body: body.to_string() }
    }

    #[test]
    fn success_parses_the_body() {
        let payload = classify(&response(200, r#"{"id": "9hz", "name": "Ship it"}"#), "task/9hz")
            .unwrap();
        assert_eq!(payload["name"], "Ship it");
    }

    #[test]
    fn created_parses_like_success() {
        let payload = classify(&response(201, r#"{"id": "new"}"#), "task").unwrap();
        assert_eq!(payload["id"], "new");
    }

    #[test]
    fn empty_or_unparsable_success_bodies_become_empty_payloads() {
        for body in ["", "   ", "not json", "<html>oops</html>"] {
            let payload = classify(&response(200, body), "task/9hz").unwrap();
            assert_eq!(payload, Value::Object(Map::new()), "body: {body:?}");
        }
    }

    #[test]
    fn no_content_is_an_empty_payload_without_parsing() {
        // A 204 with a (nonsensical) body must not attempt a parse.
        let payload = classify(&response(204, "ignored"), "task/9hz").unwrap();
        assert_eq!(payload, Value::Object(Map::new()));
    }

    #[test]
    fn unauthorized_extracts_the_remote_message() {
        let err = classify(&response(401, r#"{"err": "Token invalid"}"#), "task/9hz")
            .unwrap_err();
        assert!(matches!(err, ApiError::Unauthorized { message } if message == "Token invalid"));
    }

    #[test]
    fn unauthorized_defaults_without_a_message() {
        let err = classify(&response(401, "{}"), "task/9hz").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Unauthorized { message } if message == "Invalid or expired credential"
        ));
    }

    #[test]
    fn error_field_is_accepted_as_an_alternative() {
        let err = classify(&response(500, r#"{"error": "broke"}"#), "task/9hz").unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 500, message } if message == "broke"));
    }

    #[test]
    fn not_found_derives_resource_from_the_path() {
        let err = classify(&response(404, ""), "/task/9hz42/comments").unwrap_err();
        match err {
            ApiError::NotFound { resource_type, identifier } => {
                assert_eq!(resource_type, "task");
                assert_eq!(identifier.as_deref(), Some("9hz42"));
            }
            other => panic!("expected NotFound, got {other:?}"),
        }
    }

    #[test]
    fn not_found_without_an_identifier() {
        let err = classify(&response(404, ""), "workspaces").unwrap_err();
        assert!(matches!(
            err,
            ApiError::NotFound { resource_type, identifier: None } if resource_type == "workspaces"
        ));
    }

    #[test]
    fn rate_limited_honors_the_retry_after_header() {
        let raw = RawResponse {
            status: 429,
            retry_after: Some("7".to_string()),
            body: String::new(),
        };
        let err = classify(&raw, "task/9hz").unwrap_err();
        assert!(matches!(
            err,
            ApiError::RateLimited { retry_after } if retry_after == Duration::from_secs(7)
        ));
    }

    #[test]
    fn rate_limited_defaults_on_missing_or_malformed_header() {
        for retry_after in [None, Some("soon".to_string()), Some("-3".to_string())] {
            let raw = RawResponse { status: 429, retry_after, body: String::new() };
            let err = classify(&raw, "task/9hz").unwrap_err();
            assert!(matches!(
                err,
                ApiError::RateLimited { retry_after } if retry_after == DEFAULT_RETRY_AFTER
            ));
        }
    }

    #[test]
    fn bad_request_classifies_as_validation() {
        let err = classify(&response(400, r#"{"err": "name is required"}"#), "list").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Validation { message } if message == "name is required"
        ));
    }

    #[test]
    fn other_statuses_keep_status_and_body() {
        let err = classify(&response(503, "upstream sad"), "task/9hz").unwrap_err();
        assert!(matches!(
            err,
            ApiError::Api { status: 503, message } if message == "upstream sad"
        ));
    }

    #[test]
    fn empty_generic_bodies_render_the_status() {
        let err = classify(&response(502, ""), "task/9hz").unwrap_err();
        assert!(matches!(err, ApiError::Api { status: 502, message } if message == "HTTP 502"));
    }

    #[test]
    fn non_string_error_fields_are_stringified() {
        let err = classify(&response(500, r#"{"err": {"code": 5}}"#), "task").unwrap_err();
        assert!(matches!(err, ApiError::Api { message, .. } if message == r#"{"code":5}"#));
    }
}
