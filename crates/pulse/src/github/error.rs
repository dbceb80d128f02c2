//! Mapping of GitHub HTTP and GraphQL failures onto [`ApiError`].

use chrono::{DateTime, Utc};
use serde::Deserialize;

use crate::api::ApiError;
use crate::http::HttpResponse;

use super::rest::parse_rate_limit_headers;

/// One entry of a GraphQL `errors` array.
#[derive(Debug, Clone, Deserialize, PartialEq, Eq)]
pub struct GraphQlError {
    pub message: String,
    #[serde(rename = "type", default)]
    pub kind: Option<String>,
}

#[derive(Deserialize)]
struct RestErrorBody {
    #[serde(default)]
    message: Option<String>,
}

fn rest_message(resp: &HttpResponse) -> Option<String> {
    resp.json::<RestErrorBody>().ok().and_then(|b| b.message)
}

/// Classify an HTTP response. `attempt` is the 1-indexed attempt that
/// produced it and is only used for gateway timeouts.
pub fn classify_status(
    operation: &str,
    attempt: u32,
    resp: &HttpResponse,
    now: DateTime<Utc>,
) -> Result<(), ApiError> {
    if resp.is_success() {
        return Ok(());
    }

    let reading = parse_rate_limit_headers(&resp.headers);
    match resp.status {
        401 => Err(ApiError::permission(operation, "bad credentials")),
        403 | 429 if resp.status == 429 || reading.is_some_and(|r| r.remaining == 0) => {
            Err(ApiError::RateLimited {
                operation: operation.to_string(),
                remaining: 0,
                reset_at: reading.map_or(now, |r| r.reset_at),
            })
        }
        403 => {
            let message = rest_message(resp).unwrap_or_else(|| "forbidden".to_string());
            Err(ApiError::permission(operation, message))
        }
        404 => Err(ApiError::api(operation, "resource not found")),
        504 => Err(ApiError::Timeout {
            operation: operation.to_string(),
            attempts: attempt,
        }),
        status => {
            tracing::debug!(
                operation,
                status,
                body = %resp.body_excerpt(200),
                "Unexpected GitHub response"
            );
            Err(ApiError::api(operation, format!("unexpected status {status}")))
        }
    }
}

/// Map a non-empty GraphQL `errors` array to a single [`ApiError`].
///
/// Upstream messages can name private resources, so only the error type is
/// surfaced; the full messages go to the debug log.
pub fn classify_graphql_errors(
    operation: &str,
    errors: &[GraphQlError],
    reset_at: DateTime<Utc>,
) -> ApiError {
    tracing::debug!(operation, ?errors, "GraphQL errors");

    let has = |kind: &str| errors.iter().any(|e| e.kind.as_deref() == Some(kind));

    if has("FORBIDDEN") || has("INSUFFICIENT_SCOPES") {
        return ApiError::permission(operation, "insufficient permissions for this resource");
    }
    if has("RATE_LIMITED") {
        return ApiError::RateLimited {
            operation: operation.to_string(),
            remaining: 0,
            reset_at,
        };
    }

    let kind = errors
        .iter()
        .find_map(|e| e.kind.clone())
        .unwrap_or_else(|| "UNKNOWN".to_string());
    ApiError::api(operation, format!("GraphQL error ({kind})"))
}

#[cfg(test)]
mod tests {
    use super::*;

    fn now() -> DateTime<Utc> {
        DateTime::parse_from_rfc3339("2026-02-01T00:00:00Z")
            .unwrap()
            .with_timezone(&Utc)
    }

    fn response(status: u16, headers: &[(&str, &str)], body: &str) -> HttpResponse {
        HttpResponse {
            status,
            headers: headers
                .iter()
                .map(|(k, v)| (k.to_string(), v.to_string()))
                .collect(),
            body: body.as_bytes().to_vec(),
        }
    }

    #[test]
    fn success_passes() {
        assert!(classify_status("op", 1, &response(200, &[], "{}"), now()).is_ok());
    }

    #[test]
    fn unauthorized_is_permission_error() {
        let err = classify_status("op", 1, &response(401, &[], ""), now()).unwrap_err();
        assert!(matches!(err, ApiError::Permission { .. }));
    }

    #[test]
    fn forbidden_with_exhausted_budget_is_rate_limited() {
        let resp = response(
            403,
            &[
                ("x-ratelimit-limit", "5000"),
                ("x-ratelimit-remaining", "0"),
                ("x-ratelimit-reset", "1769904000"),
            ],
            r#"{"message":"API rate limit exceeded"}"#,
        );
        let err = classify_status("op", 1, &resp, now()).unwrap_err();
        match err {
            ApiError::RateLimited { reset_at, .. } => {
                assert_eq!(reset_at.timestamp(), 1_769_904_000);
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn forbidden_with_budget_left_is_permission_error() {
        let resp = response(
            403,
            &[
                ("x-ratelimit-limit", "5000"),
                ("x-ratelimit-remaining", "4000"),
                ("x-ratelimit-reset", "1769904000"),
            ],
            r#"{"message":"Resource not accessible by integration"}"#,
        );
        let err = classify_status("op", 1, &resp, now()).unwrap_err();
        assert!(err.to_string().contains("Resource not accessible by integration"));
        assert!(!err.is_retryable());
    }

    #[test]
    fn too_many_requests_is_rate_limited() {
        let err = classify_status("op", 1, &response(429, &[], ""), now()).unwrap_err();
        assert!(err.is_rate_limited());
    }

    #[test]
    fn gateway_timeout_reports_attempt() {
        let err = classify_status("op", 2, &response(504, &[], ""), now()).unwrap_err();
        assert_eq!(
            err,
            ApiError::Timeout {
                operation: "op".into(),
                attempts: 2
            }
        );
    }

    #[test]
    fn server_error_is_generic_and_hides_body() {
        let err = classify_status("op", 1, &response(502, &[], "secret internals"), now())
            .unwrap_err();
        assert!(err.is_generic());
        assert!(!err.to_string().contains("secret"));
    }

    #[test]
    fn graphql_forbidden_maps_to_permission() {
        let errors = vec![GraphQlError {
            message: "Resource not accessible by integration".into(),
            kind: Some("FORBIDDEN".into()),
        }];
        let err = classify_graphql_errors("op", &errors, now());
        assert!(matches!(err, ApiError::Permission { .. }));
    }

    #[test]
    fn graphql_rate_limited_maps_to_rate_limit() {
        let errors = vec![GraphQlError {
            message: "API rate limit exceeded".into(),
            kind: Some("RATE_LIMITED".into()),
        }];
        assert!(classify_graphql_errors("op", &errors, now()).is_rate_limited());
    }

    #[test]
    fn graphql_other_errors_are_generic_without_upstream_message() {
        let errors = vec![GraphQlError {
            message: "Could not resolve to a Repository with the name 'acme/secret'.".into(),
            kind: Some("NOT_FOUND".into()),
        }];
        let err = classify_graphql_errors("op", &errors, now());
        assert!(err.is_generic());
        assert!(err.to_string().contains("NOT_FOUND"));
        assert!(!err.to_string().contains("acme/secret"));
    }
}
