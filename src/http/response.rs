//! Standard "too many requests" response.

use axum::http::header::{CONTENT_TYPE, RETRY_AFTER};
use axum::http::{HeaderMap, HeaderValue, StatusCode};
use axum::response::{IntoResponse, Response};

/// Message carried in every rejection body.
pub const RATE_LIMIT_MESSAGE: &str = "Rate limit exceeded. Please try again later.";

/// Build a 429 response, merging in the caller's headers.
///
/// Body is exactly `{"error":"Rate limit exceeded. Please try again later."}`.
pub fn build_rejection(headers: &HeaderMap) -> Response {
    let body = serde_json::json!({ "error": RATE_LIMIT_MESSAGE }).to_string();
    json_429(headers, body)
}

/// Like [`build_rejection`], with a `Retry-After` header. The body is unchanged.
pub fn build_rejection_with_retry(headers: &HeaderMap, retry_after_secs: u64) -> Response {
    let mut response = build_rejection(headers);
    response
        .headers_mut()
        .insert(RETRY_AFTER, HeaderValue::from(retry_after_secs));
    response
}

fn json_429(headers: &HeaderMap, body: String) -> Response {
    let mut response = (StatusCode::TOO_MANY_REQUESTS, body).into_response();
    let out = response.headers_mut();
    for (name, value) in headers {
        out.append(name.clone(), value.clone());
    }
    out.insert(CONTENT_TYPE, HeaderValue::from_static("application/json"));
    response
}
