//! Cross-origin headers attached to every decision response.

use axum::http::header::{
    ACCESS_CONTROL_ALLOW_HEADERS, ACCESS_CONTROL_ALLOW_METHODS, ACCESS_CONTROL_ALLOW_ORIGIN,
    ACCESS_CONTROL_MAX_AGE,
};
use axum::http::{HeaderMap, HeaderValue};

const ALLOW_HEADERS: &str = "authorization, x-client-info, apikey, content-type";
const ALLOW_METHODS: &str = "GET, POST, PUT, DELETE, OPTIONS";
const MAX_AGE_SECS: &str = "86400";

/// Build CORS headers for a request from `origin`.
///
/// An allow-listed origin is echoed back; anything else gets the first
/// allowed origin. An empty allow-list permits any origin.
pub fn cors_headers(origin: Option<&str>, allowed: &[String]) -> HeaderMap {
    let chosen = match origin {
        Some(o) if allowed.iter().any(|a| a == o) => o,
        _ => allowed.first().map(String::as_str).unwrap_or("*"),
    };

    let mut headers = HeaderMap::new();
    headers.insert(
        ACCESS_CONTROL_ALLOW_ORIGIN,
        HeaderValue::from_str(chosen).unwrap_or_else(|_| HeaderValue::from_static("*")),
    );
    headers.insert(ACCESS_CONTROL_ALLOW_HEADERS, HeaderValue::from_static(ALLOW_HEADERS));
    headers.insert(ACCESS_CONTROL_ALLOW_METHODS, HeaderValue::from_static(ALLOW_METHODS));
    headers.insert(ACCESS_CONTROL_MAX_AGE, HeaderValue::from_static(MAX_AGE_SECS));
    headers
}
