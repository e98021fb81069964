//! Caller key derivation.
//!
//! Keys are namespaced by edge function so one caller's budget on
//! `submit-lead` does not eat into its budget on `legal-chat`.

use axum::http::HeaderMap;
use chrono::NaiveDate;

/// Fallback identity when no address header is present.
pub const UNKNOWN_CLIENT: &str = "unknown";

/// Resolve the originating client address from proxy headers.
///
/// Checks `cf-connecting-ip`, then the first hop of `x-forwarded-for`,
/// then `x-real-ip`.
pub fn client_ip(headers: &HeaderMap) -> String {
    header(headers, "cf-connecting-ip")
        .or_else(|| {
            header(headers, "x-forwarded-for")
                .and_then(|v| v.split(',').next())
                .map(str::trim)
                .filter(|v| !v.is_empty())
        })
        .or_else(|| header(headers, "x-real-ip"))
        .unwrap_or(UNKNOWN_CLIENT)
        .to_string()
}

fn header<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers
        .get(name)
        .and_then(|v| v.to_str().ok())
        .map(str::trim)
        .filter(|v| !v.is_empty())
}

/// Key for address-based limiting.
pub fn ip_key(function: &str, ip: &str) -> String {
    format!("{}:ip:{}", function, ip)
}

/// Key for limiting an authenticated user.
pub fn user_key(function: &str, user_id: &str) -> String {
    format!("{}:user:{}", function, user_id)
}

/// Key for a per-day quota. The date rolls the key over at UTC midnight.
pub fn daily_key(function: &str, identifier: &str, date: NaiveDate) -> String {
    format!("{}:daily:{}:{}", function, identifier, date.format("%Y-%m-%d"))
}
