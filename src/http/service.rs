//! Decision endpoint consulted by edge function handlers.

use std::sync::Arc;

use axum::extract::rejection::JsonRejection;
use axum::extract::State;
use axum::http::header::ORIGIN;
use axum::http::{HeaderMap, StatusCode};
use axum::response::{IntoResponse, Response};
use axum::routing::{get, post};
use axum::{Json, Router};
use chrono::{DateTime, SecondsFormat, Utc};
use parking_lot::RwLock;
use serde::{Deserialize, Serialize};
use tracing::{debug, info, instrument, warn};

use super::cors::cors_headers;
use super::response::build_rejection_with_retry;
use crate::error::{BouncerError, Result};
use crate::ratelimit::{client_ip, ip_key, user_key, RateLimiter, RuleSet};

/// Shared state behind the decision endpoint.
#[derive(Clone)]
pub struct RateLimitService {
    /// The rate limiter instance
    limiter: Arc<RateLimiter>,
    /// Per-function policies, swappable at runtime
    rules: Arc<RwLock<RuleSet>>,
    /// Origins allowed to call the endpoint from a browser
    allowed_origins: Arc<Vec<String>>,
}

/// Body of `POST /v1/check`.
#[derive(Debug, Clone, Deserialize)]
pub struct CheckRequest {
    /// Edge function the request is for
    pub function: String,
    /// Authenticated user; when absent the client address is used
    #[serde(default)]
    pub identifier: Option<String>,
}

/// Body of an admitted decision.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CheckResponse {
    pub allowed: bool,
    pub remaining: u32,
    pub reset_at: String,
}

impl RateLimitService {
    /// Create a service over a limiter and its rules.
    pub fn new(limiter: Arc<RateLimiter>, rules: RuleSet, allowed_origins: Vec<String>) -> Self {
        Self {
            limiter,
            rules: Arc::new(RwLock::new(rules)),
            allowed_origins: Arc::new(allowed_origins),
        }
    }

    /// The limiter behind this service.
    pub fn limiter(&self) -> &Arc<RateLimiter> {
        &self.limiter
    }

    /// Replace the per-function rules.
    pub fn set_rules(&self, rules: RuleSet) {
        *self.rules.write() = rules;
    }

    /// Current per-function rules.
    pub fn rules(&self) -> RuleSet {
        self.rules.read().clone()
    }

    /// Build the router for this service.
    pub fn router(self) -> Router {
        Router::new()
            .route("/health", get(health))
            .route("/v1/check", post(check).options(preflight))
            .with_state(self)
    }

    /// Decide one request and render the HTTP answer.
    pub fn decide(&self, headers: &HeaderMap, request: &CheckRequest) -> Result<Response> {
        let function = request.function.trim();
        if function.is_empty() {
            warn!("Received rate limit check with empty function");
            return Err(BouncerError::InvalidRequest("function is required".to_string()));
        }

        let key = match request.identifier.as_deref().map(str::trim) {
            Some(id) if !id.is_empty() => user_key(function, id),
            _ => ip_key(function, &client_ip(headers)),
        };
        let policy = self.rules.read().policy_for(function);
        let cors = self.cors_for(headers);

        let decision = self.limiter.check(&key, &policy);

        info!(
            function = %function,
            key = %key,
            allowed = decision.allowed,
            remaining = decision.remaining,
            "Rate limit decision made"
        );

        if !decision.allowed {
            let retry_after = decision.retry_after_secs(self.limiter.now_millis());
            return Ok(build_rejection_with_retry(&cors, retry_after));
        }

        let body = CheckResponse {
            allowed: true,
            remaining: decision.remaining,
            reset_at: format_millis(decision.reset_at_ms),
        };
        Ok((StatusCode::OK, cors, Json(body)).into_response())
    }

    fn cors_for(&self, headers: &HeaderMap) -> HeaderMap {
        let origin = headers.get(ORIGIN).and_then(|v| v.to_str().ok());
        cors_headers(origin, &self.allowed_origins)
    }
}

fn format_millis(ms: u64) -> String {
    i64::try_from(ms)
        .ok()
        .and_then(DateTime::<Utc>::from_timestamp_millis)
        .unwrap_or_default()
        .to_rfc3339_opts(SecondsFormat::Millis, true)
}

async fn health() -> impl IntoResponse {
    Json(serde_json::json!({
        "status": "healthy",
        "timestamp": Utc::now().to_rfc3339()
    }))
}

async fn preflight(State(service): State<RateLimitService>, headers: HeaderMap) -> Response {
    (StatusCode::NO_CONTENT, service.cors_for(&headers)).into_response()
}

/// Errors still carry CORS headers so browsers can read them.
#[instrument(skip_all)]
async fn check(
    State(service): State<RateLimitService>,
    headers: HeaderMap,
    payload: std::result::Result<Json<CheckRequest>, JsonRejection>,
) -> Response {
    let result = payload
        .map_err(|rejection| {
            warn!(error = %rejection.body_text(), "Malformed rate limit check");
            BouncerError::InvalidRequest(rejection.body_text())
        })
        .and_then(|Json(request)| {
            debug!(
                function = %request.function,
                identifier = ?request.identifier,
                "Processing rate limit check"
            );
            service.decide(&headers, &request)
        });

    match result {
        Ok(response) => response,
        Err(err) => (service.cors_for(&headers), err).into_response(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::http::response::RATE_LIMIT_MESSAGE;
    use crate::ratelimit::{ManualClock, Policy};
    use axum::body::{to_bytes, Body};
    use axum::http::header::{ACCESS_CONTROL_ALLOW_ORIGIN, CONTENT_TYPE, RETRY_AFTER};
    use axum::http::{Method, Request};
    use tower::ServiceExt;

    fn service(rules: RuleSet) -> (RateLimitService, ManualClock) {
        let clock = ManualClock::new(0);
        let limiter = Arc::new(RateLimiter::with_clock(Arc::new(clock.clone())));
        let service = RateLimitService::new(
            limiter,
            rules,
            vec!["https://justice-bot.com".to_string()],
        );
        (service, clock)
    }

    fn check_request(body: &str, ip: &str) -> Request<Body> {
        Request::builder()
            .method(Method::POST)
            .uri("/v1/check")
            .header(CONTENT_TYPE, "application/json")
            .header("x-forwarded-for", ip)
            .body(Body::from(body.to_string()))
            .unwrap()
    }

    async fn json_body(response: Response) -> serde_json::Value {
        let bytes = to_bytes(response.into_body(), usize::MAX).await.unwrap();
        serde_json::from_slice(&bytes).unwrap()
    }

    #[tokio::test]
    async fn test_health() {
        let (service, _clock) = service(RuleSet::new());
        let request = Request::builder().uri("/health").body(Body::empty()).unwrap();

        let response = service.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(json_body(response).await["status"], "healthy");
    }

    #[tokio::test]
    async fn test_admitted_request_reports_remaining() {
        let rules = RuleSet::new().with_function("submit-lead", Policy::new(60_000, 3).unwrap());
        let (service, _clock) = service(rules);

        let response = service
            .router()
            .oneshot(check_request(r#"{"function":"submit-lead"}"#, "1.2.3.4"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::OK);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://justice-bot.com");

        let body = json_body(response).await;
        assert_eq!(body["allowed"], true);
        assert_eq!(body["remaining"], 2);
        assert_eq!(body["resetAt"], "1970-01-01T00:01:00.000Z");
    }

    #[tokio::test]
    async fn test_over_limit_returns_rejection() {
        let rules = RuleSet::new().with_function("legal-chat", Policy::new(1000, 1).unwrap());
        let (service, clock) = service(rules);
        let router = service.router();

        let first = router
            .clone()
            .oneshot(check_request(r#"{"function":"legal-chat"}"#, "1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(first.status(), StatusCode::OK);

        clock.set(500);
        let second = router
            .clone()
            .oneshot(check_request(r#"{"function":"legal-chat"}"#, "1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(second.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(second.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://justice-bot.com");
        // window ends at 1000, checked at 500
        assert_eq!(second.headers()[RETRY_AFTER], "1");
        assert_eq!(
            json_body(second).await,
            serde_json::json!({ "error": RATE_LIMIT_MESSAGE })
        );

        clock.set(1001);
        let third = router
            .oneshot(check_request(r#"{"function":"legal-chat"}"#, "1.2.3.4"))
            .await
            .unwrap();
        assert_eq!(third.status(), StatusCode::OK);
    }

    #[tokio::test]
    async fn test_functions_and_clients_have_separate_budgets() {
        let rules = RuleSet {
            default: Policy::new(60_000, 1).unwrap(),
            ..RuleSet::default()
        };
        let (service, _clock) = service(rules);
        let router = service.clone().router();

        for (body, ip) in [
            (r#"{"function":"submit-lead"}"#, "1.1.1.1"),
            (r#"{"function":"submit-lead"}"#, "2.2.2.2"),
            (r#"{"function":"legal-chat"}"#, "1.1.1.1"),
            (r#"{"function":"submit-lead","identifier":"u-1"}"#, "1.1.1.1"),
        ] {
            let response = router.clone().oneshot(check_request(body, ip)).await.unwrap();
            assert_eq!(response.status(), StatusCode::OK, "{} from {}", body, ip);
        }

        let response = router
            .oneshot(check_request(r#"{"function":"submit-lead"}"#, "1.1.1.1"))
            .await
            .unwrap();
        assert_eq!(response.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(service.limiter().len(), 4);
    }

    #[tokio::test]
    async fn test_empty_function_rejected() {
        let (service, _clock) = service(RuleSet::new());

        let response = service
            .router()
            .oneshot(check_request(r#"{"function":"  "}"#, "1.2.3.4"))
            .await
            .unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(json_body(response).await["error"], "function is required");
    }

    #[tokio::test]
    async fn test_empty_function_error_carries_cors() {
        let (service, _clock) = service(RuleSet::new());
        let mut request = check_request(r#"{"function":""}"#, "1.2.3.4");
        request
            .headers_mut()
            .insert(ORIGIN, "https://justice-bot.com".parse().unwrap());

        let response = service.router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://justice-bot.com");
        assert_eq!(json_body(response).await["error"], "function is required");
    }

    #[tokio::test]
    async fn test_malformed_body_is_json_error_with_cors() {
        let (service, _clock) = service(RuleSet::new());
        let mut request = check_request(r#"{"fn":"x"}"#, "1.2.3.4");
        request
            .headers_mut()
            .insert(ORIGIN, "https://justice-bot.com".parse().unwrap());

        let response = service.clone().router().oneshot(request).await.unwrap();

        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
        assert_eq!(response.headers()[CONTENT_TYPE], "application/json");
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://justice-bot.com");
        let body = json_body(response).await;
        assert!(body["error"].as_str().unwrap().contains("function"));
        assert!(service.limiter().is_empty());
    }

    #[tokio::test]
    async fn test_preflight_returns_cors() {
        let (service, _clock) = service(RuleSet::new());
        let request = Request::builder()
            .method(Method::OPTIONS)
            .uri("/v1/check")
            .header(ORIGIN, "https://justice-bot.com")
            .body(Body::empty())
            .unwrap();

        let response = service.router().oneshot(request).await.unwrap();
        assert_eq!(response.status(), StatusCode::NO_CONTENT);
        assert_eq!(response.headers()[ACCESS_CONTROL_ALLOW_ORIGIN], "https://justice-bot.com");
    }

    #[test]
    fn test_set_rules_takes_effect() {
        let (service, _clock) = service(RuleSet::new());
        let request = CheckRequest {
            function: "submit-lead".to_string(),
            identifier: Some("u-1".to_string()),
        };

        service.set_rules(RuleSet::new().with_function("submit-lead", Policy::new(1000, 1).unwrap()));
        assert_eq!(service.rules().policy_for("submit-lead").max_requests(), 1);

        let first = service.decide(&HeaderMap::new(), &request).unwrap();
        assert_eq!(first.status(), StatusCode::OK);
        let second = service.decide(&HeaderMap::new(), &request).unwrap();
        assert_eq!(second.status(), StatusCode::TOO_MANY_REQUESTS);
    }
}
