use axum::{
    extract::{OriginalUri, Request, State},
    http::{HeaderMap, HeaderValue, StatusCode},
    middleware::Next,
    response::{IntoResponse, Response},
    Json,
};
use chrono::Utc;
use serde::Serialize;
use std::time::Duration;
use tracing::warn;

use super::AppState;
use crate::rate_limiter::RateLimitDecision;

#[derive(Debug, Serialize)]
#[serde(rename_all = "camelCase")]
struct RateLimitBody {
    error: &'static str,
    message: &'static str,
    /// Unix epoch milliseconds when the window resets.
    reset_time: i64,
}

/// Fixed-window limit per `"<client-ip>-<path>"`.
pub async fn rate_limiting(State(state): State<AppState>, request: Request, next: Next) -> Response {
    // Nested routers see the path with their prefix stripped
    let path = request
        .extensions()
        .get::<OriginalUri>()
        .map(|uri| uri.path().to_string())
        .unwrap_or_else(|| request.uri().path().to_string());
    let key = format!("{}-{}", extract_client_ip(request.headers()), path);
    let decision = state.rate_limiter.check(&key);

    if !decision.allowed {
        warn!(key = %key, "Rate limit exceeded");
        metrics::counter!("rate_limit_rejections_total").increment(1);
        let mut response = (
            StatusCode::TOO_MANY_REQUESTS,
            Json(RateLimitBody {
                error: "Rate limit exceeded",
                message: "Too many requests. Please try again later.",
                reset_time: reset_epoch_ms(&decision),
            }),
        )
            .into_response();
        apply_rate_limit_headers(response.headers_mut(), &decision);
        return response;
    }

    let mut response = next.run(request).await;
    apply_rate_limit_headers(response.headers_mut(), &decision);
    response
}

/// Bounds every request by `server.request_timeout`.
pub async fn request_timeout(State(state): State<AppState>, request: Request, next: Next) -> Response {
    let timeout_duration = Duration::from_secs(state.config.server.request_timeout);

    match tokio::time::timeout(timeout_duration, next.run(request)).await {
        Ok(response) => response,
        Err(_) => {
            warn!("Request timed out after {:?}", timeout_duration);
            StatusCode::REQUEST_TIMEOUT.into_response()
        }
    }
}

fn apply_rate_limit_headers(headers: &mut HeaderMap, decision: &RateLimitDecision) {
    headers.insert("X-RateLimit-Limit", HeaderValue::from(decision.limit));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(reset_epoch_ms(decision)));
}

fn reset_epoch_ms(decision: &RateLimitDecision) -> i64 {
    Utc::now().timestamp_millis() + decision.reset_in.as_millis() as i64
}

/// First address from the proxy headers, or `"unknown"`.
pub fn extract_client_ip(headers: &HeaderMap) -> String {
    let ip_headers = ["x-forwarded-for", "x-real-ip"];

    for header_name in &ip_headers {
        if let Some(header_value) = headers.get(*header_name) {
            if let Ok(value) = header_value.to_str() {
                // Take the first IP if there are multiple (comma-separated)
                let ip = value.split(',').next().unwrap_or(value).trim();
                if !ip.is_empty() {
                    return ip.to_string();
                }
            }
        }
    }

    "unknown".to_string()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_extract_client_ip() {
        let mut headers = HeaderMap::new();
        assert_eq!(extract_client_ip(&headers), "unknown");

        headers.insert("x-real-ip", "10.0.0.9".parse().unwrap());
        assert_eq!(extract_client_ip(&headers), "10.0.0.9");

        headers.insert("x-forwarded-for", "192.168.1.1, 10.0.0.1".parse().unwrap());
        assert_eq!(extract_client_ip(&headers), "192.168.1.1");
    }

    #[test]
    fn test_rate_limit_headers() {
        let decision = RateLimitDecision {
            allowed: true,
            limit: 10,
            remaining: 7,
            reset_in: Duration::from_secs(30),
        };
        let mut headers = HeaderMap::new();
        apply_rate_limit_headers(&mut headers, &decision);

        assert_eq!(headers["X-RateLimit-Limit"], "10");
        assert_eq!(headers["X-RateLimit-Remaining"], "7");
        let reset: i64 = headers["X-RateLimit-Reset"].to_str().unwrap().parse().unwrap();
        assert!(reset > Utc::now().timestamp_millis());
    }
}
