use std::any::Any;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::{Arc, Mutex, PoisonError};
use std::time::{Duration, Instant};

use appin_common::error::AppinError;
use axum::extract::{ConnectInfo, Request, State};
use axum::http::StatusCode;
use axum::middleware::Next;
use axum::response::{IntoResponse, Response};
use axum::Json;

use crate::error::ApiError;

/// Requests per second each client may make by default.
pub const DEFAULT_REQUESTS_PER_SECOND: u32 = 30;

/// Buckets untouched for this long are dropped once the table is full.
const IDLE_TTL: Duration = Duration::from_secs(180);
const MAX_CLIENTS: usize = 10_000;

/// Response headers added to every reply unless a handler already set them.
pub const SECURE_HEADERS: [(&str, &str); 3] = [
    ("x-xss-protection", "1; mode=block"),
    ("x-content-type-options", "nosniff"),
    ("x-frame-options", "SAMEORIGIN"),
];

struct Bucket {
    tokens: f64,
    last: Instant,
}

/// Per-client token bucket. The burst equals one second's worth of requests.
pub struct RateLimiter {
    per_second: f64,
    burst: f64,
    buckets: Mutex<HashMap<String, Bucket>>,
}

impl RateLimiter {
    pub fn per_second(requests: u32) -> Self {
        let rate = f64::from(requests.max(1));
        Self {
            per_second: rate,
            burst: rate,
            buckets: Mutex::new(HashMap::new()),
        }
    }

    /// Take one token for `client`; `false` when its bucket is empty.
    pub fn check(&self, client: &str, now: Instant) -> bool {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        if buckets.len() >= MAX_CLIENTS && !buckets.contains_key(client) {
            buckets.retain(|_, b| now.saturating_duration_since(b.last) < IDLE_TTL);
        }

        let bucket = buckets.entry(client.to_string()).or_insert(Bucket {
            tokens: self.burst,
            last: now,
        });
        let refill = now.saturating_duration_since(bucket.last).as_secs_f64() * self.per_second;
        bucket.tokens = (bucket.tokens + refill).min(self.burst);
        bucket.last = now;

        if bucket.tokens >= 1.0 {
            bucket.tokens -= 1.0;
            true
        } else {
            false
        }
    }
}

/// Client identity: first `X-Forwarded-For` hop, then `X-Real-IP`, then the
/// peer address.
fn client_key(request: &Request) -> String {
    let header = |name: &str| {
        request
            .headers()
            .get(name)
            .and_then(|v| v.to_str().ok())
            .and_then(|v| v.split(',').next())
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
    };

    header("x-forwarded-for")
        .or_else(|| header("x-real-ip"))
        .or_else(|| {
            request
                .extensions()
                .get::<ConnectInfo<SocketAddr>>()
                .map(|ConnectInfo(addr)| addr.ip().to_string())
        })
        .unwrap_or_else(|| "unknown".to_string())
}

pub async fn rate_limit(
    State(limiter): State<Arc<RateLimiter>>,
    request: Request,
    next: Next,
) -> Response {
    let client = client_key(&request);
    if !limiter.check(&client, Instant::now()) {
        tracing::warn!(client, "rate limit exceeded");
        return (
            StatusCode::TOO_MANY_REQUESTS,
            Json(serde_json::json!({ "error": "rate limit exceeded" })),
        )
            .into_response();
    }
    next.run(request).await
}

/// Panics inside a handler become a plain 500.
pub fn panic_response(_panic: Box<dyn Any + Send + 'static>) -> Response {
    ApiError(AppinError::Internal("request handler panicked".to_string())).into_response()
}
