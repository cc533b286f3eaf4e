/// Per-client rate limiting
///
/// Token bucket keyed by client IP. Each client gets `API_MAX_LIMITER`
/// tokens that refill evenly over `RATE_LIMIT_EXPIRATION` seconds.
///
/// # Storage
///
/// - Local: buckets in a process-wide map (single instance deployments)
/// - Redis: buckets in hashes under `ratelimit:ip:{addr}`, updated by an
///   atomic Lua script so replicas share one budget
///
/// # Headers
///
/// Response includes rate limit headers:
/// - `X-RateLimit-Limit`: Bucket capacity
/// - `X-RateLimit-Remaining`: Tokens remaining
/// - `X-RateLimit-Reset`: Seconds until the bucket is full again
/// - `Retry-After`: Seconds to wait (429 responses only)
///
/// # Client Identity
///
/// The peer address from `ConnectInfo`, else the first `X-Forwarded-For`
/// entry, else `"unknown"`.

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::Response,
};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::net::SocketAddr;
use std::sync::Arc;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;

/// Local buckets kept before idle ones are pruned
const LOCAL_PRUNE_THRESHOLD: usize = 10_000;

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_rate = tonumber(ARGV[2])
local now = tonumber(ARGV[3])
local ttl = tonumber(ARGV[4])

local bucket = redis.call('HMGET', key, 'tokens', 'last_refill')
local tokens = tonumber(bucket[1])
local last_refill = tonumber(bucket[2])

if not tokens then
    tokens = capacity
    last_refill = now
end

local elapsed = math.max(0, now - last_refill)
tokens = math.min(capacity, tokens + (elapsed * refill_rate))

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HSET', key, 'tokens', tokens, 'last_refill', now)
redis.call('EXPIRE', key, ttl)

local retry_after = 0
if allowed == 0 then
    retry_after = math.ceil((1 - tokens) / refill_rate)
end

return {allowed, math.floor(tokens), retry_after, math.ceil((capacity - tokens) / refill_rate)}
"#;

/// Bucket size and refill speed
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum tokens in bucket (burst capacity)
    pub capacity: u32,

    /// Tokens added per second
    pub refill_rate: f64,

    /// Window length; also the Redis key TTL base
    pub window: Duration,
}

impl RateLimit {
    /// `max_requests` per `window_seconds`, refilled evenly
    pub fn per_window(max_requests: u32, window_seconds: u64) -> Self {
        let window_seconds = window_seconds.max(1);
        RateLimit {
            capacity: max_requests,
            refill_rate: f64::from(max_requests) / window_seconds as f64,
            window: Duration::from_secs(window_seconds),
        }
    }
}

/// Outcome of one bucket check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,

    /// Whole tokens left after this request
    pub remaining: u32,

    /// Seconds until one token is available; zero when allowed
    pub retry_after: u64,

    /// Seconds until the bucket is full
    pub reset_after: u64,
}

/// In-process token bucket
#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn new(capacity: u32) -> Self {
        TokenBucket {
            tokens: f64::from(capacity),
            last_refill: Instant::now(),
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: u32, now: Instant) {
        let elapsed = now.saturating_duration_since(self.last_refill).as_secs_f64();
        self.tokens = (self.tokens + elapsed * rate).min(f64::from(capacity));
        self.last_refill = now;
    }

    fn try_consume(&mut self) -> bool {
        if self.tokens >= 1.0 {
            self.tokens -= 1.0;
            true
        } else {
            false
        }
    }

    fn seconds_until(&self, tokens: f64, rate: f64) -> u64 {
        let deficit = tokens - self.tokens;
        if deficit <= 0.0 || rate <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }

    fn decide(&mut self, limit: RateLimit, now: Instant) -> RateLimitDecision {
        self.refill(limit.refill_rate, limit.capacity, now);
        let allowed = self.try_consume();

        RateLimitDecision {
            allowed,
            remaining: self.tokens.floor() as u32,
            retry_after: if allowed { 0 } else { self.seconds_until(1.0, limit.refill_rate) },
            reset_after: self.seconds_until(f64::from(limit.capacity), limit.refill_rate),
        }
    }
}

#[derive(Clone)]
enum Backend {
    Local(Arc<Mutex<HashMap<String, TokenBucket>>>),
    Redis(ConnectionManager),
}

/// Token bucket limiter over local memory or Redis
#[derive(Clone)]
pub struct RateLimiter {
    limit: RateLimit,
    backend: Backend,
}

impl std::fmt::Debug for RateLimiter {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let backend = match self.backend {
            Backend::Local(_) => "local",
            Backend::Redis(_) => "redis",
        };
        f.debug_struct("RateLimiter")
            .field("limit", &self.limit)
            .field("backend", &backend)
            .finish()
    }
}

impl RateLimiter {
    /// Process-local buckets
    pub fn local(limit: RateLimit) -> Self {
        Self {
            limit,
            backend: Backend::Local(Arc::new(Mutex::new(HashMap::new()))),
        }
    }

    /// Buckets shared through Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or Redis is unreachable.
    pub async fn redis(url: &str, limit: RateLimit) -> Result<Self, redis::RedisError> {
        let client = redis::Client::open(url)?;
        let manager = ConnectionManager::new(client).await?;

        Ok(Self {
            limit,
            backend: Backend::Redis(manager),
        })
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    /// Takes one token from `client`'s bucket
    ///
    /// # Errors
    ///
    /// Returns an error when the Redis script fails.
    pub async fn check(&self, client: &str) -> Result<RateLimitDecision, redis::RedisError> {
        match &self.backend {
            Backend::Local(buckets) => {
                let now = Instant::now();
                let mut buckets = buckets.lock().await;

                if buckets.len() >= LOCAL_PRUNE_THRESHOLD {
                    let idle = self.limit.window * 2;
                    buckets.retain(|_, bucket| now.saturating_duration_since(bucket.last_refill) < idle);
                }

                let decision = buckets
                    .entry(client.to_string())
                    .or_insert_with(|| TokenBucket::new(self.limit.capacity))
                    .decide(self.limit, now);

                Ok(decision)
            }
            Backend::Redis(manager) => {
                let mut conn = manager.clone();
                let key = format!("ratelimit:ip:{}", client);
                let now = chrono::Utc::now().timestamp_millis() as f64 / 1000.0;
                let ttl = self.limit.window.as_secs().saturating_mul(2).max(1);

                let result: Vec<i64> = redis::Script::new(TOKEN_BUCKET_SCRIPT)
                    .key(&key)
                    .arg(self.limit.capacity)
                    .arg(self.limit.refill_rate)
                    .arg(now)
                    .arg(ttl)
                    .invoke_async(&mut conn)
                    .await?;

                let field = |i: usize| result.get(i).copied().unwrap_or(0).max(0);

                Ok(RateLimitDecision {
                    allowed: field(0) == 1,
                    remaining: u32::try_from(field(1)).unwrap_or(u32::MAX),
                    retry_after: field(2) as u64,
                    reset_after: field(3) as u64,
                })
            }
        }
    }
}

/// Best-effort client address
pub fn client_key(request: &Request) -> String {
    if let Some(ConnectInfo(addr)) = request.extensions().get::<ConnectInfo<SocketAddr>>() {
        return addr.ip().to_string();
    }

    forwarded_for(request.headers()).unwrap_or_else(|| "unknown".to_string())
}

fn forwarded_for(headers: &HeaderMap) -> Option<String> {
    headers
        .get("X-Forwarded-For")
        .and_then(|v| v.to_str().ok())
        .and_then(|v| v.split(',').next())
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}

/// Rate limiting middleware layer
///
/// # Errors
///
/// - 429 Too Many Requests: bucket empty
/// - 500 Internal Server Error: Redis failure
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let client = client_key(&request);
    let limiter = &state.rate_limiter;

    let decision = limiter.check(&client).await.map_err(|e| {
        tracing::error!(error = %e, "Rate limit check failed");
        ApiError::InternalError("Rate limit service unavailable".to_string())
    })?;

    if !decision.allowed {
        tracing::warn!(client = %client, retry_after = decision.retry_after, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: decision.retry_after.max(1),
            limit: limiter.limit().capacity,
            message: "Too many requests".to_string(),
        });
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limiter.limit().capacity));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(decision.remaining));
    headers.insert("X-RateLimit-Reset", HeaderValue::from(decision.reset_after));

    Ok(response)
}

#[cfg(test)]
mod tests {
    use super::*;
    use axum::body::Body;

    fn ten_seconds_ago() -> Instant {
        Instant::now().checked_sub(Duration::from_secs(10)).unwrap()
    }

    #[test]
    fn test_rate_limit_per_window() {
        let limit = RateLimit::per_window(100, 60);
        assert_eq!(limit.capacity, 100);
        assert!((limit.refill_rate - 1.6667).abs() < 0.001);

        let limit = RateLimit::per_window(5, 0);
        assert_eq!(limit.window, Duration::from_secs(1));
    }

    #[test]
    fn test_token_bucket_consume() {
        let mut bucket = TokenBucket::new(2);
        assert!(bucket.try_consume());
        assert!(bucket.try_consume());
        assert!(!bucket.try_consume());
        assert_eq!(bucket.tokens, 0.0);
    }

    #[test]
    fn test_token_bucket_refill_capped() {
        let mut bucket = TokenBucket {
            tokens: 5.0,
            last_refill: ten_seconds_ago(),
        };
        bucket.refill(1.0, 100, Instant::now());
        assert!((bucket.tokens - 15.0).abs() < 0.1);

        let mut bucket = TokenBucket {
            tokens: 95.0,
            last_refill: ten_seconds_ago(),
        };
        bucket.refill(1.0, 100, Instant::now());
        assert_eq!(bucket.tokens, 100.0);
    }

    #[test]
    fn test_decision_retry_after() {
        let limit = RateLimit::per_window(2, 60);
        let mut bucket = TokenBucket::new(2);
        let now = bucket.last_refill;

        assert!(bucket.decide(limit, now).allowed);
        let second = bucket.decide(limit, now);
        assert!(second.allowed);
        assert_eq!(second.remaining, 0);

        let third = bucket.decide(limit, now);
        assert!(!third.allowed);
        assert_eq!(third.retry_after, 30);
        assert_eq!(third.reset_after, 60);
    }

    #[tokio::test]
    async fn test_local_limiter_isolates_clients() {
        let limiter = RateLimiter::local(RateLimit::per_window(1, 3600));

        assert!(limiter.check("10.0.0.1").await.unwrap().allowed);
        assert!(!limiter.check("10.0.0.1").await.unwrap().allowed);
        assert!(limiter.check("10.0.0.2").await.unwrap().allowed);
    }

    #[test]
    fn test_client_key_sources() {
        let mut request = Request::builder()
            .header("X-Forwarded-For", "203.0.113.7, 10.0.0.1")
            .body(Body::empty())
            .unwrap();
        assert_eq!(client_key(&request), "203.0.113.7");

        request
            .extensions_mut()
            .insert(ConnectInfo(SocketAddr::from(([192, 168, 1, 4], 5000))));
        assert_eq!(client_key(&request), "192.168.1.4");

        let bare = Request::builder().body(Body::empty()).unwrap();
        assert_eq!(client_key(&bare), "unknown");
    }
}
