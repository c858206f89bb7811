/// Rate limiting middleware for write endpoints
///
/// Token bucket per authenticated user. The bucket holds
/// `RATE_LIMIT_PER_MINUTE` tokens and refills at a rate of that many tokens
/// per minute. Each POST, PATCH or DELETE consumes one.
///
/// # Storage
///
/// - With Redis: hash `ratelimit:user:{user_id}` updated by one Lua script,
///   so every API instance shares the bucket. TTL 2 minutes.
/// - Without Redis: an in-process map. Buckets idle for the same TTL are
///   swept, since by then they have refilled to capacity.
///
/// A Redis failure lets the request through with a warning.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: bucket capacity
/// - `X-RateLimit-Remaining`: whole tokens left
/// - `Retry-After`: seconds to wait (429 responses only)

use crate::app::AppState;
use crate::error::ApiError;
use axum::{
    extract::{Extension, Request, State},
    http::HeaderValue,
    middleware::Next,
    response::Response,
};
use nation_shared::auth::middleware::AuthContext;
use nation_shared::redis::RedisClient;
use std::collections::HashMap;
use std::sync::Mutex;
use std::time::{SystemTime, UNIX_EPOCH};

/// Seconds an idle bucket is kept
const BUCKET_TTL_SECS: u64 = 120;

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

if tokens >= 1 then
    tokens = tokens - 1
    redis.call('HSET', key, 'tokens', tostring(tokens), 'last_refill', tostring(now))
    redis.call('EXPIRE', key, ttl)
    return {1, math.floor(tokens), 0}
else
    redis.call('HSET', key, 'tokens', tostring(tokens), 'last_refill', tostring(now))
    redis.call('EXPIRE', key, ttl)
    return {0, 0, math.ceil((1 - tokens) / refill_rate)}
end
"#;

/// Token bucket state
#[derive(Debug, Clone)]
struct TokenBucket {
    /// Current number of tokens
    tokens: f64,

    /// Last refill time (Unix seconds, fractional)
    last_refill: f64,
}

impl TokenBucket {
    /// Creates a full bucket
    fn new(capacity: u32, now: f64) -> Self {
        TokenBucket {
            tokens: capacity as f64,
            last_refill: now,
        }
    }

    /// Refills tokens based on elapsed time
    fn refill(&mut self, rate: f64, capacity: u32, now: f64) {
        let elapsed_secs = (now - self.last_refill).max(0.0);
        self.tokens = (self.tokens + elapsed_secs * rate).min(capacity as f64);
        self.last_refill = now;
    }

    /// Attempts to consume N tokens
    fn try_consume(&mut self, count: f64) -> bool {
        if self.tokens >= count {
            self.tokens -= count;
            true
        } else {
            false
        }
    }

    /// Calculates seconds until N tokens available
    fn seconds_until_available(&self, count: f64, rate: f64) -> u64 {
        let deficit = count - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            (deficit / rate).ceil() as u64
        }
    }
}

/// Outcome of one rate limit check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitResult {
    /// Whether request is allowed
    pub ok: bool,

    /// Whole tokens remaining
    pub remaining: u32,

    /// Seconds until a token is available (0 when allowed)
    pub retry_after: u64,
}

/// In-process buckets with the time of the last idle sweep
#[derive(Debug, Default)]
struct MemoryBuckets {
    buckets: HashMap<String, TokenBucket>,
    last_sweep: f64,
}

impl MemoryBuckets {
    /// Drops buckets untouched for `BUCKET_TTL_SECS`, at most once per TTL
    fn sweep_idle(&mut self, now: f64) {
        let ttl = BUCKET_TTL_SECS as f64;
        if now - self.last_sweep < ttl {
            return;
        }

        self.buckets.retain(|_, bucket| now - bucket.last_refill < ttl);
        self.last_sweep = now;
    }
}

enum Backend {
    Memory(Mutex<MemoryBuckets>),
    Redis(RedisClient),
}

/// Per-user token bucket limiter
pub struct RateLimiter {
    capacity: u32,
    backend: Backend,
}

impl RateLimiter {
    /// In-process buckets
    pub fn in_memory(requests_per_minute: u32) -> Self {
        Self {
            capacity: requests_per_minute,
            backend: Backend::Memory(Mutex::new(MemoryBuckets {
                buckets: HashMap::new(),
                last_sweep: unix_now(),
            })),
        }
    }

    /// Buckets shared through Redis
    pub fn redis(requests_per_minute: u32, client: RedisClient) -> Self {
        Self {
            capacity: requests_per_minute,
            backend: Backend::Redis(client),
        }
    }

    /// Bucket capacity; 0 means limiting is off
    pub fn capacity(&self) -> u32 {
        self.capacity
    }

    pub fn is_enabled(&self) -> bool {
        self.capacity > 0
    }

    fn refill_rate(&self) -> f64 {
        self.capacity as f64 / 60.0
    }

    /// Consumes one token for `user_id` if available
    pub async fn check(&self, user_id: &str) -> RateLimitResult {
        if !self.is_enabled() {
            return RateLimitResult {
                ok: true,
                remaining: 0,
                retry_after: 0,
            };
        }

        let now = unix_now();
        match &self.backend {
            Backend::Memory(buckets) => self.check_memory(buckets, user_id, now),
            Backend::Redis(client) => match self.check_redis(client, user_id, now).await {
                Ok(result) => result,
                Err(e) => {
                    tracing::warn!(error = %e, user_id, "Rate limit check failed, allowing request");
                    RateLimitResult {
                        ok: true,
                        remaining: self.capacity,
                        retry_after: 0,
                    }
                }
            },
        }
    }

    fn check_memory(
        &self,
        buckets: &Mutex<MemoryBuckets>,
        user_id: &str,
        now: f64,
    ) -> RateLimitResult {
        let rate = self.refill_rate();
        let mut state = buckets.lock().unwrap_or_else(|e| e.into_inner());
        state.sweep_idle(now);

        let bucket = state
            .buckets
            .entry(user_id.to_string())
            .or_insert_with(|| TokenBucket::new(self.capacity, now));
        bucket.refill(rate, self.capacity, now);

        if bucket.try_consume(1.0) {
            RateLimitResult {
                ok: true,
                remaining: bucket.tokens.floor() as u32,
                retry_after: 0,
            }
        } else {
            RateLimitResult {
                ok: false,
                remaining: 0,
                retry_after: bucket.seconds_until_available(1.0, rate).max(1),
            }
        }
    }

    async fn check_redis(
        &self,
        client: &RedisClient,
        user_id: &str,
        now: f64,
    ) -> Result<RateLimitResult, redis::RedisError> {
        let mut conn = client.connection();
        let key = format!("ratelimit:user:{}", user_id);

        let result: Vec<i64> = redis::Script::new(TOKEN_BUCKET_SCRIPT)
            .key(&key)
            .arg(self.capacity)
            .arg(self.refill_rate())
            .arg(now)
            .arg(BUCKET_TTL_SECS)
            .invoke_async(&mut conn)
            .await?;

        let field = |i: usize| result.get(i).copied().unwrap_or(0);
        Ok(RateLimitResult {
            ok: field(0) == 1,
            remaining: field(1).max(0) as u32,
            retry_after: field(2).max(0) as u64,
        })
    }
}

fn unix_now() -> f64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs_f64())
        .unwrap_or_default()
}

/// Rate limiting middleware layer
///
/// Must run inside the authentication layer so `AuthContext` is present.
///
/// # Errors
///
/// - 429 Too Many Requests: bucket empty
pub async fn rate_limit_layer(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    request: Request,
    next: Next,
) -> Result<Response, ApiError> {
    let limiter = &state.rate_limiter;
    if !limiter.is_enabled() {
        return Ok(next.run(request).await);
    }

    let result = limiter.check(&auth.user_id).await;
    if !result.ok {
        tracing::info!(user_id = %auth.user_id, retry_after = result.retry_after, "Rate limit exceeded");
        return Err(ApiError::RateLimitExceeded {
            retry_after: result.retry_after,
            message: format!(
                "Rate limit exceeded. Try again in {} seconds",
                result.retry_after
            ),
        });
    }

    let mut response = next.run(request).await;

    let headers = response.headers_mut();
    headers.insert("X-RateLimit-Limit", HeaderValue::from(limiter.capacity()));
    headers.insert("X-RateLimit-Remaining", HeaderValue::from(result.remaining));

    Ok(response)
}
