/// Rate limiting middleware for the unauthenticated auth endpoints
///
/// Token bucket per client address. Each bucket holds up to `capacity`
/// tokens and refills evenly over a minute; a request consumes one token and
/// is rejected with 429 when the bucket is empty.
///
/// The client address is the socket peer (`ConnectInfo<SocketAddr>`, so the
/// server must be started with `into_make_service_with_connect_info`).
/// `X-Forwarded-For` / `X-Real-IP` are only read when the peer is one of the
/// configured trusted proxies.
///
/// # Storage
///
/// With Redis configured, buckets live in hashes at `rate_limit:{scope}:{ip}`
/// and are updated by a single Lua script so concurrent API instances share
/// one budget. Without Redis, or when a Redis call fails, an in-process
/// bucket map is used instead.
///
/// # Headers
///
/// - `X-RateLimit-Limit`: bucket capacity
/// - `X-RateLimit-Remaining`: tokens left after this request
/// - `Retry-After`: seconds until a token is available (429 only)
///
/// # Example
///
/// ```no_run
/// use axum::{middleware, routing::post, Router};
/// use taskhub_api::middleware::rate_limit::{rate_limit_layer, RateLimit, RateLimiter};
///
/// let limiter = RateLimiter::in_memory("auth", RateLimit::per_minute(10));
/// let app: Router = Router::new()
///     .route("/auth/login", post(|| async { "ok" }))
///     .layer(middleware::from_fn_with_state(limiter, rate_limit_layer));
/// ```

use crate::error::ApiError;
use axum::{
    extract::{ConnectInfo, Request, State},
    http::{HeaderMap, HeaderValue},
    middleware::Next,
    response::{IntoResponse, Response},
};
use redis::aio::ConnectionManager;
use std::collections::HashMap;
use std::net::{IpAddr, SocketAddr};
use std::sync::{Arc, Mutex, PoisonError};
use std::time::Duration;
use taskhub_shared::redis::{RedisClient, RedisClientError};
use tokio::time::Instant;

/// In-process bucket map bound; idle buckets go first, then the least recent
const MAX_TRACKED_CLIENTS: usize = 10_000;

/// Redis key lifetime; a bucket untouched this long is full again anyway
const BUCKET_TTL_SECS: u64 = 120;

const TOKEN_BUCKET_SCRIPT: &str = r#"
local key = KEYS[1]
local capacity = tonumber(ARGV[1])
local refill_per_ms = tonumber(ARGV[2])
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
tokens = math.min(capacity, tokens + (elapsed * refill_per_ms))

local allowed = 0
if tokens >= 1 then
    tokens = tokens - 1
    allowed = 1
end

redis.call('HMSET', key, 'tokens', tostring(tokens), 'last_refill', now)
redis.call('EXPIRE', key, ttl)

local wait_ms = 0
if allowed == 0 then
    wait_ms = math.ceil((1 - tokens) / refill_per_ms)
end

return {allowed, math.floor(tokens), wait_ms}
"#;

/// Bucket parameters
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct RateLimit {
    /// Maximum tokens in the bucket (burst size)
    pub capacity: u32,

    /// Tokens added per second
    pub refill_rate: f64,
}

impl RateLimit {
    /// `requests` per minute, all of which may be spent in a burst
    pub fn per_minute(requests: u32) -> Self {
        let requests = requests.max(1);
        Self {
            capacity: requests,
            refill_rate: requests as f64 / 60.0,
        }
    }
}

/// Outcome of a single bucket check
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct RateLimitDecision {
    pub allowed: bool,
    pub remaining: u32,

    /// Seconds until the next token, zero when allowed
    pub retry_after: u64,
}

#[derive(Debug, Clone)]
struct TokenBucket {
    tokens: f64,
    last_refill: Instant,
}

impl TokenBucket {
    fn full(capacity: u32) -> Self {
        Self {
            tokens: capacity as f64,
            last_refill: Instant::now(),
        }
    }

    fn refill(&mut self, limit: RateLimit) {
        let now = Instant::now();
        let elapsed = now.duration_since(self.last_refill).as_secs_f64();

        self.tokens = (self.tokens + elapsed * limit.refill_rate).min(limit.capacity as f64);
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

    fn seconds_until_available(&self, rate: f64) -> u64 {
        let deficit = 1.0 - self.tokens;
        if deficit <= 0.0 {
            0
        } else {
            ((deficit / rate).ceil() as u64).max(1)
        }
    }
}

#[derive(Clone)]
struct RedisBuckets {
    conn: ConnectionManager,
    command_timeout: Duration,
}

/// Token-bucket limiter shared by all requests of one scope
///
/// Cheap to clone; clones share the same buckets.
#[derive(Clone)]
pub struct RateLimiter {
    scope: &'static str,
    limit: RateLimit,
    redis: Option<RedisBuckets>,
    buckets: Arc<Mutex<HashMap<String, TokenBucket>>>,
    max_clients: usize,
    trusted_proxies: Arc<[IpAddr]>,
}

impl RateLimiter {
    /// Creates a limiter backed by Redis when a client is given
    pub fn new(scope: &'static str, limit: RateLimit, redis: Option<&RedisClient>) -> Self {
        Self {
            scope,
            limit,
            redis: redis.map(|client| RedisBuckets {
                conn: client.get_connection(),
                command_timeout: client.config().command_timeout(),
            }),
            buckets: Arc::new(Mutex::new(HashMap::new())),
            max_clients: MAX_TRACKED_CLIENTS,
            trusted_proxies: Arc::from(Vec::new()),
        }
    }

    /// Proxies whose forwarding headers name the real client
    pub fn with_trusted_proxies(mut self, proxies: Vec<IpAddr>) -> Self {
        self.trusted_proxies = Arc::from(proxies);
        self
    }

    /// Creates a limiter that only uses in-process buckets
    pub fn in_memory(scope: &'static str, limit: RateLimit) -> Self {
        Self::new(scope, limit, None)
    }

    pub fn limit(&self) -> RateLimit {
        self.limit
    }

    pub fn backend_name(&self) -> &'static str {
        if self.redis.is_some() {
            "redis"
        } else {
            "memory"
        }
    }

    /// Consumes one token for `client`
    pub async fn check(&self, client: &str) -> RateLimitDecision {
        if let Some(redis) = &self.redis {
            match self.check_redis(redis, client).await {
                Ok(decision) => return decision,
                Err(e) => {
                    tracing::warn!(
                        scope = self.scope,
                        error = %e,
                        "Rate limit check failed in Redis, using in-process bucket"
                    );
                }
            }
        }

        self.check_memory(client)
    }

    async fn check_redis(
        &self,
        redis: &RedisBuckets,
        client: &str,
    ) -> Result<RateLimitDecision, RedisClientError> {
        let key = format!("rate_limit:{}:{}", self.scope, client);
        let now_ms = chrono::Utc::now().timestamp_millis();
        let refill_per_ms = self.limit.refill_rate / 1000.0;

        let script = redis::Script::new(TOKEN_BUCKET_SCRIPT);
        let mut invocation = script.prepare_invoke();
        invocation
            .key(&key)
            .arg(self.limit.capacity)
            .arg(refill_per_ms)
            .arg(now_ms)
            .arg(BUCKET_TTL_SECS);

        let mut conn = redis.conn.clone();
        let result: Vec<i64> =
            tokio::time::timeout(redis.command_timeout, invocation.invoke_async(&mut conn))
                .await
                .map_err(|_| RedisClientError::CommandError("rate limit script timed out".to_string()))??;

        match result.as_slice() {
            [allowed, remaining, wait_ms] => Ok(RateLimitDecision {
                allowed: *allowed == 1,
                remaining: (*remaining).max(0) as u32,
                retry_after: if *allowed == 1 {
                    0
                } else {
                    ((*wait_ms).max(0) as u64).div_ceil(1000).max(1)
                },
            }),
            other => Err(RedisClientError::CommandError(format!(
                "unexpected rate limit script reply: {:?}",
                other
            ))),
        }
    }

    fn check_memory(&self, client: &str) -> RateLimitDecision {
        let mut buckets = self.buckets.lock().unwrap_or_else(PoisonError::into_inner);

        if buckets.len() >= self.max_clients && !buckets.contains_key(client) {
            let refill_period =
                Duration::from_secs_f64(self.limit.capacity as f64 / self.limit.refill_rate);
            buckets.retain(|_, bucket| bucket.last_refill.elapsed() < refill_period);

            if buckets.len() >= self.max_clients {
                let oldest = buckets
                    .iter()
                    .min_by_key(|(_, bucket)| bucket.last_refill)
                    .map(|(key, _)| key.clone());
                if let Some(oldest) = oldest {
                    buckets.remove(&oldest);
                }
            }
        }

        let bucket = buckets
            .entry(client.to_string())
            .or_insert_with(|| TokenBucket::full(self.limit.capacity));

        bucket.refill(self.limit);
        let allowed = bucket.try_consume();

        RateLimitDecision {
            allowed,
            remaining: bucket.tokens.floor() as u32,
            retry_after: if allowed {
                0
            } else {
                bucket.seconds_until_available(self.limit.refill_rate)
            },
        }
    }
}

/// Client address used as the bucket key
///
/// The socket peer, unless the peer is a trusted proxy: then the nearest
/// untrusted hop of `X-Forwarded-For` (scanning from the right), else
/// `X-Real-IP`. Header values that are not IP addresses are ignored.
/// Without a peer address the key is `unknown`.
pub fn client_key(headers: &HeaderMap, peer: Option<IpAddr>, trusted_proxies: &[IpAddr]) -> String {
    let Some(peer) = peer else {
        return "unknown".to_string();
    };

    if !trusted_proxies.contains(&peer) {
        return peer.to_string();
    }

    let header_ip = |name: &str| -> Option<&str> {
        headers.get(name).and_then(|v| v.to_str().ok())
    };

    let forwarded = header_ip("x-forwarded-for").and_then(|value| {
        value
            .rsplit(',')
            .filter_map(|hop| hop.trim().parse::<IpAddr>().ok())
            .find(|hop| !trusted_proxies.contains(hop))
    });

    let real_ip = || {
        header_ip("x-real-ip").and_then(|value| value.trim().parse::<IpAddr>().ok())
    };

    forwarded.or_else(real_ip).unwrap_or(peer).to_string()
}

fn set_limit_headers(response: &mut Response, limit: RateLimit, remaining: u32) {
    let headers = response.headers_mut();
    headers.insert("x-ratelimit-limit", HeaderValue::from(limit.capacity));
    headers.insert("x-ratelimit-remaining", HeaderValue::from(remaining));
}

/// Rejects requests once the client's bucket is empty
pub async fn rate_limit_layer(
    State(limiter): State<RateLimiter>,
    request: Request,
    next: Next,
) -> Response {
    let peer = request
        .extensions()
        .get::<ConnectInfo<SocketAddr>>()
        .map(|ConnectInfo(addr)| addr.ip());
    let client = client_key(request.headers(), peer, &limiter.trusted_proxies);
    let decision = limiter.check(&client).await;
    let limit = limiter.limit();

    if !decision.allowed {
        tracing::warn!(
            scope = limiter.scope,
            client = %client,
            retry_after = decision.retry_after,
            "Rate limit exceeded"
        );

        let mut response = ApiError::RateLimitExceeded {
            retry_after: decision.retry_after,
            message: format!(
                "Too many requests. Try again in {} seconds",
                decision.retry_after
            ),
        }
        .into_response();
        set_limit_headers(&mut response, limit, 0);
        return response;
    }

    let mut response = next.run(request).await;
    set_limit_headers(&mut response, limit, decision.remaining);
    response
}
