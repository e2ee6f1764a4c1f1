/// Redis integration
///
/// Redis is optional for TaskHub. When configured it backs the token
/// revocation list and the auth rate limiter so that state is shared across
/// API instances; when absent or unreachable both fall back to in-process
/// state.
///
/// # Key layout
///
/// ```text
/// token_blacklist:{jti}   revoked token, TTL = token's remaining lifetime
/// rate_limit:{scope}:{ip} token bucket hash {tokens, last_refill}
/// ```
///
/// # Example
///
/// ```no_run
/// use taskhub_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// if let Some(config) = RedisConfig::from_env()? {
///     let client = RedisClient::new(config).await?;
///     println!("Redis healthy: {}", client.ping().await?);
/// }
/// # Ok(())
/// # }
/// ```

pub mod client;

pub use client::{RedisClient, RedisClientError, RedisConfig, RedisStats};
