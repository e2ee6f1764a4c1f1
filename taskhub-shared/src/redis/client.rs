/// Redis client wrapper with health checks
///
/// Wraps `redis::aio::ConnectionManager`, which reconnects on its own after a
/// dropped connection. Every command issued through this module is bounded by
/// the configured command timeout so a stalled Redis degrades to the
/// in-memory fallbacks instead of stalling requests.

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
use std::env;
use std::sync::Arc;
use std::time::Duration;
use thiserror::Error;

/// Redis client errors
#[derive(Error, Debug)]
pub enum RedisClientError {
    /// Connection error
    #[error("Redis connection error: {0}")]
    ConnectionError(String),

    /// Command execution error
    #[error("Redis command error: {0}")]
    CommandError(String),

    /// Configuration error
    #[error("Redis configuration error: {0}")]
    ConfigError(String),

    /// Health check failed
    #[error("Redis health check failed: {0}")]
    HealthCheckFailed(String),
}

impl From<RedisError> for RedisClientError {
    fn from(err: RedisError) -> Self {
        if err.is_io_error() || err.is_connection_dropped() || err.is_connection_refusal() {
            RedisClientError::ConnectionError(err.to_string())
        } else {
            RedisClientError::CommandError(err.to_string())
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RedisConfig {
    /// redis://[username:password@]host:port[/db]
    pub url: String,

    /// Initial connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Per-command timeout in seconds
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Configuration with default timeouts (5s connect, 2s per command)
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            url: url.into(),
            connection_timeout_secs: 5,
            command_timeout_secs: 2,
        }
    }

    pub fn with_command_timeout(mut self, secs: u64) -> Self {
        self.command_timeout_secs = secs.max(1);
        self
    }

    /// Reads `REDIS_URL` and the timeout variables from the environment
    ///
    /// Returns `Ok(None)` when `REDIS_URL` is unset or empty; running without
    /// Redis is a supported configuration.
    ///
    /// # Environment Variables
    ///
    /// - `REDIS_URL`: Redis connection URL (optional)
    /// - `REDIS_CONNECTION_TIMEOUT_SECS`: Connection timeout (default: 5)
    /// - `REDIS_COMMAND_TIMEOUT_SECS`: Command timeout (default: 2)
    pub fn from_env() -> Result<Option<Self>, RedisClientError> {
        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Same as [`from_env`](Self::from_env) over an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> Result<Option<Self>, RedisClientError>
    where
        F: Fn(&str) -> Option<String>,
    {
        let url = match lookup("REDIS_URL") {
            Some(url) if !url.trim().is_empty() => url,
            _ => return Ok(None),
        };

        let mut config = Self::new(url);

        if let Some(value) = lookup("REDIS_CONNECTION_TIMEOUT_SECS") {
            config.connection_timeout_secs = parse_secs("REDIS_CONNECTION_TIMEOUT_SECS", &value)?;
        }

        if let Some(value) = lookup("REDIS_COMMAND_TIMEOUT_SECS") {
            config = config.with_command_timeout(parse_secs("REDIS_COMMAND_TIMEOUT_SECS", &value)?);
        }

        Ok(Some(config))
    }

    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.command_timeout_secs)
    }

    /// Local Redis with default timeouts
    #[cfg(test)]
    pub fn default_for_test() -> Self {
        Self::new("redis://localhost:6379")
    }
}

fn parse_secs(name: &str, value: &str) -> Result<u64, RedisClientError> {
    value.trim().parse().map_err(|_| {
        RedisClientError::ConfigError(format!("{} must be a number of seconds, got {:?}", name, value))
    })
}

/// Cloneable Redis handle
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl std::fmt::Debug for RedisClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RedisClient")
            .field("url", &sanitize_url(&self.config.url))
            .finish()
    }
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Fails if the URL is invalid or no connection is established within
    /// the connection timeout.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str())
            .map_err(|e| RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e)))?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| RedisClientError::ConnectionError("connection timed out".to_string()))?
        .map_err(|e| RedisClientError::ConnectionError(format!("Failed to connect: {}", e)))?;

        tracing::info!(url = %sanitize_url(&config.url), "Redis client connected");

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING; `Ok(true)` on PONG
    pub async fn ping(&self) -> Result<bool, RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            self.config.command_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| RedisClientError::HealthCheckFailed("PING timed out".to_string()))?;

        match result {
            Ok(pong) if pong == "PONG" => Ok(true),
            Ok(other) => {
                tracing::warn!(response = %other, "Unexpected PING response");
                Ok(false)
            }
            Err(e) => Err(RedisClientError::HealthCheckFailed(e.to_string())),
        }
    }

    /// Connection handle for issuing commands
    pub fn get_connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    pub fn config(&self) -> &RedisConfig {
        &self.config
    }

    /// Health summary for `/health`
    pub async fn stats(&self) -> RedisStats {
        let healthy = match self.ping().await {
            Ok(healthy) => healthy,
            Err(e) => {
                tracing::warn!(error = %e, "Redis health check failed");
                false
            }
        };

        RedisStats {
            healthy,
            url: sanitize_url(&self.config.url),
        }
    }
}

/// Redis connection status
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisStats {
    /// Responds to PING
    pub healthy: bool,

    /// URL with credentials masked
    pub url: String,
}

/// Masks credentials in a Redis URL for logging
pub fn sanitize_url(url: &str) -> String {
    if let (Some(at_pos), Some(scheme_end)) = (url.rfind('@'), url.find("://")) {
        if at_pos > scheme_end {
            return format!("{}***@{}", &url[..scheme_end + 3], &url[at_pos + 1..]);
        }
    }
    url.to_string()
}
