/// Revoked-token store
///
/// Tracks revoked token identifiers (`jti`) for a bounded time so that
/// otherwise stateless JWTs can be logged out. The store is consulted on
/// every authenticated request, so every lookup is a single keyed read.
///
/// # Tiers
///
/// ```text
///   RevocationStore ──► primary (Redis, optional)   token_blacklist:{jti}  SET EX ttl
///          │
///          └──────────► fallback (in-process map)  jti -> expires_at
/// ```
///
/// The coordinator tries the primary first. Any primary error sends the call
/// down to the fallback: [`RevocationError::Unavailable`] is logged as a
/// warning and [`RevocationError::Backend`] at error level. No error reaches
/// the caller.
///
/// Per jti the only states are *absent* and *revoked until `expires_at`*.
/// Once the expiry passes, the record is gone (natively in Redis, lazily or by
/// sweep in memory) and the jti is treated as absent again.
///
/// # Example
///
/// ```
/// use std::time::Duration;
/// use taskhub_shared::auth::revocation::RevocationStore;
///
/// # async fn example() {
/// let store = RevocationStore::in_memory();
/// assert!(store.add("4f0c7a1e", Some(Duration::from_secs(60))).await);
/// assert!(store.is_revoked("4f0c7a1e").await);
///
/// store.remove("4f0c7a1e").await;
/// assert!(!store.is_revoked("4f0c7a1e").await);
/// # }
/// ```

use std::collections::HashMap;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use redis::aio::ConnectionManager;

use super::jwt::Claims;
use crate::redis::RedisClient;

/// Key prefix for revocation records in Redis
pub const KEY_PREFIX: &str = "token_blacklist:";

/// Default revocation lifetime when the caller has no better bound
pub const DEFAULT_TTL: Duration = Duration::from_secs(24 * 60 * 60);

/// Errors returned by revocation backends
#[derive(Debug, thiserror::Error)]
pub enum RevocationError {
    /// The backend could not be reached (connection refused, dropped, timed out)
    #[error("revocation backend unavailable: {0}")]
    Unavailable(String),

    /// The backend was reached but rejected or garbled the command
    #[error("revocation backend error: {0}")]
    Backend(String),
}

impl From<redis::RedisError> for RevocationError {
    fn from(err: redis::RedisError) -> Self {
        if err.is_io_error()
            || err.is_connection_dropped()
            || err.is_connection_refusal()
            || err.is_timeout()
        {
            RevocationError::Unavailable(err.to_string())
        } else {
            RevocationError::Backend(err.to_string())
        }
    }
}

/// A TTL-aware set of revoked token identifiers
#[async_trait]
pub trait RevocationBackend: Send + Sync {
    /// Short name used in logs and health output
    fn name(&self) -> &'static str;

    /// Records `jti` as revoked for `ttl`. Re-inserting refreshes the expiry.
    async fn insert(&self, jti: &str, ttl: Duration) -> Result<(), RevocationError>;

    /// Whether `jti` is currently revoked
    async fn contains(&self, jti: &str) -> Result<bool, RevocationError>;

    /// Deletes the record for `jti`, returning whether one existed
    async fn remove(&self, jti: &str) -> Result<bool, RevocationError>;

    /// Deletes expired records, returning how many were removed
    async fn sweep(&self) -> Result<usize, RevocationError>;

    /// Number of live records
    async fn count(&self) -> Result<usize, RevocationError>;
}

/// Whole seconds for `SET EX`, rounded up and at least one
fn expire_seconds(ttl: Duration) -> u64 {
    let rounded = ttl.as_secs() + u64::from(ttl.subsec_nanos() > 0);
    rounded.max(1)
}

fn jti_prefix(jti: &str) -> &str {
    jti.get(..8).unwrap_or(jti)
}

/// In-process revocation map guarded by a mutex
///
/// The lock is only held for map operations and never across an `.await`.
#[derive(Debug, Default)]
pub struct MemoryRevocationBackend {
    entries: Mutex<HashMap<String, DateTime<Utc>>>,
}

impl MemoryRevocationBackend {
    pub fn new() -> Self {
        Self::default()
    }

    fn entries(&self) -> MutexGuard<'_, HashMap<String, DateTime<Utc>>> {
        // Every critical section is a single map operation, so poisoning is ignored
        self.entries.lock().unwrap_or_else(PoisonError::into_inner)
    }

    /// Raw number of stored entries, including expired ones not yet evicted
    pub fn len(&self) -> usize {
        self.entries().len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries().is_empty()
    }

    /// Stored expiry for `jti`, regardless of whether it has passed
    pub fn expires_at(&self, jti: &str) -> Option<DateTime<Utc>> {
        self.entries().get(jti).copied()
    }
}

#[async_trait]
impl RevocationBackend for MemoryRevocationBackend {
    fn name(&self) -> &'static str {
        "memory"
    }

    async fn insert(&self, jti: &str, ttl: Duration) -> Result<(), RevocationError> {
        let ttl = chrono::Duration::from_std(ttl).unwrap_or_else(|_| chrono::Duration::days(36500));
        let expires_at = Utc::now()
            .checked_add_signed(ttl)
            .unwrap_or(DateTime::<Utc>::MAX_UTC);

        self.entries().insert(jti.to_string(), expires_at);
        Ok(())
    }

    async fn contains(&self, jti: &str) -> Result<bool, RevocationError> {
        let mut entries = self.entries();

        match entries.get(jti) {
            Some(expires_at) if *expires_at > Utc::now() => Ok(true),
            Some(_) => {
                // Lazy eviction: an expired record must stop being honored
                entries.remove(jti);
                Ok(false)
            }
            None => Ok(false),
        }
    }

    async fn remove(&self, jti: &str) -> Result<bool, RevocationError> {
        Ok(self.entries().remove(jti).is_some())
    }

    async fn sweep(&self) -> Result<usize, RevocationError> {
        let now = Utc::now();
        let mut entries = self.entries();

        // Collect first, then delete
        let expired: Vec<String> = entries
            .iter()
            .filter(|(_, expires_at)| **expires_at <= now)
            .map(|(jti, _)| jti.clone())
            .collect();

        for jti in &expired {
            entries.remove(jti);
        }

        Ok(expired.len())
    }

    async fn count(&self) -> Result<usize, RevocationError> {
        let now = Utc::now();
        Ok(self
            .entries()
            .values()
            .filter(|expires_at| **expires_at > now)
            .count())
    }
}

/// Redis-backed revocation set; expiry is handled natively by `SET EX`
#[derive(Clone)]
pub struct RedisRevocationBackend {
    conn: ConnectionManager,
    command_timeout: Duration,
}

impl RedisRevocationBackend {
    pub fn new(conn: ConnectionManager, command_timeout: Duration) -> Self {
        Self {
            conn,
            command_timeout,
        }
    }

    /// Builds a backend sharing the client's connection manager and timeout
    pub fn from_client(client: &RedisClient) -> Self {
        Self::new(
            client.get_connection(),
            Duration::from_secs(client.config().command_timeout_secs),
        )
    }

    fn key(jti: &str) -> String {
        format!("{}{}", KEY_PREFIX, jti)
    }

    async fn run<T: redis::FromRedisValue + Send>(&self, cmd: redis::Cmd) -> Result<T, RevocationError> {
        let mut conn = self.conn.clone();

        tokio::time::timeout(self.command_timeout, cmd.query_async::<_, T>(&mut conn))
            .await
            .map_err(|_| RevocationError::Unavailable("command timed out".to_string()))?
            .map_err(RevocationError::from)
    }
}

#[async_trait]
impl RevocationBackend for RedisRevocationBackend {
    fn name(&self) -> &'static str {
        "redis"
    }

    async fn insert(&self, jti: &str, ttl: Duration) -> Result<(), RevocationError> {
        let seconds = expire_seconds(ttl);

        let mut cmd = redis::cmd("SET");
        cmd.arg(Self::key(jti))
            .arg(Utc::now().to_rfc3339())
            .arg("EX")
            .arg(seconds);

        self.run::<()>(cmd).await
    }

    async fn contains(&self, jti: &str) -> Result<bool, RevocationError> {
        let mut cmd = redis::cmd("EXISTS");
        cmd.arg(Self::key(jti));

        let exists: i64 = self.run(cmd).await?;
        Ok(exists > 0)
    }

    async fn remove(&self, jti: &str) -> Result<bool, RevocationError> {
        let mut cmd = redis::cmd("DEL");
        cmd.arg(Self::key(jti));

        let deleted: i64 = self.run(cmd).await?;
        Ok(deleted > 0)
    }

    async fn sweep(&self) -> Result<usize, RevocationError> {
        Ok(0)
    }

    async fn count(&self) -> Result<usize, RevocationError> {
        let pattern = format!("{}*", KEY_PREFIX);
        let mut cursor: u64 = 0;
        let mut total = 0;

        loop {
            let mut cmd = redis::cmd("SCAN");
            cmd.arg(cursor)
                .arg("MATCH")
                .arg(&pattern)
                .arg("COUNT")
                .arg(500);

            let (next, keys): (u64, Vec<String>) = self.run(cmd).await?;
            total += keys.len();

            if next == 0 {
                return Ok(total);
            }
            cursor = next;
        }
    }
}

/// Two-tier revocation coordinator
///
/// Cheap to clone; all clones share the same backends.
#[derive(Clone)]
pub struct RevocationStore {
    primary: Option<Arc<dyn RevocationBackend>>,
    fallback: Arc<dyn RevocationBackend>,
}

impl RevocationStore {
    /// Creates a store from an optional primary and a fallback
    pub fn new(
        primary: Option<Arc<dyn RevocationBackend>>,
        fallback: Arc<dyn RevocationBackend>,
    ) -> Self {
        Self { primary, fallback }
    }

    /// Memory-only store, used when no Redis is configured
    pub fn in_memory() -> Self {
        Self::new(None, Arc::new(MemoryRevocationBackend::new()))
    }

    /// Redis primary with an in-memory fallback
    pub fn with_redis(client: &RedisClient) -> Self {
        Self::new(
            Some(Arc::new(RedisRevocationBackend::from_client(client))),
            Arc::new(MemoryRevocationBackend::new()),
        )
    }

    /// Name of the tier that is tried first
    pub fn backend_name(&self) -> &'static str {
        self.primary
            .as_ref()
            .map(|p| p.name())
            .unwrap_or_else(|| self.fallback.name())
    }

    /// Revokes `jti` for `ttl` (24 hours when `None`)
    ///
    /// Always returns `true`: if the primary is unreachable the record lands in
    /// the fallback instead. Expired fallback records are swept on every call.
    pub async fn add(&self, jti: &str, ttl: Option<Duration>) -> bool {
        let ttl = ttl.unwrap_or(DEFAULT_TTL);
        let stored_in_primary = match &self.primary {
            Some(primary) => match primary.insert(jti, ttl).await {
                Ok(()) => true,
                Err(e) => {
                    self.log_primary_failure("add", jti, &e);
                    false
                }
            },
            None => false,
        };

        if !stored_in_primary {
            if let Err(e) = self.fallback.insert(jti, ttl).await {
                tracing::error!(
                    operation = "add",
                    jti = jti_prefix(jti),
                    backend = self.fallback.name(),
                    error = %e,
                    "Failed to record token revocation"
                );
            }
        }

        self.cleanup_expired().await;

        let backend = if stored_in_primary {
            self.backend_name()
        } else {
            self.fallback.name()
        };
        tracing::info!(
            jti = jti_prefix(jti),
            ttl_secs = ttl.as_secs(),
            backend,
            "Token revoked"
        );

        true
    }

    /// Revokes a decoded token until validation would reject it anyway
    pub async fn revoke_claims(&self, claims: &Claims) -> bool {
        self.add(&claims.jti, Some(claims.revocation_ttl())).await
    }

    /// Whether `jti` is revoked
    ///
    /// Never fails. When the primary cannot answer, the fallback decides;
    /// a revocation that exists only in an unreachable primary is missed.
    pub async fn is_revoked(&self, jti: &str) -> bool {
        if let Some(primary) = &self.primary {
            match primary.contains(jti).await {
                Ok(true) => return true,
                Ok(false) => {}
                Err(e) => self.log_primary_failure("is_revoked", jti, &e),
            }
        }

        match self.fallback.contains(jti).await {
            Ok(revoked) => revoked,
            Err(e) => {
                tracing::error!(
                    operation = "is_revoked",
                    jti = jti_prefix(jti),
                    backend = self.fallback.name(),
                    error = %e,
                    "Revocation lookup failed"
                );
                false
            }
        }
    }

    /// Un-revokes `jti` in both tiers
    ///
    /// Reinstates a previously revoked token. Administrative recovery only.
    pub async fn remove(&self, jti: &str) -> bool {
        let mut removed = false;

        if let Some(primary) = &self.primary {
            match primary.remove(jti).await {
                Ok(found) => removed |= found,
                Err(e) => self.log_primary_failure("remove", jti, &e),
            }
        }

        match self.fallback.remove(jti).await {
            Ok(found) => removed |= found,
            Err(e) => tracing::error!(
                operation = "remove",
                jti = jti_prefix(jti),
                error = %e,
                "Failed to remove revocation"
            ),
        }

        tracing::warn!(jti = jti_prefix(jti), removed, "Token revocation removed");
        removed
    }

    /// Deletes expired fallback records, returning how many were removed
    pub async fn cleanup_expired(&self) -> usize {
        match self.fallback.sweep().await {
            Ok(swept) => {
                if swept > 0 {
                    tracing::debug!(swept, "Swept expired token revocations");
                }
                swept
            }
            Err(e) => {
                tracing::error!(operation = "cleanup_expired", error = %e, "Revocation sweep failed");
                0
            }
        }
    }

    /// Number of live revocation records
    ///
    /// Counts the primary when reachable, otherwise the fallback.
    pub async fn count(&self) -> usize {
        if let Some(primary) = &self.primary {
            match primary.count().await {
                Ok(n) => return n,
                Err(e) => self.log_primary_failure("count", "", &e),
            }
        }

        self.fallback.count().await.unwrap_or(0)
    }

    fn log_primary_failure(&self, operation: &'static str, jti: &str, err: &RevocationError) {
        let backend = self.primary.as_ref().map(|p| p.name()).unwrap_or("none");
        match err {
            RevocationError::Unavailable(_) => tracing::warn!(
                operation,
                jti = jti_prefix(jti),
                backend,
                error = %err,
                "Revocation primary unavailable, using in-memory fallback"
            ),
            RevocationError::Backend(_) => tracing::error!(
                operation,
                jti = jti_prefix(jti),
                backend,
                error = %err,
                "Revocation primary failed, using in-memory fallback"
            ),
        }
    }
}

impl std::fmt::Debug for RevocationStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("RevocationStore")
            .field("primary", &self.primary.as_ref().map(|p| p.name()))
            .field("fallback", &self.fallback.name())
            .finish()
    }
}
