/// Login attempt log and account lockout
///
/// Every login records one row keyed by the submitted email, so attempts
/// against unknown accounts count as well. An email is locked once it has
/// `max_failed_attempts` failures inside the trailing window; a successful
/// login starts the count over. The lock lifts one window after the most
/// recent failure.
///
/// # Example
///
/// ```no_run
/// use chrono::Utc;
/// use taskhub_shared::models::login_attempt::{LockoutPolicy, LoginAttempt};
/// use taskhub_shared::db::pool::{create_pool, DatabaseConfig};
///
/// # async fn example() -> Result<(), Box<dyn std::error::Error>> {
/// let pool = create_pool(DatabaseConfig::default()).await?;
/// let policy = LockoutPolicy::default();
///
/// let recent = LoginAttempt::recent_failures(&pool, "ada@example.com", Utc::now() - policy.window).await?;
/// if let Some(remaining) = policy.remaining(&recent, Utc::now()) {
///     println!("locked for another {}s", remaining.num_seconds());
/// }
/// # Ok(())
/// # }
/// ```

use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use sqlx::PgPool;

/// One login attempt
#[derive(Debug, Clone, Serialize, Deserialize, sqlx::FromRow)]
pub struct LoginAttempt {
    pub id: i64,
    pub email: String,
    pub ip_address: Option<String>,
    pub success: bool,

    /// `invalid_credentials` or `account_disabled` on failure
    pub failure_reason: Option<String>,

    pub attempted_at: DateTime<Utc>,
}

/// Input for recording an attempt
#[derive(Debug, Clone)]
pub struct RecordLoginAttempt {
    pub email: String,
    pub ip_address: Option<String>,
    pub success: bool,
    pub failure_reason: Option<String>,
}

impl RecordLoginAttempt {
    pub fn success(email: &str, ip_address: Option<String>) -> Self {
        Self {
            email: normalize_email(email),
            ip_address,
            success: true,
            failure_reason: None,
        }
    }

    pub fn failure(email: &str, ip_address: Option<String>, reason: &str) -> Self {
        Self {
            email: normalize_email(email),
            ip_address,
            success: false,
            failure_reason: Some(reason.to_string()),
        }
    }
}

/// Failures that count toward a lockout
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, sqlx::FromRow)]
pub struct FailureWindow {
    pub failures: i64,
    pub last_failure: Option<DateTime<Utc>>,
}

/// Lockout thresholds
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LockoutPolicy {
    /// Failures tolerated before the email is locked
    pub max_failed_attempts: i64,

    /// Counting window, and how long the lock lasts after the last failure
    pub window: Duration,
}

impl Default for LockoutPolicy {
    fn default() -> Self {
        Self {
            max_failed_attempts: 5,
            window: Duration::minutes(15),
        }
    }
}

impl LockoutPolicy {
    /// Time left on the lock; `None` while logins are allowed
    pub fn remaining(&self, recent: &FailureWindow, now: DateTime<Utc>) -> Option<Duration> {
        if recent.failures < self.max_failed_attempts {
            return None;
        }

        let remaining = recent.last_failure? + self.window - now;
        (remaining > Duration::zero()).then_some(remaining)
    }
}

fn normalize_email(email: &str) -> String {
    email.trim().to_lowercase()
}

impl LoginAttempt {
    /// Appends an attempt to the log
    pub async fn record(pool: &PgPool, data: RecordLoginAttempt) -> Result<Self, sqlx::Error> {
        sqlx::query_as::<_, LoginAttempt>(
            r#"
            INSERT INTO login_attempts (email, ip_address, success, failure_reason)
            VALUES ($1, $2, $3, $4)
            RETURNING id, email, ip_address, success, failure_reason, attempted_at
            "#,
        )
        .bind(data.email)
        .bind(data.ip_address)
        .bind(data.success)
        .bind(data.failure_reason)
        .fetch_one(pool)
        .await
    }

    /// Failures for `email` after `since` and after its latest success
    pub async fn recent_failures(
        pool: &PgPool,
        email: &str,
        since: DateTime<Utc>,
    ) -> Result<FailureWindow, sqlx::Error> {
        sqlx::query_as::<_, FailureWindow>(
            r#"
            SELECT COUNT(*) AS failures, MAX(attempted_at) AS last_failure
            FROM login_attempts
            WHERE email = $1
              AND success = FALSE
              AND attempted_at > $2
              AND attempted_at > COALESCE(
                  (SELECT MAX(attempted_at) FROM login_attempts
                   WHERE email = $1 AND success = TRUE),
                  '-infinity'::timestamptz
              )
            "#,
        )
        .bind(normalize_email(email))
        .bind(since)
        .fetch_one(pool)
        .await
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn window(failures: i64, minutes_ago: i64) -> FailureWindow {
        FailureWindow {
            failures,
            last_failure: Some(Utc::now() - Duration::minutes(minutes_ago)),
        }
    }

    #[test]
    fn test_below_threshold_not_locked() {
        let policy = LockoutPolicy::default();

        assert!(policy.remaining(&FailureWindow::default(), Utc::now()).is_none());
        assert!(policy.remaining(&window(4, 0), Utc::now()).is_none());
    }

    #[test]
    fn test_locked_until_window_after_last_failure() {
        let policy = LockoutPolicy::default();

        let remaining = policy.remaining(&window(5, 5), Utc::now()).unwrap();
        assert!(remaining <= Duration::minutes(10));
        assert!(remaining > Duration::minutes(9));

        assert!(policy.remaining(&window(7, 0), Utc::now()).is_some());
        assert!(policy.remaining(&window(5, 16), Utc::now()).is_none());
    }

    #[test]
    fn test_custom_policy() {
        let policy = LockoutPolicy {
            max_failed_attempts: 2,
            window: Duration::minutes(1),
        };

        assert!(policy.remaining(&window(2, 0), Utc::now()).is_some());
        assert!(policy.remaining(&window(2, 2), Utc::now()).is_none());
    }

    #[test]
    fn test_record_normalizes_email() {
        let attempt = RecordLoginAttempt::failure(" Ada@Example.COM ", None, "invalid_credentials");
        assert_eq!(attempt.email, "ada@example.com");
        assert!(!attempt.success);
        assert_eq!(attempt.failure_reason.as_deref(), Some("invalid_credentials"));

        assert!(RecordLoginAttempt::success("ada@example.com", None).success);
    }
}
