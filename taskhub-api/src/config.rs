/// Configuration management for the API server
///
/// Configuration comes from environment variables, with a `.env` file loaded
/// first when present.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `APP_ENV`: `production` enables HSTS and CSP (default: development)
/// - `CORS_ORIGINS`: comma-separated origins, `*` for any (default: http://localhost:3000)
/// - `DATABASE_URL`: PostgreSQL connection string (required)
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `JWT_SECRET`: HS256 secret, at least 32 characters (required)
/// - `JWT_ACCESS_TOKEN_EXPIRES_HOURS` (default: 1)
/// - `JWT_REFRESH_TOKEN_EXPIRES_DAYS` (default: 30)
/// - `REDIS_URL`, `REDIS_COMMAND_TIMEOUT_SECS`: optional Redis (see `RedisConfig`)
/// - `PASSWORD_MIN_LENGTH` (default: 8)
/// - `PASSWORD_REQUIRE_UPPERCASE` / `_NUMBERS` / `_SPECIAL` (default: false)
/// - `RATE_LIMIT_AUTH_PER_MINUTE` (default: 10)
/// - `RATE_LIMIT_TRUSTED_PROXIES`: comma-separated proxy IPs whose
///   `X-Forwarded-For` is believed (default: none, key on the socket peer)
/// - `LOGIN_MAX_FAILED_ATTEMPTS` (default: 5) within `LOGIN_LOCKOUT_MINUTES` (default: 15)
/// - `LOG_FORMAT`: `json` or `pretty` (default: pretty)
///
/// # Example
///
/// ```no_run
/// use taskhub_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use std::env;
use std::net::IpAddr;
use std::str::FromStr;

use anyhow::Context;
use serde::{Deserialize, Serialize};
use taskhub_shared::auth::password::PasswordPolicy;
use taskhub_shared::models::login_attempt::LockoutPolicy;
use taskhub_shared::redis::RedisConfig;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    pub api: ApiConfig,
    pub database: DatabaseConfig,
    pub jwt: JwtConfig,

    /// `None` runs with in-memory revocation and rate limiting
    pub redis: Option<RedisConfig>,

    pub password: PasswordPolicy,
    pub rate_limit: RateLimitConfig,
    pub lockout: LockoutConfig,
    pub log_format: LogFormat,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    pub host: String,
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// `APP_ENV=production`
    pub production: bool,
}

/// Database configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    pub url: String,
    pub max_connections: u32,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for HS256 signing
    ///
    /// Must be at least 32 characters. Generate with: `openssl rand -hex 32`
    #[serde(skip_serializing)]
    pub secret: String,

    pub access_token_expires_hours: i64,
    pub refresh_token_expires_days: i64,
}

impl JwtConfig {
    pub fn access_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::hours(self.access_token_expires_hours)
    }

    pub fn refresh_token_ttl(&self) -> chrono::Duration {
        chrono::Duration::days(self.refresh_token_expires_days)
    }
}

/// Rate limiting for unauthenticated auth endpoints
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests per minute per client address
    pub auth_per_minute: u32,

    /// Reverse proxies allowed to name the client in forwarding headers
    pub trusted_proxies: Vec<IpAddr>,
}

/// Account lockout after repeated failed logins
#[derive(Debug, Clone, Copy, Serialize, Deserialize)]
pub struct LockoutConfig {
    /// Failed attempts tolerated inside the window
    pub max_failed_attempts: i64,

    /// Window length, also how long the lock lasts
    pub window_minutes: i64,
}

impl LockoutConfig {
    pub fn window(&self) -> chrono::Duration {
        chrono::Duration::minutes(self.window_minutes)
    }

    pub fn policy(&self) -> LockoutPolicy {
        LockoutPolicy {
            max_failed_attempts: self.max_failed_attempts,
            window: self.window(),
        }
    }
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Pretty,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "pretty" | "text" => Ok(LogFormat::Pretty),
            "json" => Ok(LogFormat::Json),
            other => anyhow::bail!("LOG_FORMAT must be 'json' or 'pretty', got '{}'", other),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a required variable is missing or a value fails to parse.
    pub fn from_env() -> anyhow::Result<Self> {
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let host = lookup("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string());
        let port = parse_or(&lookup, "API_PORT", 8080u16)?;

        let production = lookup("APP_ENV")
            .map(|v| v.trim().eq_ignore_ascii_case("production"))
            .unwrap_or(false);

        let cors_origins = lookup("CORS_ORIGINS")
            .unwrap_or_else(|| "http://localhost:3000".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let database_url = lookup("DATABASE_URL")
            .context("DATABASE_URL environment variable is required")?;
        let max_connections = parse_or(&lookup, "DATABASE_MAX_CONNECTIONS", 10u32)?;

        let jwt_secret =
            lookup("JWT_SECRET").context("JWT_SECRET environment variable is required")?;

        if jwt_secret.chars().count() < 32 {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let access_token_expires_hours = parse_or(&lookup, "JWT_ACCESS_TOKEN_EXPIRES_HOURS", 1i64)?;
        let refresh_token_expires_days = parse_or(&lookup, "JWT_REFRESH_TOKEN_EXPIRES_DAYS", 30i64)?;

        if access_token_expires_hours <= 0 || refresh_token_expires_days <= 0 {
            anyhow::bail!("JWT token lifetimes must be positive");
        }

        let redis = RedisConfig::from_lookup(&lookup)?;

        let password = PasswordPolicy {
            min_length: parse_or(&lookup, "PASSWORD_MIN_LENGTH", 8usize)?,
            require_uppercase: parse_or(&lookup, "PASSWORD_REQUIRE_UPPERCASE", false)?,
            require_numbers: parse_or(&lookup, "PASSWORD_REQUIRE_NUMBERS", false)?,
            require_special: parse_or(&lookup, "PASSWORD_REQUIRE_SPECIAL", false)?,
        };

        let auth_per_minute = parse_or(&lookup, "RATE_LIMIT_AUTH_PER_MINUTE", 10u32)?;
        if auth_per_minute == 0 {
            anyhow::bail!("RATE_LIMIT_AUTH_PER_MINUTE must be at least 1");
        }

        let trusted_proxies = lookup("RATE_LIMIT_TRUSTED_PROXIES")
            .unwrap_or_default()
            .split(',')
            .map(str::trim)
            .filter(|ip| !ip.is_empty())
            .map(|ip| {
                ip.parse::<IpAddr>().map_err(|e| {
                    anyhow::anyhow!("RATE_LIMIT_TRUSTED_PROXIES has an invalid address '{}': {}", ip, e)
                })
            })
            .collect::<anyhow::Result<Vec<_>>>()?;

        let lockout = LockoutConfig {
            max_failed_attempts: parse_or(&lookup, "LOGIN_MAX_FAILED_ATTEMPTS", 5i64)?,
            window_minutes: parse_or(&lookup, "LOGIN_LOCKOUT_MINUTES", 15i64)?,
        };
        if lockout.max_failed_attempts <= 0 || lockout.window_minutes <= 0 {
            anyhow::bail!("LOGIN_MAX_FAILED_ATTEMPTS and LOGIN_LOCKOUT_MINUTES must be positive");
        }

        let log_format = match lookup("LOG_FORMAT") {
            Some(value) => value.parse()?,
            None => LogFormat::Pretty,
        };

        Ok(Self {
            api: ApiConfig {
                host,
                port,
                cors_origins,
                production,
            },
            database: DatabaseConfig {
                url: database_url,
                max_connections,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                access_token_expires_hours,
                refresh_token_expires_days,
            },
            redis,
            password,
            rate_limit: RateLimitConfig {
                auth_per_minute,
                trusted_proxies,
            },
            lockout,
            log_format,
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }
}

fn parse_or<F, T>(lookup: &F, key: &str, default: T) -> anyhow::Result<T>
where
    F: Fn(&str) -> Option<String>,
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match lookup(key) {
        Some(value) => value
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value '{}': {}", key, value, e)),
        None => Ok(default),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| vars.get(key).cloned())
    }

    fn minimal() -> Vec<(&'static str, &'static str)> {
        vec![
            ("DATABASE_URL", "postgresql://localhost/taskhub"),
            ("JWT_SECRET", SECRET),
        ]
    }

    #[test]
    fn test_defaults() {
        let config = load(&minimal()).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert_eq!(config.api.cors_origins, vec!["http://localhost:3000"]);
        assert!(!config.api.production);
        assert_eq!(config.database.max_connections, 10);
        assert_eq!(config.jwt.access_token_ttl(), chrono::Duration::hours(1));
        assert_eq!(config.jwt.refresh_token_ttl(), chrono::Duration::days(30));
        assert!(config.redis.is_none());
        assert_eq!(config.password.min_length, 8);
        assert!(!config.password.require_uppercase);
        assert_eq!(config.rate_limit.auth_per_minute, 10);
        assert!(config.rate_limit.trusted_proxies.is_empty());
        assert_eq!(config.lockout.max_failed_attempts, 5);
        assert_eq!(config.lockout.window(), chrono::Duration::minutes(15));
        assert_eq!(config.lockout.policy(), LockoutPolicy::default());
        assert_eq!(config.log_format, LogFormat::Pretty);
    }

    #[test]
    fn test_overrides() {
        let mut vars = minimal();
        vars.extend([
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("APP_ENV", "Production"),
            ("CORS_ORIGINS", "https://a.example, https://b.example,"),
            ("REDIS_URL", "redis://cache:6379"),
            ("REDIS_COMMAND_TIMEOUT_SECS", "3"),
            ("PASSWORD_REQUIRE_SPECIAL", "true"),
            ("RATE_LIMIT_AUTH_PER_MINUTE", "30"),
            ("RATE_LIMIT_TRUSTED_PROXIES", "10.0.0.1, ::1"),
            ("LOGIN_MAX_FAILED_ATTEMPTS", "3"),
            ("LOG_FORMAT", "json"),
        ]);
        let config = load(&vars).unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert!(config.api.production);
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        assert_eq!(config.redis.unwrap().command_timeout_secs, 3);
        assert!(config.password.require_special);
        assert_eq!(config.rate_limit.auth_per_minute, 30);
        assert_eq!(
            config.rate_limit.trusted_proxies,
            vec![
                "10.0.0.1".parse::<IpAddr>().unwrap(),
                "::1".parse::<IpAddr>().unwrap()
            ]
        );
        assert_eq!(config.lockout.max_failed_attempts, 3);
        assert_eq!(config.log_format, LogFormat::Json);
    }

    #[test]
    fn test_missing_required() {
        assert!(load(&[("JWT_SECRET", SECRET)]).is_err());
        assert!(load(&[("DATABASE_URL", "postgresql://localhost/taskhub")]).is_err());
    }

    #[test]
    fn test_short_secret_rejected() {
        let err = load(&[
            ("DATABASE_URL", "postgresql://localhost/taskhub"),
            ("JWT_SECRET", "short"),
        ])
        .unwrap_err();
        assert!(err.to_string().contains("at least 32 characters"));
    }

    #[test]
    fn test_invalid_values_rejected() {
        let mut vars = minimal();
        vars.push(("API_PORT", "eighty"));
        assert!(load(&vars).is_err());

        let mut vars = minimal();
        vars.push(("LOG_FORMAT", "xml"));
        assert!(load(&vars).is_err());

        let mut vars = minimal();
        vars.push(("RATE_LIMIT_AUTH_PER_MINUTE", "0"));
        assert!(load(&vars).is_err());

        let mut vars = minimal();
        vars.push(("RATE_LIMIT_TRUSTED_PROXIES", "proxy.internal"));
        assert!(load(&vars).is_err());

        let mut vars = minimal();
        vars.push(("LOGIN_LOCKOUT_MINUTES", "0"));
        assert!(load(&vars).is_err());
    }

    #[test]
    fn test_secret_not_serialized() {
        let config = load(&minimal()).unwrap();
        let json = serde_json::to_string(&config).unwrap();
        assert!(!json.contains(SECRET));
    }
}
