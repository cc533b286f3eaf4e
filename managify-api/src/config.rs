/// Configuration management for the API server
///
/// This module loads configuration from environment variables and provides
/// a type-safe configuration struct.
///
/// # Environment Variables
///
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8080)
/// - `DATABASE_URL`: PostgreSQL connection string; the in-memory store is
///   used when unset
/// - `DATABASE_MAX_CONNECTIONS`: pool size (default: 10)
/// - `STORE_TIMEOUT_MS`: per-operation store timeout (default: 5000)
/// - `JWT_SECRET`: secret key for JWT signing (required, 32+ chars)
/// - `JWT_TTL_SECONDS`: token lifetime (default: 3600)
/// - `CORS_ORIGINS` (or `VUE_HOST`): comma-separated origins or `*`
/// - `PRODUCTION`: enables HSTS
/// - `API_MAX_LIMITER` / `RATE_LIMIT_EXPIRATION`: requests per window and
///   window length in seconds (default: 100 per 60)
/// - `REDIS_URL`: shares rate-limit buckets through Redis when set
/// - `METRICS`: exposes `GET /metrics` when `true`
/// - `EMAIL_RELAY_URL`: HTTP relay for outgoing e-mail
/// - `APP_BASE_URL`: base of verification links
/// - `NOTIFY_WORKERS` / `NOTIFY_QUEUE`: notification pool sizing
/// - `RUST_LOG` / `LOG_FORMAT`: log filter and `json` output
///
/// # Example
///
/// ```no_run
/// use managify_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use serde::{Deserialize, Serialize};
use std::env;
use std::str::FromStr;

/// Shortest accepted JWT secret
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// Document store configuration
    pub database: DatabaseConfig,

    /// JWT configuration
    pub jwt: JwtConfig,

    /// Per-client request limits
    pub rate_limit: RateLimitConfig,

    /// Outgoing e-mail
    pub notify: NotifyConfig,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins; `*` allows any
    pub cors_origins: Vec<String>,

    /// Production mode (HSTS)
    pub production: bool,

    /// Serve `GET /metrics`
    pub metrics_enabled: bool,
}

/// Document store configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseConfig {
    /// PostgreSQL connection URL; `None` selects the in-memory store
    pub url: Option<String>,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Per-operation timeout in milliseconds
    pub operation_timeout_ms: u64,
}

/// JWT configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct JwtConfig {
    /// Secret key for JWT signing
    ///
    /// IMPORTANT: This must be kept secret and should be at least 32 bytes.
    /// Generate with: `openssl rand -hex 32`
    pub secret: String,

    /// Token lifetime in seconds
    pub ttl_seconds: i64,
}

/// Rate limit configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RateLimitConfig {
    /// Requests allowed per window per client
    pub max_requests: u32,

    /// Window length in seconds
    pub window_seconds: u64,

    /// Shared bucket store; local buckets when `None`
    pub redis_url: Option<String>,
}

/// Notification configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct NotifyConfig {
    /// HTTP relay; e-mails are only logged when `None`
    pub relay_url: Option<String>,

    /// Base URL of verification links
    pub base_url: String,

    /// Worker tasks
    pub workers: usize,

    /// Queue bound
    pub queue_size: usize,
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if:
    /// - `JWT_SECRET` is missing or shorter than 32 characters
    /// - A numeric or boolean variable has an invalid value
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| env::var(key).ok())
    }

    /// Builds configuration from an arbitrary variable source
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let var = |key: &str| lookup(key).filter(|v| !v.trim().is_empty());

        let jwt_secret = var("JWT_SECRET")
            .ok_or_else(|| anyhow::anyhow!("JWT_SECRET environment variable is required"))?;

        if jwt_secret.len() < MIN_JWT_SECRET_LEN {
            anyhow::bail!("JWT_SECRET must be at least 32 characters long");
        }

        let cors_origins = var("CORS_ORIGINS")
            .or_else(|| var("VUE_HOST"))
            .unwrap_or_else(|| "*".to_string())
            .split(',')
            .map(|origin| origin.trim().to_string())
            .filter(|origin| !origin.is_empty())
            .collect();

        let ttl_seconds: i64 = parse_or(var("JWT_TTL_SECONDS"), "JWT_TTL_SECONDS", 3600)?;
        if ttl_seconds <= 0 {
            anyhow::bail!("JWT_TTL_SECONDS must be positive");
        }

        let window_seconds: u64 = parse_or(var("RATE_LIMIT_EXPIRATION"), "RATE_LIMIT_EXPIRATION", 60)?;
        if window_seconds == 0 {
            anyhow::bail!("RATE_LIMIT_EXPIRATION must be positive");
        }

        Ok(Self {
            api: ApiConfig {
                host: var("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
                port: parse_or(var("API_PORT"), "API_PORT", 8080)?,
                cors_origins,
                production: parse_flag(var("PRODUCTION"), "PRODUCTION")?,
                metrics_enabled: parse_flag(var("METRICS"), "METRICS")?,
            },
            database: DatabaseConfig {
                url: var("DATABASE_URL"),
                max_connections: parse_or(var("DATABASE_MAX_CONNECTIONS"), "DATABASE_MAX_CONNECTIONS", 10)?,
                operation_timeout_ms: parse_or(var("STORE_TIMEOUT_MS"), "STORE_TIMEOUT_MS", 5000)?,
            },
            jwt: JwtConfig {
                secret: jwt_secret,
                ttl_seconds,
            },
            rate_limit: RateLimitConfig {
                max_requests: parse_or(var("API_MAX_LIMITER"), "API_MAX_LIMITER", 100)?,
                window_seconds,
                redis_url: var("REDIS_URL"),
            },
            notify: NotifyConfig {
                relay_url: var("EMAIL_RELAY_URL"),
                base_url: var("APP_BASE_URL").unwrap_or_else(|| "http://localhost:8080".to_string()),
                workers: parse_or(var("NOTIFY_WORKERS"), "NOTIFY_WORKERS", 2)?,
                queue_size: parse_or(var("NOTIFY_QUEUE"), "NOTIFY_QUEUE", 256)?,
            },
        })
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether any origin may call the API
    pub fn cors_allows_any(&self) -> bool {
        self.api.cors_origins.iter().any(|origin| origin == "*")
    }
}

fn parse_or<T>(value: Option<String>, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::fmt::Display,
{
    match value {
        Some(raw) => raw
            .trim()
            .parse()
            .map_err(|e| anyhow::anyhow!("{} has an invalid value {:?}: {}", key, raw, e)),
        None => Ok(default),
    }
}

fn parse_flag(value: Option<String>, key: &str) -> anyhow::Result<bool> {
    match value.as_deref().map(|v| v.trim().to_ascii_lowercase()) {
        None => Ok(false),
        Some(v) if v == "true" || v == "1" => Ok(true),
        Some(v) if v == "false" || v == "0" => Ok(false),
        Some(v) => anyhow::bail!("{} must be true or false, got {:?}", key, v),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::HashMap;

    const SECRET: &str = "test-secret-key-at-least-32-bytes-long";

    fn load(vars: &[(&str, &str)]) -> anyhow::Result<Config> {
        let map: HashMap<String, String> = vars
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_lookup(|key| map.get(key).cloned())
    }

    #[test]
    fn test_defaults() {
        let config = load(&[("JWT_SECRET", SECRET)]).unwrap();

        assert_eq!(config.bind_address(), "0.0.0.0:8080");
        assert!(config.database.url.is_none());
        assert_eq!(config.database.operation_timeout_ms, 5000);
        assert_eq!(config.jwt.ttl_seconds, 3600);
        assert_eq!(config.rate_limit.max_requests, 100);
        assert_eq!(config.rate_limit.window_seconds, 60);
        assert!(config.cors_allows_any());
        assert!(!config.api.production);
        assert!(!config.api.metrics_enabled);
        assert_eq!(config.notify.workers, 2);
        assert_eq!(config.notify.queue_size, 256);
    }

    #[test]
    fn test_jwt_secret_required() {
        assert!(load(&[]).is_err());
        assert!(load(&[("JWT_SECRET", "short")]).is_err());
    }

    #[test]
    fn test_overrides() {
        let config = load(&[
            ("JWT_SECRET", SECRET),
            ("API_HOST", "127.0.0.1"),
            ("API_PORT", "9000"),
            ("VUE_HOST", "http://localhost:5173, https://app.example.com"),
            ("PRODUCTION", "true"),
            ("METRICS", "1"),
            ("API_MAX_LIMITER", "5"),
            ("REDIS_URL", "redis://localhost:6379"),
            ("DATABASE_URL", "postgresql://localhost/managify"),
        ])
        .unwrap();

        assert_eq!(config.bind_address(), "127.0.0.1:9000");
        assert_eq!(
            config.api.cors_origins,
            vec!["http://localhost:5173", "https://app.example.com"]
        );
        assert!(!config.cors_allows_any());
        assert!(config.api.production);
        assert!(config.api.metrics_enabled);
        assert_eq!(config.rate_limit.max_requests, 5);
        assert!(config.rate_limit.redis_url.is_some());
        assert!(config.database.url.is_some());
    }

    #[test]
    fn test_invalid_values_rejected() {
        assert!(load(&[("JWT_SECRET", SECRET), ("API_PORT", "http")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("METRICS", "maybe")]).is_err());
        assert!(load(&[("JWT_SECRET", SECRET), ("JWT_TTL_SECONDS", "0")]).is_err());
    }
}
