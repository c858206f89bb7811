/// Redis client wrapper with connection management and health checks
///
/// Redis is optional. When `REDIS_HOST` is set the API uses it for the shared
/// rate limit buckets and reports its state on `/health`.
///
/// # Example
///
/// ```no_run
/// use nation_shared::redis::client::{RedisClient, RedisConfig};
///
/// # async fn example() -> anyhow::Result<()> {
/// let config = RedisConfig::from_host("localhost", 6379);
/// let client = RedisClient::new(config).await?;
/// client.ping().await?;
/// # Ok(())
/// # }
/// ```

use redis::aio::ConnectionManager;
use redis::{Client, RedisError};
use serde::{Deserialize, Serialize};
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
        match err.kind() {
            redis::ErrorKind::IoError => {
                RedisClientError::ConnectionError(format!("IO error: {}", err))
            }
            _ => RedisClientError::CommandError(err.to_string()),
        }
    }
}

/// Redis configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisConfig {
    /// Redis connection URL
    ///
    /// Format: redis://[username:password@]host:port[/db]
    pub url: String,

    /// Connection timeout in seconds
    pub connection_timeout_secs: u64,

    /// Command timeout in seconds
    pub command_timeout_secs: u64,
}

impl RedisConfig {
    /// Builds a configuration for `redis://{host}:{port}` with default timeouts
    pub fn from_host(host: &str, port: u16) -> Self {
        Self {
            url: format!("redis://{}:{}", host, port),
            connection_timeout_secs: 5,
            command_timeout_secs: 2,
        }
    }
}

/// Redis client backed by a reconnecting `ConnectionManager`
///
/// Cheap to clone.
#[derive(Clone)]
pub struct RedisClient {
    manager: ConnectionManager,
    config: Arc<RedisConfig>,
}

impl RedisClient {
    /// Connects to Redis
    ///
    /// # Errors
    ///
    /// Returns an error if the URL is invalid or the first connection fails
    /// within `connection_timeout_secs`.
    pub async fn new(config: RedisConfig) -> Result<Self, RedisClientError> {
        let client = Client::open(config.url.as_str()).map_err(|e| {
            RedisClientError::ConfigError(format!("Invalid Redis URL: {}", e))
        })?;

        let manager = tokio::time::timeout(
            Duration::from_secs(config.connection_timeout_secs),
            ConnectionManager::new(client),
        )
        .await
        .map_err(|_| RedisClientError::ConnectionError("Connection timed out".to_string()))?
        .map_err(|e| {
            RedisClientError::ConnectionError(format!("Failed to connect to Redis: {}", e))
        })?;

        tracing::info!(
            "Redis client connected successfully to {}",
            sanitize_url(&config.url)
        );

        Ok(Self {
            manager,
            config: Arc::new(config),
        })
    }

    /// Sends PING and expects PONG
    pub async fn ping(&self) -> Result<(), RedisClientError> {
        let mut conn = self.manager.clone();

        let result: Result<String, RedisError> = tokio::time::timeout(
            self.command_timeout(),
            redis::cmd("PING").query_async(&mut conn),
        )
        .await
        .map_err(|_| {
            RedisClientError::HealthCheckFailed("PING command timed out".to_string())
        })?;

        match result {
            Ok(pong) if pong == "PONG" => Ok(()),
            Ok(other) => Err(RedisClientError::HealthCheckFailed(format!(
                "unexpected response: {}",
                other
            ))),
            Err(e) => Err(RedisClientError::HealthCheckFailed(e.to_string())),
        }
    }

    /// Returns a connection handle
    ///
    /// The manager reconnects on its own, so the handle is always usable.
    pub fn connection(&self) -> ConnectionManager {
        self.manager.clone()
    }

    /// Upper bound for a single command
    pub fn command_timeout(&self) -> Duration {
        Duration::from_secs(self.config.command_timeout_secs)
    }

    /// Gets the Redis configuration
    pub fn config(&self) -> &RedisConfig {
        &self.config
    }
}

/// Replaces credentials with `***:***` for logging
pub fn sanitize_url(url: &str) -> String {
    if let Some(at_pos) = url.find('@') {
        if let Some(scheme_end) = url.find("://") {
            let scheme = &url[..scheme_end + 3];
            let host = &url[at_pos + 1..];
            return format!("{}***:***@{}", scheme, host);
        }
    }
    url.to_string()
}
