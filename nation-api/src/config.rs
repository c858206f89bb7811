/// Configuration management for the API server
///
/// Settings come from environment variables (after `.env` is loaded). Parsing
/// goes through [`Config::from_lookup`] so tests can feed a map instead of
/// touching the process environment. Empty values count as unset.
///
/// # Environment Variables
///
/// - `ENV`: deployment name (default: local); `*dev` / `*prod` enable Privy
/// - `RELEASE`: version reported by `/health` (default: crate version)
/// - `API_HOST` / `API_PORT`: bind address (default: 0.0.0.0:8000)
/// - `CORS_ORIGINS`: comma separated origins (default: *)
/// - `DATABASE_URL` or `DB_HOST`, `DB_PORT`, `DB_USERNAME`, `DB_PASSWORD`, `DB_NAME`
/// - `DB_POOL_SIZE`, `DB_AUTO_MIGRATE`
/// - `REDIS_HOST` / `REDIS_PORT`
/// - `JWT_SECRET`
/// - `PRIVY_APP_ID`, `PRIVY_APP_SECRET` (or `PRIVY_API_KEY`), `PRIVY_VERIFICATION_KEY`, `PRIVY_API_BASE`
/// - `AGENT_ENGINE`, `OPENAI_API_KEY`, `OPENAI_BASE_URL`, `OPENAI_TIMEOUT_SECS`
/// - `RATE_LIMIT_PER_MINUTE`
/// - `LOG_FORMAT`: `text` or `json`
///
/// # Example
///
/// ```no_run
/// use nation_api::config::Config;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// println!("Server will listen on {}", config.bind_address());
/// # Ok(())
/// # }
/// ```

use anyhow::{anyhow, bail, Context};
use nation_shared::db::pool::DatabaseConfig;
use nation_shared::engine::openai::DEFAULT_OPENAI_BASE_URL;
use nation_shared::auth::privy::DEFAULT_PRIVY_API_BASE;
use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use std::str::FromStr;

/// Shortest HS256 secret accepted without a warning
pub const MIN_JWT_SECRET_LEN: usize = 32;

/// Complete application configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// API server configuration
    pub api: ApiConfig,

    /// PostgreSQL settings; `None` runs on the in-memory store
    pub database: Option<DatabaseSettings>,

    /// Redis settings; `None` keeps rate limit buckets in process
    pub redis: Option<RedisSettings>,

    /// Token verification settings
    pub auth: AuthConfig,

    /// Agent engine selection
    pub engine: EngineConfig,

    /// Write requests allowed per user per minute; 0 disables limiting
    pub rate_limit_per_minute: u32,

    /// Log output format
    pub log_format: LogFormat,
}

/// API server configuration
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ApiConfig {
    /// Deployment environment name
    pub env: String,

    /// Release reported by `/health`
    pub release: String,

    /// Host to bind to
    pub host: String,

    /// Port to bind to
    pub port: u16,

    /// Allowed CORS origins (`*` for any)
    pub cors_origins: Vec<String>,
}

impl ApiConfig {
    /// Production deployments get HSTS
    pub fn is_production(&self) -> bool {
        self.env.ends_with("prod")
    }

    /// Deployments verified through Privy
    pub fn uses_privy(&self) -> bool {
        self.env.ends_with("dev") || self.env.ends_with("prod")
    }
}

/// Database settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct DatabaseSettings {
    /// PostgreSQL connection URL
    pub url: String,

    /// Maximum number of connections in pool
    pub max_connections: u32,

    /// Apply migrations at startup
    pub auto_migrate: bool,
}

impl DatabaseSettings {
    /// Pool configuration for `create_pool`
    pub fn pool_config(&self) -> DatabaseConfig {
        DatabaseConfig {
            url: self.url.clone(),
            max_connections: self.max_connections,
            min_connections: self.max_connections.min(2),
            ..Default::default()
        }
    }
}

/// Redis settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RedisSettings {
    pub host: String,
    pub port: u16,
}

/// Authentication settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct AuthConfig {
    /// HS256 secret
    pub jwt_secret: Option<String>,

    /// Privy app settings; present in Privy environments
    pub privy: Option<PrivySettings>,
}

/// Privy app settings
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PrivySettings {
    pub app_id: String,
    pub app_secret: String,
    pub verification_key: String,
    pub api_base: String,
}

/// How bearer tokens are verified
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum AuthMode {
    Privy,
    Jwt,
    Anonymous,
}

/// Agent engine selection
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "lowercase")]
pub enum EngineConfig {
    /// Deterministic echo replies
    Echo,

    /// OpenAI-compatible chat completions
    OpenAi {
        api_key: String,
        base_url: String,
        timeout_secs: u64,
    },
}

/// Log output format
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LogFormat {
    Text,
    Json,
}

impl FromStr for LogFormat {
    type Err = anyhow::Error;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_lowercase().as_str() {
            "text" => Ok(LogFormat::Text),
            "json" => Ok(LogFormat::Json),
            other => Err(anyhow!("Unknown LOG_FORMAT: {}", other)),
        }
    }
}

impl Config {
    /// Loads configuration from environment variables
    ///
    /// # Errors
    ///
    /// Returns an error if a value cannot be parsed or a required setting
    /// for the selected mode is missing.
    pub fn from_env() -> anyhow::Result<Self> {
        // Load .env file if present (for development)
        dotenvy::dotenv().ok();

        Self::from_lookup(|key| std::env::var(key).ok())
    }

    /// Loads configuration from a map, mainly for tests
    pub fn from_map(vars: &HashMap<String, String>) -> anyhow::Result<Self> {
        Self::from_lookup(|key| vars.get(key).cloned())
    }

    /// Loads configuration through an arbitrary lookup function
    pub fn from_lookup<F>(lookup: F) -> anyhow::Result<Self>
    where
        F: Fn(&str) -> Option<String>,
    {
        let get = |key: &str| lookup(key).map(|v| v.trim().to_string()).filter(|v| !v.is_empty());

        let api = ApiConfig {
            env: get("ENV").unwrap_or_else(|| "local".to_string()),
            release: get("RELEASE").unwrap_or_else(|| env!("CARGO_PKG_VERSION").to_string()),
            host: get("API_HOST").unwrap_or_else(|| "0.0.0.0".to_string()),
            port: parse_or(&get, "API_PORT", 8000)?,
            cors_origins: get("CORS_ORIGINS")
                .map(|v| {
                    v.split(',')
                        .map(|s| s.trim().to_string())
                        .filter(|s| !s.is_empty())
                        .collect()
                })
                .unwrap_or_else(|| vec!["*".to_string()]),
        };

        let database = load_database(&get)?;

        let redis = match get("REDIS_HOST") {
            Some(host) => Some(RedisSettings {
                host,
                port: parse_or(&get, "REDIS_PORT", 6379)?,
            }),
            None => None,
        };

        let jwt_secret = get("JWT_SECRET");

        let privy = if api.uses_privy() {
            let require = |key: &str| {
                get(key).ok_or_else(|| anyhow!("{} is required when ENV is {}", key, api.env))
            };
            Some(PrivySettings {
                app_id: require("PRIVY_APP_ID")?,
                app_secret: get("PRIVY_APP_SECRET")
                    .or_else(|| get("PRIVY_API_KEY"))
                    .ok_or_else(|| {
                        anyhow!("PRIVY_APP_SECRET is required when ENV is {}", api.env)
                    })?,
                verification_key: require("PRIVY_VERIFICATION_KEY")?,
                api_base: get("PRIVY_API_BASE")
                    .unwrap_or_else(|| DEFAULT_PRIVY_API_BASE.to_string()),
            })
        } else {
            None
        };

        let engine = load_engine(&get)?;

        let log_format = match get("LOG_FORMAT") {
            Some(v) => v.parse()?,
            None => LogFormat::Text,
        };

        Ok(Self {
            api,
            database,
            redis,
            auth: AuthConfig { jwt_secret, privy },
            engine,
            rate_limit_per_minute: parse_or(&get, "RATE_LIMIT_PER_MINUTE", 60)?,
            log_format,
        })
    }

    /// Selected token verification mode
    pub fn auth_mode(&self) -> AuthMode {
        if self.api.uses_privy() {
            AuthMode::Privy
        } else if self.auth.jwt_secret.is_some() {
            AuthMode::Jwt
        } else {
            AuthMode::Anonymous
        }
    }

    /// Returns the server bind address
    pub fn bind_address(&self) -> String {
        format!("{}:{}", self.api.host, self.api.port)
    }

    /// Whether a PostgreSQL database is configured
    pub fn uses_database(&self) -> bool {
        self.database.is_some()
    }

    /// Settings that load but should be logged as warnings
    ///
    /// Loading runs before the subscriber is installed, so `main` logs these.
    pub fn warnings(&self) -> Vec<String> {
        let mut warnings = Vec::new();

        if self.auth_mode() == AuthMode::Jwt {
            if let Some(secret) = &self.auth.jwt_secret {
                if secret.len() < MIN_JWT_SECRET_LEN {
                    warnings.push(format!(
                        "JWT_SECRET is shorter than {} bytes",
                        MIN_JWT_SECRET_LEN
                    ));
                }
            }
        }

        warnings
    }
}

fn parse_or<T, G>(get: &G, key: &str, default: T) -> anyhow::Result<T>
where
    T: FromStr,
    T::Err: std::error::Error + Send + Sync + 'static,
    G: Fn(&str) -> Option<String>,
{
    match get(key) {
        Some(v) => v
            .parse()
            .with_context(|| format!("Invalid value for {}: {}", key, v)),
        None => Ok(default),
    }
}

fn load_database<G>(get: &G) -> anyhow::Result<Option<DatabaseSettings>>
where
    G: Fn(&str) -> Option<String>,
{
    let url = match (get("DATABASE_URL"), get("DB_HOST")) {
        (Some(url), _) => url,
        (None, Some(host)) => DatabaseConfig::url_from_parts(
            &host,
            parse_or(get, "DB_PORT", 5432)?,
            &get("DB_USERNAME").unwrap_or_else(|| "postgres".to_string()),
            &get("DB_PASSWORD").unwrap_or_default(),
            &get("DB_NAME").unwrap_or_else(|| "nation".to_string()),
        ),
        (None, None) => return Ok(None),
    };

    Ok(Some(DatabaseSettings {
        url,
        max_connections: parse_or(get, "DB_POOL_SIZE", 10)?,
        auto_migrate: parse_or(get, "DB_AUTO_MIGRATE", true)?,
    }))
}

fn load_engine<G>(get: &G) -> anyhow::Result<EngineConfig>
where
    G: Fn(&str) -> Option<String>,
{
    let api_key = get("OPENAI_API_KEY");
    let default_kind = if api_key.is_some() { "openai" } else { "echo" };
    let kind = get("AGENT_ENGINE").unwrap_or_else(|| default_kind.to_string());

    match kind.to_ascii_lowercase().as_str() {
        "echo" => Ok(EngineConfig::Echo),
        "openai" => Ok(EngineConfig::OpenAi {
            api_key: api_key
                .ok_or_else(|| anyhow!("OPENAI_API_KEY is required when AGENT_ENGINE is openai"))?,
            base_url: get("OPENAI_BASE_URL").unwrap_or_else(|| DEFAULT_OPENAI_BASE_URL.to_string()),
            timeout_secs: parse_or(get, "OPENAI_TIMEOUT_SECS", 120)?,
        }),
        other => bail!("Unknown AGENT_ENGINE: {}", other),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn load(pairs: &[(&str, &str)]) -> anyhow::Result<Config> {
        let vars: HashMap<String, String> = pairs
            .iter()
            .map(|(k, v)| (k.to_string(), v.to_string()))
            .collect();
        Config::from_map(&vars)
    }

    #[test]
    fn test_defaults() {
        let config = load(&[]).unwrap();
        assert_eq!(config.api.env, "local");
        assert_eq!(config.bind_address(), "0.0.0.0:8000");
        assert_eq!(config.api.cors_origins, vec!["*"]);
        assert!(!config.uses_database());
        assert!(config.redis.is_none());
        assert_eq!(config.auth_mode(), AuthMode::Anonymous);
        assert!(matches!(config.engine, EngineConfig::Echo));
        assert_eq!(config.rate_limit_per_minute, 60);
        assert_eq!(config.log_format, LogFormat::Text);
    }

    #[test]
    fn test_bind_address() {
        let config = load(&[("API_HOST", "127.0.0.1"), ("API_PORT", "8080")]).unwrap();
        assert_eq!(config.bind_address(), "127.0.0.1:8080");
    }

    #[test]
    fn test_database_from_parts() {
        let config = load(&[
            ("DB_HOST", "db"),
            ("DB_PASSWORD", "pw"),
            ("DB_POOL_SIZE", "5"),
            ("DB_AUTO_MIGRATE", "false"),
        ])
        .unwrap();

        let database = config.database.unwrap();
        assert_eq!(database.url, "postgresql://postgres:pw@db:5432/nation");
        assert_eq!(database.max_connections, 5);
        assert!(!database.auto_migrate);
    }

    #[test]
    fn test_database_url_wins() {
        let config = load(&[
            ("DATABASE_URL", "postgresql://x@y/z"),
            ("DB_HOST", "ignored"),
        ])
        .unwrap();
        assert_eq!(config.database.unwrap().url, "postgresql://x@y/z");
    }

    #[test]
    fn test_empty_db_host_means_memory() {
        let config = load(&[("DB_HOST", "")]).unwrap();
        assert!(!config.uses_database());
    }

    #[test]
    fn test_jwt_mode() {
        let config = load(&[("JWT_SECRET", "short")]).unwrap();
        assert_eq!(config.auth_mode(), AuthMode::Jwt);
    }

    #[test]
    fn test_short_jwt_secret_warns() {
        let config = load(&[("JWT_SECRET", "short")]).unwrap();
        assert_eq!(config.warnings(), vec!["JWT_SECRET is shorter than 32 bytes"]);

        let config = load(&[("JWT_SECRET", "s".repeat(32).as_str())]).unwrap();
        assert!(config.warnings().is_empty());

        assert!(load(&[]).unwrap().warnings().is_empty());
    }

    #[test]
    fn test_privy_mode_requires_settings() {
        assert!(load(&[("ENV", "testnet-prod")]).is_err());

        let config = load(&[
            ("ENV", "testnet-dev"),
            ("JWT_SECRET", "ignored-in-privy-mode"),
            ("PRIVY_APP_ID", "app"),
            ("PRIVY_API_KEY", "secret"),
            ("PRIVY_VERIFICATION_KEY", "key"),
        ])
        .unwrap();

        assert_eq!(config.auth_mode(), AuthMode::Privy);
        let privy = config.auth.privy.unwrap();
        assert_eq!(privy.app_secret, "secret");
        assert_eq!(privy.api_base, DEFAULT_PRIVY_API_BASE);
        assert!(!config.api.is_production());
    }

    #[test]
    fn test_engine_selection() {
        let config = load(&[("OPENAI_API_KEY", "sk-test")]).unwrap();
        assert!(matches!(config.engine, EngineConfig::OpenAi { .. }));

        let config = load(&[("OPENAI_API_KEY", "sk-test"), ("AGENT_ENGINE", "echo")]).unwrap();
        assert!(matches!(config.engine, EngineConfig::Echo));

        assert!(load(&[("AGENT_ENGINE", "openai")]).is_err());
        assert!(load(&[("AGENT_ENGINE", "magic")]).is_err());
    }

    #[test]
    fn test_invalid_numbers() {
        assert!(load(&[("API_PORT", "eighty")]).is_err());
        assert!(load(&[("RATE_LIMIT_PER_MINUTE", "-1")]).is_err());
        assert!(load(&[("LOG_FORMAT", "xml")]).is_err());
    }

    #[test]
    fn test_cors_and_redis() {
        let config = load(&[
            ("CORS_ORIGINS", "https://a.example, https://b.example"),
            ("REDIS_HOST", "cache"),
        ])
        .unwrap();
        assert_eq!(
            config.api.cors_origins,
            vec!["https://a.example", "https://b.example"]
        );
        let redis = config.redis.unwrap();
        assert_eq!((redis.host.as_str(), redis.port), ("cache", 6379));
    }
}
