//! # Nation API Server
//!
//! HTTP API for creating agents, chatting with them and reading chat
//! history. Agent replies come from the configured agent engine.
//!
//! ## Usage
//!
//! ```bash
//! cargo run -p nation-api
//! ```

use anyhow::Context;
use nation_api::{
    app::{build_engine, build_router, build_verifier, AppState},
    config::{Config, LogFormat},
};
use nation_shared::{
    db::{
        migrations::{ensure_database_exists, get_migration_status, run_migrations},
        pool::{close_pool, create_pool},
    },
    engine::AgentRunner,
    redis::{RedisClient, RedisConfig},
    store::{MemoryStore, PostgresStore, Store},
};
use sqlx::PgPool;
use std::sync::Arc;
use tracing_subscriber::{layer::SubscriberExt, util::SubscriberInitExt, EnvFilter};

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    let config = Config::from_env()?;

    init_tracing(config.log_format);
    for warning in config.warnings() {
        tracing::warn!("{}", warning);
    }

    tracing::info!(
        env = %config.api.env,
        release = %config.api.release,
        "Nation API v{} starting...",
        env!("CARGO_PKG_VERSION")
    );

    let (store, pool) = open_store(&config).await?;

    let redis = match &config.redis {
        Some(settings) => {
            let client = RedisClient::new(RedisConfig::from_host(&settings.host, settings.port))
                .await
                .context("Failed to connect to Redis")?;
            Some(client)
        }
        None => None,
    };

    let verifier = build_verifier(&config)?;
    let engine = build_engine(&config)?;
    tracing::info!(
        auth = verifier.mode(),
        engine = engine.name(),
        store = store.backend(),
        rate_limit_per_minute = config.rate_limit_per_minute,
        "Services initialized"
    );

    let runner = AgentRunner::new(store.clone(), engine);
    let bind_address = config.bind_address();
    let state = AppState::new(store, runner, verifier, redis, config);
    let app = build_router(state);

    let listener = tokio::net::TcpListener::bind(&bind_address)
        .await
        .with_context(|| format!("Failed to bind {}", bind_address))?;

    tracing::info!("API server start, listening on http://{}", bind_address);

    axum::serve(listener, app)
        .with_graceful_shutdown(shutdown_signal())
        .await?;

    tracing::info!("Cleaning up and shutdown...");
    if let Some(pool) = pool {
        close_pool(pool).await;
    }

    Ok(())
}

fn init_tracing(format: LogFormat) {
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| "nation_api=debug,nation_shared=debug,tower_http=info".into());

    let registry = tracing_subscriber::registry().with(filter);
    match format {
        LogFormat::Text => registry.with(tracing_subscriber::fmt::layer()).init(),
        LogFormat::Json => registry
            .with(tracing_subscriber::fmt::layer().json())
            .init(),
    }
}

/// Opens PostgreSQL when configured, otherwise the in-memory store
async fn open_store(config: &Config) -> anyhow::Result<(Arc<dyn Store>, Option<PgPool>)> {
    let Some(settings) = &config.database else {
        tracing::warn!("No database configured, data is kept in memory only");
        return Ok((Arc::new(MemoryStore::new()), None));
    };

    // Local and dev databases are created on first start
    if settings.auto_migrate && !config.api.is_production() {
        ensure_database_exists(&settings.url)
            .await
            .context("Failed to create database")?;
    }

    let pool = create_pool(settings.pool_config())
        .await
        .context("Failed to connect to PostgreSQL")?;

    if settings.auto_migrate {
        run_migrations(&pool)
            .await
            .context("Failed to run database migrations")?;
    }

    let status = get_migration_status(&pool)
        .await
        .context("Failed to read migration status")?;
    tracing::info!(
        applied = status.applied_migrations,
        latest = ?status.latest_version,
        "Database schema ready"
    );

    Ok((Arc::new(PostgresStore::new(pool.clone())), Some(pool)))
}

async fn shutdown_signal() {
    let ctrl_c = async {
        if let Err(e) = tokio::signal::ctrl_c().await {
            tracing::error!(error = %e, "Failed to listen for Ctrl-C");
        }
    };

    #[cfg(unix)]
    let terminate = async {
        match tokio::signal::unix::signal(tokio::signal::unix::SignalKind::terminate()) {
            Ok(mut signal) => {
                signal.recv().await;
            }
            Err(e) => {
                tracing::error!(error = %e, "Failed to listen for SIGTERM");
                std::future::pending::<()>().await;
            }
        }
    };

    #[cfg(not(unix))]
    let terminate = std::future::pending::<()>();

    tokio::select! {
        _ = ctrl_c => {},
        _ = terminate => {},
    }

    tracing::info!("Shutdown signal received");
}
