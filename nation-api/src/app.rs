/// Application state and router builder
///
/// This module defines the shared application state and provides
/// a function to build the Axum router with all routes and middleware.
///
/// # Example
///
/// ```no_run
/// use nation_api::{app::AppState, config::Config};
/// use nation_shared::auth::verifier::TokenVerifier;
/// use nation_shared::engine::{AgentRunner, EchoEngine};
/// use nation_shared::store::{MemoryStore, Store};
/// use std::sync::Arc;
///
/// # fn example() -> anyhow::Result<()> {
/// let config = Config::from_env()?;
/// let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
/// let runner = AgentRunner::new(store.clone(), Arc::new(EchoEngine::new()));
/// let state = AppState::new(store, runner, TokenVerifier::Anonymous, None, config);
/// let app = nation_api::app::build_router(state);
/// # Ok(())
/// # }
/// ```

use crate::{
    config::{AuthMode, Config, EngineConfig},
    middleware::{
        rate_limit::{rate_limit_layer, RateLimiter},
        security::SecurityHeadersLayer,
    },
};
use axum::{
    http::{header, HeaderValue, Method},
    middleware::from_fn_with_state,
    routing::{get, patch, post},
    Router,
};
use nation_shared::{
    auth::{
        middleware::require_auth,
        privy::{PrivyClient, PrivyConfig},
        verifier::TokenVerifier,
    },
    engine::{AgentEngine, AgentRunner, EchoEngine, OpenAiConfig, OpenAiEngine},
    redis::RedisClient,
    store::Store,
};
use std::sync::Arc;
use tower_http::{
    cors::CorsLayer,
    trace::{DefaultMakeSpan, DefaultOnResponse, TraceLayer},
};
use tracing::Level;

/// Shared application state
///
/// This is cloned for each request handler via Axum's `State` extractor.
/// Uses Arc internally for cheap cloning.
#[derive(Clone)]
pub struct AppState {
    /// Persistence backend
    pub store: Arc<dyn Store>,

    /// Runs the agent engine and stores its replies
    pub runner: AgentRunner,

    /// Bearer token verification
    pub verifier: TokenVerifier,

    /// Redis client, when configured
    pub redis: Option<RedisClient>,

    /// Per-user write budget
    pub rate_limiter: Arc<RateLimiter>,

    /// Application configuration
    pub config: Arc<Config>,
}

impl AppState {
    /// Creates new application state
    ///
    /// Rate limit buckets live in Redis when a client is given.
    pub fn new(
        store: Arc<dyn Store>,
        runner: AgentRunner,
        verifier: TokenVerifier,
        redis: Option<RedisClient>,
        config: Config,
    ) -> Self {
        let per_minute = config.rate_limit_per_minute;
        let rate_limiter = match &redis {
            Some(client) => RateLimiter::redis(per_minute, client.clone()),
            None => RateLimiter::in_memory(per_minute),
        };

        Self {
            store,
            runner,
            verifier,
            redis,
            rate_limiter: Arc::new(rate_limiter),
            config: Arc::new(config),
        }
    }
}

/// Builds the complete Axum router with all routes and middleware
///
/// # Architecture
///
/// ```text
/// /
/// ├── GET    /health                                        (public)
/// ├── POST   /agents
/// ├── GET    /agents/:aid
/// ├── GET    /agents/:aid/chats
/// ├── POST   /agents/:aid/chats
/// ├── GET    /agents/:aid/chats/:chat_id
/// ├── PATCH  /agents/:aid/chats/:chat_id
/// ├── DELETE /agents/:aid/chats/:chat_id
/// ├── GET    /agents/:aid/chats/:chat_id/messages
/// ├── POST   /agents/:aid/chats/:chat_id/messages
/// ├── POST   /agents/:aid/chats/:chat_id/messages/retry
/// └── GET    /messages/:message_id
/// ```
///
/// # Middleware Stack
///
/// Applied in order (outermost first):
/// 1. Security headers
/// 2. CORS (tower-http CorsLayer)
/// 3. Logging (tower-http TraceLayer)
/// 4. Authentication (everything but `/health`)
/// 5. Rate limiting (write routes only)
pub fn build_router(state: AppState) -> Router {
    use crate::routes::{agents, chats, health, messages};

    // Health check (public, no auth)
    let health_routes = Router::new().route("/health", get(health::health_check));

    let read_routes = Router::new()
        .route("/agents/:aid", get(agents::get_agent))
        .route("/agents/:aid/chats", get(chats::list_chats))
        .route("/agents/:aid/chats/:chat_id", get(chats::get_chat))
        .route(
            "/agents/:aid/chats/:chat_id/messages",
            get(messages::list_messages),
        )
        .route("/messages/:message_id", get(messages::get_message));

    let write_routes = Router::new()
        .route("/agents", post(agents::create_agent))
        .route("/agents/:aid/chats", post(chats::create_chat))
        .route(
            "/agents/:aid/chats/:chat_id",
            patch(chats::update_chat).delete(chats::delete_chat),
        )
        .route(
            "/agents/:aid/chats/:chat_id/messages",
            post(messages::send_message),
        )
        .route(
            "/agents/:aid/chats/:chat_id/messages/retry",
            post(messages::retry_message),
        )
        .route_layer(from_fn_with_state(state.clone(), rate_limit_layer));

    let protected_routes = read_routes
        .merge(write_routes)
        .route_layer(from_fn_with_state(state.verifier.clone(), require_auth));

    // Configure CORS based on environment
    let cors = if state.config.api.cors_origins.iter().any(|o| o == "*") {
        CorsLayer::permissive()
    } else {
        let origins: Vec<HeaderValue> = state
            .config
            .api
            .cors_origins
            .iter()
            .filter_map(|origin| origin.parse().ok())
            .collect();

        CorsLayer::new()
            .allow_origin(origins)
            .allow_methods([
                Method::GET,
                Method::POST,
                Method::PATCH,
                Method::DELETE,
                Method::OPTIONS,
            ])
            .allow_headers([header::AUTHORIZATION, header::CONTENT_TYPE])
            .allow_credentials(true)
            .max_age(std::time::Duration::from_secs(3600))
    };

    let production = state.config.api.is_production();

    Router::new()
        .merge(health_routes)
        .merge(protected_routes)
        .layer(
            TraceLayer::new_for_http()
                .make_span_with(DefaultMakeSpan::new().level(Level::INFO))
                .on_response(DefaultOnResponse::new().level(Level::INFO)),
        )
        .layer(cors)
        .layer(SecurityHeadersLayer::new(production))
        .with_state(state)
}

/// Picks the token verifier for the configured auth mode
///
/// # Errors
///
/// Returns an error if the Privy verification key is not a valid EC PEM.
pub fn build_verifier(config: &Config) -> anyhow::Result<TokenVerifier> {
    let verifier = match config.auth_mode() {
        AuthMode::Privy => {
            let settings = config
                .auth
                .privy
                .as_ref()
                .ok_or_else(|| anyhow::anyhow!("Privy settings are missing"))?;
            let client = PrivyClient::new(PrivyConfig {
                app_id: settings.app_id.clone(),
                app_secret: settings.app_secret.clone(),
                verification_key: settings.verification_key.clone(),
                api_base: settings.api_base.clone(),
            })?;
            TokenVerifier::Privy(Arc::new(client))
        }
        AuthMode::Jwt => TokenVerifier::Jwt {
            secret: config.auth.jwt_secret.clone().unwrap_or_default(),
        },
        AuthMode::Anonymous => TokenVerifier::Anonymous,
    };

    Ok(verifier)
}

/// Instantiates the configured agent engine
///
/// # Errors
///
/// Returns an error if the HTTP client for the OpenAI engine cannot be built.
pub fn build_engine(config: &Config) -> anyhow::Result<Arc<dyn AgentEngine>> {
    let engine: Arc<dyn AgentEngine> = match &config.engine {
        EngineConfig::Echo => Arc::new(EchoEngine::new()),
        EngineConfig::OpenAi {
            api_key,
            base_url,
            timeout_secs,
        } => Arc::new(OpenAiEngine::new(OpenAiConfig {
            api_key: api_key.clone(),
            base_url: base_url.clone(),
            timeout: std::time::Duration::from_secs(*timeout_secs),
        })?),
    };

    Ok(engine)
}
