/// Common test utilities for integration tests
///
/// This module provides shared infrastructure for integration tests:
/// - Router over the in-memory store and the echo engine
/// - JWT token generation for any user id
/// - Request and response helpers

use axum::body::Body;
use axum::http::{Request, StatusCode};
use axum::response::Response;
use nation_api::app::{build_router, AppState};
use nation_api::config::Config;
use nation_shared::auth::jwt::{create_token, Claims};
use nation_shared::auth::verifier::TokenVerifier;
use nation_shared::engine::{AgentEngine, AgentRunner, EchoEngine};
use nation_shared::store::{MemoryStore, Store};
use serde_json::{json, Value};
use std::collections::HashMap;
use std::sync::Arc;
use tower::Service as _;

pub const JWT_SECRET: &str = "integration-test-secret-key-32-bytes!";

/// Default test user
pub const USER: &str = "did:privy:alice";

/// Test context containing all necessary resources
pub struct TestContext {
    pub store: Arc<dyn Store>,
    pub app: axum::Router,
    pub config: Config,
}

impl TestContext {
    /// Creates a context with the echo engine and a generous rate limit
    pub fn new() -> Self {
        Self::build(Arc::new(EchoEngine::new()), 1000)
    }

    /// Creates a context with a custom write budget
    pub fn with_rate_limit(per_minute: u32) -> Self {
        Self::build(Arc::new(EchoEngine::new()), per_minute)
    }

    /// Creates a context with a custom engine
    pub fn with_engine(engine: Arc<dyn AgentEngine>) -> Self {
        Self::build(engine, 1000)
    }

    fn build(engine: Arc<dyn AgentEngine>, per_minute: u32) -> Self {
        let vars: HashMap<String, String> = [
            ("JWT_SECRET", JWT_SECRET.to_string()),
            ("RATE_LIMIT_PER_MINUTE", per_minute.to_string()),
            ("RELEASE", "test-release".to_string()),
        ]
        .into_iter()
        .map(|(k, v)| (k.to_string(), v))
        .collect();
        let config = Config::from_map(&vars).expect("test config");

        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let runner = AgentRunner::new(store.clone(), engine);
        let verifier = TokenVerifier::Jwt {
            secret: JWT_SECRET.to_string(),
        };

        let state = AppState::new(store.clone(), runner, verifier, None, config.clone());
        let app = build_router(state);

        TestContext { store, app, config }
    }

    /// Returns authorization header value for a user
    pub fn auth_header(&self, user_id: &str) -> String {
        let token = create_token(&Claims::new(user_id), JWT_SECRET).expect("token");
        format!("Bearer {}", token)
    }

    /// Sends a request as `user_id` (no Authorization header when `None`)
    pub async fn request(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
    ) -> Response {
        let mut builder = Request::builder().method(method).uri(uri);
        if let Some(user_id) = user_id {
            builder = builder.header("authorization", self.auth_header(user_id));
        }

        let body = match body {
            Some(json) => {
                builder = builder.header("content-type", "application/json");
                Body::from(json.to_string())
            }
            None => Body::empty(),
        };

        self.app
            .clone()
            .call(builder.body(body).unwrap())
            .await
            .unwrap()
    }

    /// Sends a request and parses a JSON body, asserting the status
    pub async fn json(
        &self,
        method: &str,
        uri: &str,
        user_id: Option<&str>,
        body: Option<Value>,
        expected: StatusCode,
    ) -> Value {
        let response = self.request(method, uri, user_id, body).await;
        let status = response.status();
        let text = body_text(response).await;
        assert_eq!(status, expected, "unexpected status, body: {}", text);

        if text.is_empty() {
            Value::Null
        } else {
            serde_json::from_str(&text).unwrap()
        }
    }

    /// Creates an agent owned by `user_id` and returns its id
    pub async fn create_agent(&self, user_id: &str, name: &str) -> String {
        let agent = self
            .json(
                "POST",
                "/agents",
                Some(user_id),
                Some(json!({ "name": name })),
                StatusCode::OK,
            )
            .await;
        agent["id"].as_str().unwrap().to_string()
    }

    /// Opens a chat with `agent_id` as `user_id` and returns its id
    pub async fn create_chat(&self, user_id: &str, agent_id: &str) -> String {
        let chat = self
            .json(
                "POST",
                &format!("/agents/{}/chats", agent_id),
                Some(user_id),
                None,
                StatusCode::OK,
            )
            .await;
        chat["id"].as_str().unwrap().to_string()
    }

    /// Sends a non-streaming message and returns the replies
    pub async fn send(&self, user_id: &str, agent_id: &str, chat_id: &str, text: &str) -> Value {
        self.json(
            "POST",
            &format!("/agents/{}/chats/{}/messages", agent_id, chat_id),
            Some(user_id),
            Some(json!({ "user_id": user_id, "message": text })),
            StatusCode::OK,
        )
        .await
    }
}

/// Reads the whole response body as text
pub async fn body_text(response: Response) -> String {
    let bytes = axum::body::to_bytes(response.into_body(), usize::MAX)
        .await
        .unwrap();
    String::from_utf8_lossy(&bytes).into_owned()
}
