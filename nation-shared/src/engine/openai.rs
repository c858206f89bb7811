/// OpenAI-compatible chat completions engine
///
/// Sends the agent prompt as the system message, the chat history and the
/// new user message to `{base_url}/chat/completions` and emits the first
/// choice as an assistant reply. Any OpenAI-compatible endpoint works.

use super::{AgentEngine, EngineContext, EngineError, EngineReply, EngineResult};
use crate::models::{AuthorType, ChatMessage};
use async_trait::async_trait;
use reqwest::Client;
use serde::{Deserialize, Serialize};
use std::time::Duration;
use tracing::{debug, warn};

/// Default API endpoint
pub const DEFAULT_OPENAI_BASE_URL: &str = "https://api.openai.com/v1";

/// OpenAI engine settings
#[derive(Debug, Clone)]
pub struct OpenAiConfig {
    pub api_key: String,
    pub base_url: String,
    pub timeout: Duration,
}

impl OpenAiConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            base_url: DEFAULT_OPENAI_BASE_URL.to_string(),
            timeout: Duration::from_secs(120),
        }
    }
}

/// Engine backed by the chat completions API
#[derive(Clone)]
pub struct OpenAiEngine {
    config: OpenAiConfig,
    client: Client,
}

impl OpenAiEngine {
    pub fn new(config: OpenAiConfig) -> EngineResult<Self> {
        let client = Client::builder()
            .timeout(config.timeout)
            .build()
            .map_err(|e| EngineError::Internal(format!("Failed to create HTTP client: {}", e)))?;

        Ok(Self { config, client })
    }

    async fn complete(&self, request: &OpenAiRequest) -> EngineResult<OpenAiResponse> {
        let url = format!("{}/chat/completions", self.config.base_url.trim_end_matches('/'));

        let response = self
            .client
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .json(request)
            .send()
            .await
            .map_err(|e| EngineError::Provider(e.to_string()))?;

        if !response.status().is_success() {
            let status = response.status();
            let error_text = response.text().await.unwrap_or_default();
            warn!(status = %status, "OpenAI request failed");
            return Err(EngineError::Provider(format!(
                "OpenAI API error {}: {}",
                status, error_text
            )));
        }

        response
            .json()
            .await
            .map_err(|e| EngineError::InvalidResponse(e.to_string()))
    }
}

/// Builds the request body for one user message
fn build_request(context: &EngineContext) -> OpenAiRequest {
    let mut messages = Vec::with_capacity(context.history.len() + 2);

    if let Some(prompt) = context.agent.prompt.as_deref().filter(|p| !p.is_empty()) {
        messages.push(OpenAiMessage::new("system", prompt));
    }

    messages.extend(context.history.iter().filter_map(history_message));
    messages.push(OpenAiMessage::new("user", &context.message.message));

    OpenAiRequest {
        model: context.agent.model.clone(),
        messages,
        temperature: context.agent.temperature,
        stream: false,
    }
}

/// Skill and system messages are not replayed to the model
fn history_message(message: &ChatMessage) -> Option<OpenAiMessage> {
    let role = match message.author_type {
        AuthorType::User => "user",
        AuthorType::Assistant => "assistant",
        AuthorType::Skill | AuthorType::System => return None,
    };
    Some(OpenAiMessage::new(role, &message.message))
}

#[async_trait]
impl AgentEngine for OpenAiEngine {
    fn name(&self) -> &str {
        "openai"
    }

    async fn run(&self, context: EngineContext) -> EngineResult<()> {
        let request = build_request(&context);
        debug!(
            agent_id = %context.agent.id,
            model = %request.model,
            messages = request.messages.len(),
            "Calling chat completions"
        );

        let response = tokio::select! {
            _ = context.cancelled() => return Ok(()),
            response = self.complete(&request) => response?,
        };

        let choice = response
            .choices
            .into_iter()
            .next()
            .ok_or_else(|| EngineError::InvalidResponse("response has no choices".to_string()))?;

        let mut reply = EngineReply::assistant(choice.message.content.unwrap_or_default())
            .with_model(response.model);

        if let Some(usage) = response.usage {
            reply = reply.with_usage(usage.prompt_tokens, usage.completion_tokens);
        }

        context.emit(reply).await
    }
}

#[derive(Debug, Serialize)]
struct OpenAiRequest {
    model: String,
    messages: Vec<OpenAiMessage>,
    #[serde(skip_serializing_if = "Option::is_none")]
    temperature: Option<f32>,
    stream: bool,
}

#[derive(Debug, Serialize, Deserialize)]
struct OpenAiMessage {
    role: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    content: Option<String>,
}

impl OpenAiMessage {
    fn new(role: &str, content: &str) -> Self {
        Self {
            role: role.to_string(),
            content: Some(content.to_string()),
        }
    }
}

#[derive(Debug, Deserialize)]
struct OpenAiResponse {
    model: String,
    choices: Vec<OpenAiChoice>,
    usage: Option<OpenAiUsage>,
}

#[derive(Debug, Deserialize)]
struct OpenAiChoice {
    message: OpenAiMessage,
}

#[derive(Debug, Deserialize)]
struct OpenAiUsage {
    prompt_tokens: i32,
    completion_tokens: i32,
}
