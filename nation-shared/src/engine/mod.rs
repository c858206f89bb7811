/// Agent engines
///
/// An engine turns one user message into zero or more replies. Engines never
/// touch storage: they emit [`EngineReply`] values over the context channel
/// and the [`AgentRunner`] persists and forwards them.
///
/// # Engines
///
/// - [`EchoEngine`]: Deterministic replies for local development and tests
/// - [`OpenAiEngine`]: OpenAI-compatible chat completions
///
/// # Contract
///
/// ```text
/// AgentEngine::run(context)
///   ├─> emit(reply) for each assistant or skill message
///   ├─> return Ok(()) when done or when cancellation is observed
///   └─> return Err(..) on failure; the runner records a system message
/// ```
///
/// # Example
///
/// ```no_run
/// use async_trait::async_trait;
/// use nation_shared::engine::{AgentEngine, EngineContext, EngineReply, EngineResult};
///
/// struct Shouter;
///
/// #[async_trait]
/// impl AgentEngine for Shouter {
///     fn name(&self) -> &str {
///         "shouter"
///     }
///
///     async fn run(&self, context: EngineContext) -> EngineResult<()> {
///         if context.is_cancelled() {
///             return Ok(());
///         }
///         let text = context.message.message.to_uppercase();
///         context.emit(EngineReply::assistant(text)).await
///     }
/// }
/// ```

pub mod echo;
pub mod openai;
pub mod runner;

pub use echo::EchoEngine;
pub use openai::{OpenAiConfig, OpenAiEngine};
pub use runner::{AgentRunner, ReplyStream, RunnerError};

use crate::models::{Agent, AuthorType, ChatMessage};
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;

/// Engine error types
#[derive(Debug, thiserror::Error)]
pub enum EngineError {
    /// Upstream model provider rejected or failed the request
    #[error("Provider error: {0}")]
    Provider(String),

    /// Provider answered with something we could not use
    #[error("Invalid provider response: {0}")]
    InvalidResponse(String),

    /// Reply channel closed
    #[error("Failed to emit reply: {0}")]
    EmitFailed(String),

    /// Internal engine error
    #[error("Internal error: {0}")]
    Internal(String),
}

/// Engine result type alias
pub type EngineResult<T> = Result<T, EngineError>;

/// One message produced by an engine
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct EngineReply {
    /// `Assistant` for text replies, `Skill` for tool output
    pub author_type: AuthorType,

    pub message: String,

    /// Model that produced the reply
    pub model: Option<String>,

    /// Tool invocations behind this reply
    pub skill_calls: Option<JsonValue>,

    pub input_tokens: i32,
    pub output_tokens: i32,
}

impl EngineReply {
    fn new(author_type: AuthorType, message: impl Into<String>) -> Self {
        Self {
            author_type,
            message: message.into(),
            model: None,
            skill_calls: None,
            input_tokens: 0,
            output_tokens: 0,
        }
    }

    /// Creates an assistant reply
    pub fn assistant(message: impl Into<String>) -> Self {
        Self::new(AuthorType::Assistant, message)
    }

    /// Creates a skill reply carrying the calls that produced it
    pub fn skill(message: impl Into<String>, skill_calls: JsonValue) -> Self {
        let mut reply = Self::new(AuthorType::Skill, message);
        reply.skill_calls = Some(skill_calls);
        reply
    }

    /// Sets the model name
    pub fn with_model(mut self, model: impl Into<String>) -> Self {
        self.model = Some(model.into());
        self
    }

    /// Sets token usage
    pub fn with_usage(mut self, input_tokens: i32, output_tokens: i32) -> Self {
        self.input_tokens = input_tokens;
        self.output_tokens = output_tokens;
        self
    }
}

/// Engine execution context
///
/// Carries the agent, the stored user message and recent history, plus the
/// reply channel and the cancellation token.
pub struct EngineContext {
    /// Agent answering the message
    pub agent: Agent,

    /// User message being answered (already persisted)
    pub message: ChatMessage,

    /// Earlier messages of the chat, oldest first
    pub history: Vec<ChatMessage>,

    reply_tx: mpsc::UnboundedSender<EngineReply>,

    /// Cancellation token
    pub cancel_token: CancellationToken,
}

impl EngineContext {
    /// Creates a new engine context
    pub fn new(
        agent: Agent,
        message: ChatMessage,
        history: Vec<ChatMessage>,
        reply_tx: mpsc::UnboundedSender<EngineReply>,
        cancel_token: CancellationToken,
    ) -> Self {
        Self {
            agent,
            message,
            history,
            reply_tx,
            cancel_token,
        }
    }

    /// Emits a reply
    ///
    /// # Errors
    ///
    /// Returns error if the receiving side is gone
    pub async fn emit(&self, reply: EngineReply) -> EngineResult<()> {
        self.reply_tx
            .send(reply)
            .map_err(|_| EngineError::EmitFailed("Reply channel closed".to_string()))
    }

    /// Checks if cancellation was requested
    pub fn is_cancelled(&self) -> bool {
        self.cancel_token.is_cancelled()
    }

    /// Waits for cancellation
    pub async fn cancelled(&self) {
        self.cancel_token.cancelled().await
    }
}

/// Core engine trait
#[async_trait]
pub trait AgentEngine: Send + Sync {
    /// Returns the engine name for logs
    fn name(&self) -> &str;

    /// Answers `context.message`
    ///
    /// Implementations should return `Ok(())` as soon as they notice
    /// cancellation.
    async fn run(&self, context: EngineContext) -> EngineResult<()>;
}

/// Counts whitespace separated words
///
/// Used as a token estimate by engines that get no usage data back.
pub fn estimate_tokens(text: &str) -> i32 {
    text.split_whitespace().count().min(i32::MAX as usize) as i32
}

#[cfg(test)]
pub(crate) mod test_support {
    use crate::models::{Agent, ChatMessage, CreateChatMessage, DEFAULT_AGENT_MODEL};
    use chrono::Utc;

    pub fn agent(name: &str) -> Agent {
        let now = Utc::now();
        Agent {
            id: "agent-1".to_string(),
            name: name.to_string(),
            description: None,
            owner: "user-1".to_string(),
            model: DEFAULT_AGENT_MODEL.to_string(),
            prompt: Some("Be brief.".to_string()),
            temperature: Some(0.2),
            created_at: now,
            updated_at: now,
        }
    }

    pub fn user_message(text: &str) -> ChatMessage {
        CreateChatMessage::from_user("agent-1", "chat-1", "user-1", text)
            .into_message(crate::ids::new_id(), Utc::now())
    }
}
