/// Agent runner
///
/// Drives an engine for one stored user message and persists its replies.
///
/// # Flow
///
/// ```text
/// stream(user_message)
///   ├─> load agent and recent history
///   ├─> spawn engine.run(context)
///   ├─> for each emitted reply: persist (reply_to = user message) and yield
///   └─> on engine error: persist and yield one system message
/// ```
///
/// Dropping the stream before it ends cancels the engine through a
/// `CancellationToken` drop guard.

use super::{AgentEngine, EngineContext, EngineReply};
use crate::models::{Agent, AuthorType, ChatMessage, CreateChatMessage};
use crate::store::{Store, StoreError};
use futures::{Stream, StreamExt};
use std::pin::Pin;
use std::sync::Arc;
use std::time::Instant;
use tokio::sync::mpsc;
use tokio_util::sync::CancellationToken;
use tracing::{debug, warn};

/// Number of earlier messages handed to the engine
pub const DEFAULT_HISTORY_LIMIT: usize = 20;

/// Error type for the runner
#[derive(Debug, thiserror::Error)]
pub enum RunnerError {
    /// Storage failed
    #[error(transparent)]
    Store(#[from] StoreError),

    /// The message references an agent that does not exist
    #[error("Agent {0} not found")]
    AgentNotFound(String),
}

/// Stream of persisted replies
pub type ReplyStream = Pin<Box<dyn Stream<Item = Result<ChatMessage, RunnerError>> + Send>>;

/// Runs engines and records what they say
#[derive(Clone)]
pub struct AgentRunner {
    store: Arc<dyn Store>,
    engine: Arc<dyn AgentEngine>,
    history_limit: usize,
}

impl AgentRunner {
    pub fn new(store: Arc<dyn Store>, engine: Arc<dyn AgentEngine>) -> Self {
        Self {
            store,
            engine,
            history_limit: DEFAULT_HISTORY_LIMIT,
        }
    }

    /// Overrides how many earlier messages the engine sees
    pub fn with_history_limit(mut self, history_limit: usize) -> Self {
        self.history_limit = history_limit;
        self
    }

    /// Name of the configured engine
    pub fn engine_name(&self) -> &str {
        self.engine.name()
    }

    /// Streams replies to a stored user message as they are persisted
    pub fn stream(&self, user_message: ChatMessage) -> ReplyStream {
        let store = self.store.clone();
        let engine = self.engine.clone();
        let history_limit = self.history_limit;

        let replies = async_stream::try_stream! {
            let agent = store
                .get_agent(&user_message.agent_id)
                .await?
                .ok_or_else(|| RunnerError::AgentNotFound(user_message.agent_id.clone()))?;

            let history = load_history(store.as_ref(), &user_message, history_limit).await?;

            let (reply_tx, mut reply_rx) = mpsc::unbounded_channel();
            let cancel_token = CancellationToken::new();
            let _cancel_on_drop = cancel_token.clone().drop_guard();

            let context = EngineContext::new(
                agent.clone(),
                user_message.clone(),
                history,
                reply_tx,
                cancel_token,
            );

            debug!(
                agent_id = %agent.id,
                chat_id = %user_message.chat_id,
                engine = engine.name(),
                "Starting engine"
            );
            let engine_task = tokio::spawn(async move { engine.run(context).await });

            let mut last = Instant::now();
            while let Some(reply) = reply_rx.recv().await {
                let time_cost = last.elapsed().as_secs_f64();
                let stored = store
                    .create_message(reply_message(&agent, &user_message, reply, time_cost))
                    .await?;
                last = Instant::now();
                yield stored;
            }

            let failure = match engine_task.await {
                Ok(Ok(())) => None,
                Ok(Err(e)) => Some(e.to_string()),
                Err(e) => Some(format!("Engine task failed: {}", e)),
            };

            if let Some(error) = failure {
                warn!(
                    agent_id = %agent.id,
                    chat_id = %user_message.chat_id,
                    error = %error,
                    "Engine failed"
                );
                let time_cost = last.elapsed().as_secs_f64();
                let stored = store
                    .create_message(system_message(&agent, &user_message, error, time_cost))
                    .await?;
                yield stored;
            }
        };

        Box::pin(replies)
    }

    /// Runs the engine to completion and returns every reply
    pub async fn execute(&self, user_message: ChatMessage) -> Result<Vec<ChatMessage>, RunnerError> {
        let mut stream = self.stream(user_message);
        let mut replies = Vec::new();
        while let Some(reply) = stream.next().await {
            replies.push(reply?);
        }
        Ok(replies)
    }
}

/// Recent messages before `user_message`, oldest first
async fn load_history(
    store: &dyn Store,
    user_message: &ChatMessage,
    limit: usize,
) -> Result<Vec<ChatMessage>, StoreError> {
    if limit == 0 {
        return Ok(Vec::new());
    }

    let mut history = store
        .recent_messages(&user_message.agent_id, &user_message.chat_id, limit + 1)
        .await?;
    history.retain(|m| m.id != user_message.id);

    if history.len() > limit {
        history.drain(..history.len() - limit);
    }
    Ok(history)
}

fn reply_message(
    agent: &Agent,
    user_message: &ChatMessage,
    reply: EngineReply,
    time_cost: f64,
) -> CreateChatMessage {
    CreateChatMessage {
        agent_id: agent.id.clone(),
        chat_id: user_message.chat_id.clone(),
        user_id: user_message.user_id.clone(),
        author_id: agent.id.clone(),
        author_type: reply.author_type,
        thread_type: user_message.thread_type.clone(),
        message: reply.message,
        attachments: None,
        model: reply.model.or_else(|| Some(agent.model.clone())),
        reply_to: Some(user_message.id.clone()),
        skill_calls: reply.skill_calls,
        input_tokens: reply.input_tokens,
        output_tokens: reply.output_tokens,
        time_cost,
        app_id: user_message.app_id.clone(),
        search_mode: user_message.search_mode,
        super_mode: user_message.super_mode,
    }
}

fn system_message(
    agent: &Agent,
    user_message: &ChatMessage,
    error: String,
    time_cost: f64,
) -> CreateChatMessage {
    let mut message = reply_message(agent, user_message, EngineReply::assistant(error), time_cost);
    message.author_type = AuthorType::System;
    message.model = None;
    message
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::{EchoEngine, EngineError, EngineResult};
    use crate::models::{CreateAgent, CreateChat, DEFAULT_AGENT_MODEL};
    use crate::store::MemoryStore;
    use async_trait::async_trait;
    use std::sync::atomic::{AtomicBool, Ordering};
    use std::time::Duration;

    struct FailingEngine;

    #[async_trait]
    impl AgentEngine for FailingEngine {
        fn name(&self) -> &str {
            "failing"
        }

        async fn run(&self, context: EngineContext) -> EngineResult<()> {
            context.emit(EngineReply::assistant("thinking")).await?;
            Err(EngineError::Provider("model unavailable".to_string()))
        }
    }

    /// Emits one reply then waits for cancellation
    struct HangingEngine {
        cancelled: Arc<AtomicBool>,
    }

    #[async_trait]
    impl AgentEngine for HangingEngine {
        fn name(&self) -> &str {
            "hanging"
        }

        async fn run(&self, context: EngineContext) -> EngineResult<()> {
            context.emit(EngineReply::assistant("first")).await?;
            context.cancelled().await;
            self.cancelled.store(true, Ordering::SeqCst);
            Ok(())
        }
    }

    /// Reports how much history it was given
    struct HistoryEngine;

    #[async_trait]
    impl AgentEngine for HistoryEngine {
        fn name(&self) -> &str {
            "history"
        }

        async fn run(&self, context: EngineContext) -> EngineResult<()> {
            let seen: Vec<&str> = context.history.iter().map(|m| m.message.as_str()).collect();
            context.emit(EngineReply::assistant(seen.join(","))).await
        }
    }

    async fn setup() -> (Arc<dyn Store>, ChatMessage) {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let agent = store
            .create_agent(CreateAgent {
                name: "Helper".to_string(),
                description: None,
                owner: "u1".to_string(),
                model: DEFAULT_AGENT_MODEL.to_string(),
                prompt: None,
                temperature: None,
            })
            .await
            .unwrap();
        let chat = store
            .create_chat(CreateChat {
                agent_id: agent.id.clone(),
                user_id: "u1".to_string(),
            })
            .await
            .unwrap();
        let message = store
            .create_message(CreateChatMessage::from_user(&agent.id, &chat.id, "u1", "hello there"))
            .await
            .unwrap();
        (store, message)
    }

    #[tokio::test]
    async fn test_execute_persists_replies() {
        let (store, user_message) = setup().await;
        let runner = AgentRunner::new(store.clone(), Arc::new(EchoEngine::new()));

        let replies = runner.execute(user_message.clone()).await.unwrap();
        assert_eq!(replies.len(), 1);

        let reply = &replies[0];
        assert_eq!(reply.message, "Helper: hello there");
        assert_eq!(reply.author_type, AuthorType::Assistant);
        assert_eq!(reply.author_id, user_message.agent_id);
        assert_eq!(reply.reply_to.as_deref(), Some(user_message.id.as_str()));
        assert_eq!(reply.user_id, "u1");
        assert!(reply.time_cost >= 0.0);

        let stored = store.get_message(&reply.id).await.unwrap().unwrap();
        assert_eq!(&stored, reply);
    }

    #[tokio::test]
    async fn test_engine_error_becomes_system_message() {
        let (store, user_message) = setup().await;
        let runner = AgentRunner::new(store, Arc::new(FailingEngine));

        let replies = runner.execute(user_message).await.unwrap();
        assert_eq!(replies.len(), 2);
        assert_eq!(replies[0].author_type, AuthorType::Assistant);
        assert_eq!(replies[1].author_type, AuthorType::System);
        assert!(replies[1].message.contains("model unavailable"));
        assert!(replies[1].model.is_none());
    }

    #[tokio::test]
    async fn test_missing_agent() {
        let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
        let orphan = CreateChatMessage::from_user("ghost", "c1", "u1", "hi")
            .into_message(crate::ids::new_id(), chrono::Utc::now());

        let runner = AgentRunner::new(store, Arc::new(EchoEngine::new()));
        let result = runner.execute(orphan).await;
        assert!(matches!(result, Err(RunnerError::AgentNotFound(id)) if id == "ghost"));
    }

    #[tokio::test]
    async fn test_dropping_stream_cancels_engine() {
        let (store, user_message) = setup().await;
        let cancelled = Arc::new(AtomicBool::new(false));
        let runner = AgentRunner::new(
            store,
            Arc::new(HangingEngine {
                cancelled: cancelled.clone(),
            }),
        );

        let mut stream = runner.stream(user_message);
        let first = stream.next().await.unwrap().unwrap();
        assert_eq!(first.message, "first");
        drop(stream);

        for _ in 0..50 {
            if cancelled.load(Ordering::SeqCst) {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        assert!(cancelled.load(Ordering::SeqCst));
    }

    #[tokio::test]
    async fn test_history_excludes_current_message() {
        let (store, first) = setup().await;
        let runner = AgentRunner::new(store.clone(), Arc::new(HistoryEngine)).with_history_limit(2);

        for text in ["one", "two", "three"] {
            store
                .create_message(CreateChatMessage::from_user(
                    &first.agent_id,
                    &first.chat_id,
                    "u1",
                    text,
                ))
                .await
                .unwrap();
        }
        let current = store
            .create_message(CreateChatMessage::from_user(
                &first.agent_id,
                &first.chat_id,
                "u1",
                "now",
            ))
            .await
            .unwrap();

        let replies = runner.execute(current).await.unwrap();
        assert_eq!(replies[0].message, "two,three");
    }
}
