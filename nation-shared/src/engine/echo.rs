/// Echo engine
///
/// Answers every message with `"{agent name}: {message}"`. Token counts are
/// word counts. Selected with `AGENT_ENGINE=echo` or when no OpenAI key is
/// configured.

use super::{estimate_tokens, AgentEngine, EngineContext, EngineReply, EngineResult};
use async_trait::async_trait;

/// Deterministic engine
#[derive(Debug, Default, Clone, Copy)]
pub struct EchoEngine;

impl EchoEngine {
    pub fn new() -> Self {
        EchoEngine
    }
}

#[async_trait]
impl AgentEngine for EchoEngine {
    fn name(&self) -> &str {
        "echo"
    }

    async fn run(&self, context: EngineContext) -> EngineResult<()> {
        if context.is_cancelled() {
            return Ok(());
        }

        let text = format!("{}: {}", context.agent.name, context.message.message);
        let reply = EngineReply::assistant(text.clone())
            .with_model(context.agent.model.clone())
            .with_usage(
                estimate_tokens(&context.message.message),
                estimate_tokens(&text),
            );

        context.emit(reply).await
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::test_support::{agent, user_message};
    use crate::models::AuthorType;
    use tokio::sync::mpsc;
    use tokio_util::sync::CancellationToken;

    #[tokio::test]
    async fn test_echo_reply() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let context = EngineContext::new(
            agent("Helper"),
            user_message("what is the weather"),
            Vec::new(),
            tx,
            CancellationToken::new(),
        );

        EchoEngine::new().run(context).await.unwrap();

        let reply = rx.recv().await.unwrap();
        assert_eq!(reply.author_type, AuthorType::Assistant);
        assert_eq!(reply.message, "Helper: what is the weather");
        assert_eq!(reply.input_tokens, 4);
        assert_eq!(reply.output_tokens, 5);
        assert!(rx.recv().await.is_none());
    }

    #[tokio::test]
    async fn test_echo_respects_cancellation() {
        let (tx, mut rx) = mpsc::unbounded_channel();
        let cancel_token = CancellationToken::new();
        cancel_token.cancel();

        let context = EngineContext::new(
            agent("Helper"),
            user_message("hello"),
            Vec::new(),
            tx,
            cancel_token,
        );

        EchoEngine::new().run(context).await.unwrap();
        assert!(rx.recv().await.is_none());
    }
}
