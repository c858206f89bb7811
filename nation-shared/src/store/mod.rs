/// Persistence layer
///
/// Handlers and the agent runner talk to storage only through the [`Store`]
/// trait, so the server runs unchanged against PostgreSQL or, when no
/// database is configured, against process memory.
///
/// # Backends
///
/// - [`PostgresStore`]: sqlx over a `PgPool`
/// - [`MemoryStore`]: tokio `RwLock` over in-process maps
///
/// # Pagination
///
/// `list_messages` returns messages newest first. With a cursor only ids
/// strictly below it are considered. Backends fetch `limit + 1` rows and build
/// the page with [`MessagePage::from_overfetch`].
///
/// # Example
///
/// ```no_run
/// use nation_shared::store::{MemoryStore, Store};
/// use nation_shared::models::CreateChat;
/// use std::sync::Arc;
///
/// # async fn example() -> Result<(), nation_shared::store::StoreError> {
/// let store: Arc<dyn Store> = Arc::new(MemoryStore::new());
/// let chat = store
///     .create_chat(CreateChat {
///         agent_id: "agent".to_string(),
///         user_id: "user".to_string(),
///     })
///     .await?;
/// assert_eq!(chat.rounds, 0);
/// # Ok(())
/// # }
/// ```

pub mod memory;
pub mod postgres;

pub use memory::MemoryStore;
pub use postgres::PostgresStore;

use crate::models::{
    Agent, Chat, ChatMessage, CreateAgent, CreateChat, CreateChatMessage, MessagePage, UpdateChat,
};
use async_trait::async_trait;

/// Error type for storage operations
#[derive(Debug, thiserror::Error)]
pub enum StoreError {
    /// Database driver error
    #[error("Database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Unique or foreign key constraint violated
    #[error("Constraint violation: {0}")]
    Conflict(String),

    /// Stored data could not be decoded
    #[error("Corrupt record: {0}")]
    Corrupt(String),
}

/// Storage result type alias
pub type StoreResult<T> = Result<T, StoreError>;

/// Storage backend contract
#[async_trait]
pub trait Store: Send + Sync {
    /// Returns the backend name for logs and health output
    fn backend(&self) -> &'static str;

    /// Verifies the backend is reachable
    async fn ping(&self) -> StoreResult<()>;

    /// Creates an agent with a fresh id
    async fn create_agent(&self, data: CreateAgent) -> StoreResult<Agent>;

    /// Finds an agent by ID
    async fn get_agent(&self, id: &str) -> StoreResult<Option<Agent>>;

    /// Creates an empty chat thread
    async fn create_chat(&self, data: CreateChat) -> StoreResult<Chat>;

    /// Finds a chat by ID
    async fn get_chat(&self, id: &str) -> StoreResult<Option<Chat>>;

    /// Lists a user's chats with an agent, most recently updated first
    async fn list_chats(&self, agent_id: &str, user_id: &str) -> StoreResult<Vec<Chat>>;

    /// Applies an update; returns `None` when the chat does not exist
    async fn update_chat(&self, id: &str, update: UpdateChat) -> StoreResult<Option<Chat>>;

    /// Counts one more user message in the chat
    async fn record_round(&self, id: &str) -> StoreResult<Option<Chat>>;

    /// Deletes a chat and its messages; returns whether it existed
    async fn delete_chat(&self, id: &str) -> StoreResult<bool>;

    /// Appends a message with a fresh id
    async fn create_message(&self, data: CreateChatMessage) -> StoreResult<ChatMessage>;

    /// Finds a message by ID
    async fn get_message(&self, id: &str) -> StoreResult<Option<ChatMessage>>;

    /// Returns one page of a chat's history, newest first
    async fn list_messages(
        &self,
        agent_id: &str,
        chat_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<MessagePage>;

    /// Returns the latest `limit` messages of a chat, oldest first
    async fn recent_messages(
        &self,
        agent_id: &str,
        chat_id: &str,
        limit: usize,
    ) -> StoreResult<Vec<ChatMessage>> {
        let page = self.list_messages(agent_id, chat_id, None, limit).await?;
        let mut messages = page.data;
        messages.reverse();
        Ok(messages)
    }
}
