/// In-memory storage backend
///
/// Used when no database is configured (local development and tests). All
/// state lives behind one `RwLock`, so every operation is atomic with respect
/// to the others. Data is lost when the process exits.

use super::{Store, StoreResult};
use crate::ids::new_id;
use crate::models::{
    Agent, Chat, ChatMessage, CreateAgent, CreateChat, CreateChatMessage, MessagePage, UpdateChat,
};
use async_trait::async_trait;
use chrono::Utc;
use std::collections::{BTreeMap, HashMap};
use std::ops::Bound;
use tokio::sync::RwLock;

#[derive(Default)]
struct Tables {
    agents: HashMap<String, Agent>,
    chats: HashMap<String, Chat>,
    /// Keyed by id, so iteration order is creation order
    messages: BTreeMap<String, ChatMessage>,
}

/// Process-local store
#[derive(Default)]
pub struct MemoryStore {
    tables: RwLock<Tables>,
}

impl MemoryStore {
    /// Creates an empty store
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl Store for MemoryStore {
    fn backend(&self) -> &'static str {
        "memory"
    }

    async fn ping(&self) -> StoreResult<()> {
        Ok(())
    }

    async fn create_agent(&self, data: CreateAgent) -> StoreResult<Agent> {
        let now = Utc::now();
        let agent = Agent {
            id: new_id(),
            name: data.name,
            description: data.description,
            owner: data.owner,
            model: data.model,
            prompt: data.prompt,
            temperature: data.temperature,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        tables.agents.insert(agent.id.clone(), agent.clone());
        Ok(agent)
    }

    async fn get_agent(&self, id: &str) -> StoreResult<Option<Agent>> {
        Ok(self.tables.read().await.agents.get(id).cloned())
    }

    async fn create_chat(&self, data: CreateChat) -> StoreResult<Chat> {
        let now = Utc::now();
        let chat = Chat {
            id: new_id(),
            agent_id: data.agent_id,
            user_id: data.user_id,
            summary: String::new(),
            rounds: 0,
            created_at: now,
            updated_at: now,
        };

        let mut tables = self.tables.write().await;
        tables.chats.insert(chat.id.clone(), chat.clone());
        Ok(chat)
    }

    async fn get_chat(&self, id: &str) -> StoreResult<Option<Chat>> {
        Ok(self.tables.read().await.chats.get(id).cloned())
    }

    async fn list_chats(&self, agent_id: &str, user_id: &str) -> StoreResult<Vec<Chat>> {
        let tables = self.tables.read().await;
        let mut chats: Vec<Chat> = tables
            .chats
            .values()
            .filter(|c| c.agent_id == agent_id && c.user_id == user_id)
            .cloned()
            .collect();

        chats.sort_by(|a, b| {
            b.updated_at
                .cmp(&a.updated_at)
                .then_with(|| b.id.cmp(&a.id))
        });
        Ok(chats)
    }

    async fn update_chat(&self, id: &str, update: UpdateChat) -> StoreResult<Option<Chat>> {
        let mut tables = self.tables.write().await;
        let Some(chat) = tables.chats.get_mut(id) else {
            return Ok(None);
        };

        if !update.is_empty() {
            if let Some(summary) = update.summary {
                chat.summary = summary;
            }
            chat.updated_at = Utc::now();
        }

        Ok(Some(chat.clone()))
    }

    async fn record_round(&self, id: &str) -> StoreResult<Option<Chat>> {
        let mut tables = self.tables.write().await;
        Ok(tables.chats.get_mut(id).map(|chat| {
            chat.rounds += 1;
            chat.updated_at = Utc::now();
            chat.clone()
        }))
    }

    async fn delete_chat(&self, id: &str) -> StoreResult<bool> {
        let mut tables = self.tables.write().await;
        if tables.chats.remove(id).is_none() {
            return Ok(false);
        }

        tables.messages.retain(|_, m| m.chat_id != id);
        Ok(true)
    }

    async fn create_message(&self, data: CreateChatMessage) -> StoreResult<ChatMessage> {
        let mut tables = self.tables.write().await;
        // Generated under the write lock so ids enter the map in order
        let message = data.into_message(new_id(), Utc::now());
        tables.messages.insert(message.id.clone(), message.clone());
        Ok(message)
    }

    async fn get_message(&self, id: &str) -> StoreResult<Option<ChatMessage>> {
        Ok(self.tables.read().await.messages.get(id).cloned())
    }

    async fn list_messages(
        &self,
        agent_id: &str,
        chat_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<MessagePage> {
        let tables = self.tables.read().await;

        let upper = match cursor {
            Some(cursor) => Bound::Excluded(cursor.to_string()),
            None => Bound::Unbounded,
        };

        let rows: Vec<ChatMessage> = tables
            .messages
            .range((Bound::Unbounded, upper))
            .rev()
            .map(|(_, m)| m)
            .filter(|m| m.agent_id == agent_id && m.chat_id == chat_id)
            .take(limit + 1)
            .cloned()
            .collect();

        Ok(MessagePage::from_overfetch(rows, limit))
    }
}
