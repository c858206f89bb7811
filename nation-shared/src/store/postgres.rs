/// PostgreSQL storage backend
///
/// Queries are built at runtime with `sqlx::query_as` so the crate compiles
/// without a live database. The schema lives in `migrations/`.

use super::{Store, StoreError, StoreResult};
use crate::ids::new_id;
use crate::models::{
    Agent, AuthorType, Chat, ChatMessage, ChatMessageAttachment, CreateAgent, CreateChat,
    CreateChatMessage, MessagePage, UpdateChat,
};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde_json::Value as JsonValue;
use sqlx::types::Json;
use sqlx::PgPool;

const AGENT_COLUMNS: &str =
    "id, name, description, owner, model, prompt, temperature, created_at, updated_at";

const CHAT_COLUMNS: &str = "id, agent_id, user_id, summary, rounds, created_at, updated_at";

const MESSAGE_COLUMNS: &str = "id, agent_id, chat_id, user_id, author_id, author_type, \
     thread_type, message, attachments, model, reply_to, skill_calls, input_tokens, \
     output_tokens, time_cost, app_id, search_mode, super_mode, created_at";

/// Raw `chat_messages` row before enum and JSON decoding
#[derive(Debug, sqlx::FromRow)]
struct ChatMessageRow {
    id: String,
    agent_id: String,
    chat_id: String,
    user_id: String,
    author_id: String,
    author_type: String,
    thread_type: String,
    message: String,
    attachments: Option<Json<Vec<ChatMessageAttachment>>>,
    model: Option<String>,
    reply_to: Option<String>,
    skill_calls: Option<Json<JsonValue>>,
    input_tokens: i32,
    output_tokens: i32,
    time_cost: f64,
    app_id: Option<String>,
    search_mode: Option<bool>,
    super_mode: Option<bool>,
    created_at: DateTime<Utc>,
}

impl TryFrom<ChatMessageRow> for ChatMessage {
    type Error = StoreError;

    fn try_from(row: ChatMessageRow) -> Result<Self, Self::Error> {
        let author_type: AuthorType = row
            .author_type
            .parse()
            .map_err(|e: String| StoreError::Corrupt(format!("message {}: {}", row.id, e)))?;

        Ok(ChatMessage {
            id: row.id,
            agent_id: row.agent_id,
            chat_id: row.chat_id,
            user_id: row.user_id,
            author_id: row.author_id,
            author_type,
            thread_type: row.thread_type,
            message: row.message,
            attachments: row.attachments.map(|a| a.0),
            model: row.model,
            reply_to: row.reply_to,
            skill_calls: row.skill_calls.map(|s| s.0),
            input_tokens: row.input_tokens,
            output_tokens: row.output_tokens,
            time_cost: row.time_cost,
            app_id: row.app_id,
            search_mode: row.search_mode,
            super_mode: row.super_mode,
            created_at: row.created_at,
        })
    }
}

/// Maps constraint violations to `Conflict`, everything else to `Database`
fn map_db_error(err: sqlx::Error) -> StoreError {
    if let sqlx::Error::Database(db_err) = &err {
        if let Some(constraint) = db_err.constraint() {
            return StoreError::Conflict(constraint.to_string());
        }
    }
    StoreError::Database(err)
}

/// Store backed by a PostgreSQL pool
#[derive(Clone)]
pub struct PostgresStore {
    pool: PgPool,
}

impl PostgresStore {
    /// Wraps an existing pool
    pub fn new(pool: PgPool) -> Self {
        Self { pool }
    }

    /// Returns the underlying pool
    pub fn pool(&self) -> &PgPool {
        &self.pool
    }
}

#[async_trait]
impl Store for PostgresStore {
    fn backend(&self) -> &'static str {
        "postgres"
    }

    async fn ping(&self) -> StoreResult<()> {
        crate::db::pool::health_check(&self.pool).await?;
        Ok(())
    }

    async fn create_agent(&self, data: CreateAgent) -> StoreResult<Agent> {
        let sql = format!(
            r#"
            INSERT INTO agents (id, name, description, owner, model, prompt, temperature)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING {}
            "#,
            AGENT_COLUMNS
        );

        sqlx::query_as::<_, Agent>(&sql)
            .bind(new_id())
            .bind(data.name)
            .bind(data.description)
            .bind(data.owner)
            .bind(data.model)
            .bind(data.prompt)
            .bind(data.temperature)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get_agent(&self, id: &str) -> StoreResult<Option<Agent>> {
        let sql = format!("SELECT {} FROM agents WHERE id = $1", AGENT_COLUMNS);

        let agent = sqlx::query_as::<_, Agent>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(agent)
    }

    async fn create_chat(&self, data: CreateChat) -> StoreResult<Chat> {
        let sql = format!(
            r#"
            INSERT INTO chats (id, agent_id, user_id)
            VALUES ($1, $2, $3)
            RETURNING {}
            "#,
            CHAT_COLUMNS
        );

        sqlx::query_as::<_, Chat>(&sql)
            .bind(new_id())
            .bind(data.agent_id)
            .bind(data.user_id)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)
    }

    async fn get_chat(&self, id: &str) -> StoreResult<Option<Chat>> {
        let sql = format!("SELECT {} FROM chats WHERE id = $1", CHAT_COLUMNS);

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(chat)
    }

    async fn list_chats(&self, agent_id: &str, user_id: &str) -> StoreResult<Vec<Chat>> {
        let sql = format!(
            r#"
            SELECT {}
            FROM chats
            WHERE agent_id = $1 AND user_id = $2
            ORDER BY updated_at DESC, id DESC
            "#,
            CHAT_COLUMNS
        );

        let chats = sqlx::query_as::<_, Chat>(&sql)
            .bind(agent_id)
            .bind(user_id)
            .fetch_all(&self.pool)
            .await?;

        Ok(chats)
    }

    async fn update_chat(&self, id: &str, update: UpdateChat) -> StoreResult<Option<Chat>> {
        if update.is_empty() {
            return self.get_chat(id).await;
        }

        let sql = format!(
            r#"
            UPDATE chats
            SET summary = COALESCE($2, summary),
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CHAT_COLUMNS
        );

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(id)
            .bind(update.summary)
            .fetch_optional(&self.pool)
            .await?;

        Ok(chat)
    }

    async fn record_round(&self, id: &str) -> StoreResult<Option<Chat>> {
        let sql = format!(
            r#"
            UPDATE chats
            SET rounds = rounds + 1,
                updated_at = NOW()
            WHERE id = $1
            RETURNING {}
            "#,
            CHAT_COLUMNS
        );

        let chat = sqlx::query_as::<_, Chat>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        Ok(chat)
    }

    async fn delete_chat(&self, id: &str) -> StoreResult<bool> {
        // chat_messages cascades
        let result = sqlx::query("DELETE FROM chats WHERE id = $1")
            .bind(id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected() > 0)
    }

    async fn create_message(&self, data: CreateChatMessage) -> StoreResult<ChatMessage> {
        let sql = format!(
            r#"
            INSERT INTO chat_messages (
                id, agent_id, chat_id, user_id, author_id, author_type, thread_type,
                message, attachments, model, reply_to, skill_calls, input_tokens,
                output_tokens, time_cost, app_id, search_mode, super_mode
            )
            VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10, $11, $12, $13, $14, $15, $16, $17, $18)
            RETURNING {}
            "#,
            MESSAGE_COLUMNS
        );

        let row = sqlx::query_as::<_, ChatMessageRow>(&sql)
            .bind(new_id())
            .bind(data.agent_id)
            .bind(data.chat_id)
            .bind(data.user_id)
            .bind(data.author_id)
            .bind(data.author_type.as_str())
            .bind(data.thread_type)
            .bind(data.message)
            .bind(data.attachments.map(Json))
            .bind(data.model)
            .bind(data.reply_to)
            .bind(data.skill_calls.map(Json))
            .bind(data.input_tokens)
            .bind(data.output_tokens)
            .bind(data.time_cost)
            .bind(data.app_id)
            .bind(data.search_mode)
            .bind(data.super_mode)
            .fetch_one(&self.pool)
            .await
            .map_err(map_db_error)?;

        row.try_into()
    }

    async fn get_message(&self, id: &str) -> StoreResult<Option<ChatMessage>> {
        let sql = format!("SELECT {} FROM chat_messages WHERE id = $1", MESSAGE_COLUMNS);

        let row = sqlx::query_as::<_, ChatMessageRow>(&sql)
            .bind(id)
            .fetch_optional(&self.pool)
            .await?;

        row.map(ChatMessage::try_from).transpose()
    }

    async fn list_messages(
        &self,
        agent_id: &str,
        chat_id: &str,
        cursor: Option<&str>,
        limit: usize,
    ) -> StoreResult<MessagePage> {
        let sql = format!(
            r#"
            SELECT {}
            FROM chat_messages
            WHERE agent_id = $1
              AND chat_id = $2
              AND ($3::TEXT IS NULL OR id < $3)
            ORDER BY id DESC
            LIMIT $4
            "#,
            MESSAGE_COLUMNS
        );

        let rows = sqlx::query_as::<_, ChatMessageRow>(&sql)
            .bind(agent_id)
            .bind(chat_id)
            .bind(cursor)
            .bind((limit + 1) as i64)
            .fetch_all(&self.pool)
            .await?;

        let messages = rows
            .into_iter()
            .map(ChatMessage::try_from)
            .collect::<StoreResult<Vec<_>>>()?;

        Ok(MessagePage::from_overfetch(messages, limit))
    }
}
