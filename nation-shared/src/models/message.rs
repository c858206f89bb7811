/// Chat message model
///
/// Messages are append-only. A user message and the agent replies it
/// produced are linked through `reply_to`.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE chat_messages (
///     id TEXT PRIMARY KEY,
///     agent_id TEXT NOT NULL,
///     chat_id TEXT NOT NULL REFERENCES chats(id) ON DELETE CASCADE,
///     user_id TEXT NOT NULL,
///     author_id TEXT NOT NULL,
///     author_type VARCHAR(20) NOT NULL,
///     thread_type VARCHAR(20) NOT NULL,
///     message TEXT NOT NULL,
///     attachments JSONB,
///     model VARCHAR(100),
///     reply_to TEXT,
///     skill_calls JSONB,
///     input_tokens INTEGER NOT NULL DEFAULT 0,
///     output_tokens INTEGER NOT NULL DEFAULT 0,
///     time_cost DOUBLE PRECISION NOT NULL DEFAULT 0,
///     app_id TEXT,
///     search_mode BOOLEAN,
///     super_mode BOOLEAN,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value as JsonValue;
use std::fmt;
use std::str::FromStr;

/// Thread type recorded for messages that arrive through this API
pub const API_THREAD_TYPE: &str = "api";

/// Who wrote a message
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AuthorType {
    /// Human user talking to the agent
    User,

    /// Agent reply
    Assistant,

    /// Output of a skill (tool) invoked by the agent
    Skill,

    /// Error or notice produced by the system
    System,
}

impl AuthorType {
    /// Converts author type to string for storage
    pub fn as_str(&self) -> &'static str {
        match self {
            AuthorType::User => "user",
            AuthorType::Assistant => "assistant",
            AuthorType::Skill => "skill",
            AuthorType::System => "system",
        }
    }
}

impl fmt::Display for AuthorType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for AuthorType {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "user" => Ok(AuthorType::User),
            "assistant" => Ok(AuthorType::Assistant),
            "skill" => Ok(AuthorType::Skill),
            "system" => Ok(AuthorType::System),
            other => Err(format!("Unknown author type: {}", other)),
        }
    }
}

/// Kind of attachment
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum AttachmentType {
    Link,
    Image,
    File,
}

/// Attachment sent along with a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessageAttachment {
    /// Attachment kind
    #[serde(rename = "type")]
    pub kind: AttachmentType,

    /// Where the attachment lives
    pub url: String,

    /// Optional display name
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub name: Option<String>,
}

/// Stored chat message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct ChatMessage {
    /// Unique, time-ordered message ID
    pub id: String,

    pub agent_id: String,
    pub chat_id: String,

    /// Owner of the chat thread
    pub user_id: String,

    /// User ID or agent ID depending on `author_type`
    pub author_id: String,

    pub author_type: AuthorType,

    /// Channel the thread lives in (always "api" for this server)
    pub thread_type: String,

    /// Message text
    pub message: String,

    pub attachments: Option<Vec<ChatMessageAttachment>>,

    /// Model that produced the reply (agent messages only)
    pub model: Option<String>,

    /// ID of the user message this message answers
    pub reply_to: Option<String>,

    /// Skill calls made while producing this message
    pub skill_calls: Option<JsonValue>,

    pub input_tokens: i32,
    pub output_tokens: i32,

    /// Seconds spent producing this message
    pub time_cost: f64,

    /// Client application identifier
    pub app_id: Option<String>,

    pub search_mode: Option<bool>,
    pub super_mode: Option<bool>,

    pub created_at: DateTime<Utc>,
}

/// Input for creating a message
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CreateChatMessage {
    pub agent_id: String,
    pub chat_id: String,
    pub user_id: String,
    pub author_id: String,
    pub author_type: AuthorType,
    pub thread_type: String,
    pub message: String,
    pub attachments: Option<Vec<ChatMessageAttachment>>,
    pub model: Option<String>,
    pub reply_to: Option<String>,
    pub skill_calls: Option<JsonValue>,
    pub input_tokens: i32,
    pub output_tokens: i32,
    pub time_cost: f64,
    pub app_id: Option<String>,
    pub search_mode: Option<bool>,
    pub super_mode: Option<bool>,
}

impl CreateChatMessage {
    /// Creates a user-authored message for an API thread
    pub fn from_user(
        agent_id: impl Into<String>,
        chat_id: impl Into<String>,
        user_id: impl Into<String>,
        message: impl Into<String>,
    ) -> Self {
        let user_id = user_id.into();
        Self {
            agent_id: agent_id.into(),
            chat_id: chat_id.into(),
            author_id: user_id.clone(),
            user_id,
            author_type: AuthorType::User,
            thread_type: API_THREAD_TYPE.to_string(),
            message: message.into(),
            attachments: None,
            model: None,
            reply_to: None,
            skill_calls: None,
            input_tokens: 0,
            output_tokens: 0,
            time_cost: 0.0,
            app_id: None,
            search_mode: None,
            super_mode: None,
        }
    }

    /// Materializes the stored message with its generated id and timestamp
    pub fn into_message(self, id: String, created_at: DateTime<Utc>) -> ChatMessage {
        ChatMessage {
            id,
            agent_id: self.agent_id,
            chat_id: self.chat_id,
            user_id: self.user_id,
            author_id: self.author_id,
            author_type: self.author_type,
            thread_type: self.thread_type,
            message: self.message,
            attachments: self.attachments,
            model: self.model,
            reply_to: self.reply_to,
            skill_calls: self.skill_calls,
            input_tokens: self.input_tokens,
            output_tokens: self.output_tokens,
            time_cost: self.time_cost,
            app_id: self.app_id,
            search_mode: self.search_mode,
            super_mode: self.super_mode,
            created_at,
        }
    }
}

/// One page of a chat's message history, newest first
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct MessagePage {
    pub data: Vec<ChatMessage>,
    pub has_more: bool,
    pub next_cursor: Option<String>,
}

impl MessagePage {
    /// Builds a page from a query that fetched `limit + 1` rows
    ///
    /// The extra row only signals that another page exists; it is dropped.
    /// `rows` must already be ordered newest first.
    pub fn from_overfetch(mut rows: Vec<ChatMessage>, limit: usize) -> Self {
        let has_more = rows.len() > limit;
        rows.truncate(limit);

        let next_cursor = if has_more {
            rows.last().map(|m| m.id.clone())
        } else {
            None
        };

        Self {
            data: rows,
            has_more,
            next_cursor,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn message(id: &str) -> ChatMessage {
        CreateChatMessage::from_user("a1", "c1", "u1", format!("message {}", id))
            .into_message(id.to_string(), Utc::now())
    }

    #[test]
    fn test_author_type_parsing() {
        for author in [
            AuthorType::User,
            AuthorType::Assistant,
            AuthorType::Skill,
            AuthorType::System,
        ] {
            assert_eq!(author.as_str().parse::<AuthorType>().unwrap(), author);
        }
        assert!("bot".parse::<AuthorType>().is_err());
    }

    #[test]
    fn test_author_type_serializes_lowercase() {
        let json = serde_json::to_string(&AuthorType::Assistant).unwrap();
        assert_eq!(json, "\"assistant\"");
    }

    #[test]
    fn test_attachment_uses_type_key() {
        let attachment: ChatMessageAttachment =
            serde_json::from_str(r#"{"type": "link", "url": "https://example.com"}"#).unwrap();
        assert_eq!(attachment.kind, AttachmentType::Link);
        assert!(attachment.name.is_none());

        let json = serde_json::to_value(&attachment).unwrap();
        assert_eq!(json["type"], "link");
    }

    #[test]
    fn test_from_user_sets_author() {
        let msg = CreateChatMessage::from_user("a1", "c1", "u1", "hello");
        assert_eq!(msg.author_id, "u1");
        assert_eq!(msg.author_type, AuthorType::User);
        assert_eq!(msg.thread_type, API_THREAD_TYPE);
    }

    #[test]
    fn test_page_with_more_rows() {
        let rows = vec![message("05"), message("04"), message("03")];
        let page = MessagePage::from_overfetch(rows, 2);

        assert!(page.has_more);
        assert_eq!(page.data.len(), 2);
        assert_eq!(page.next_cursor.as_deref(), Some("04"));
    }

    #[test]
    fn test_page_exact_fit_has_no_cursor() {
        let rows = vec![message("02"), message("01")];
        let page = MessagePage::from_overfetch(rows, 2);

        assert!(!page.has_more);
        assert_eq!(page.data.len(), 2);
        assert!(page.next_cursor.is_none());
    }

    #[test]
    fn test_empty_page() {
        let page = MessagePage::from_overfetch(Vec::new(), 20);
        assert!(!page.has_more);
        assert!(page.data.is_empty());
        assert!(page.next_cursor.is_none());
    }
}
