/// Chat thread model
///
/// A chat is a conversation between one user and one agent. `rounds` counts
/// the user messages sent to the thread.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE chats (
///     id TEXT PRIMARY KEY,
///     agent_id TEXT NOT NULL,
///     user_id TEXT NOT NULL,
///     summary TEXT NOT NULL DEFAULT '',
///     rounds INTEGER NOT NULL DEFAULT 0,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Chat thread
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Chat {
    /// Unique chat ID
    pub id: String,

    /// Agent this thread talks to
    pub agent_id: String,

    /// User who opened the thread
    pub user_id: String,

    /// Short summary of the conversation
    pub summary: String,

    /// Number of user messages sent
    pub rounds: i32,

    /// When the chat was created
    pub created_at: DateTime<Utc>,

    /// When the chat was last updated
    pub updated_at: DateTime<Utc>,
}

impl Chat {
    /// Checks that the chat belongs to the given agent and user
    ///
    /// Every chat-scoped endpoint answers 404 when this is false, so a caller
    /// cannot tell a foreign chat from a missing one.
    pub fn is_visible_to(&self, agent_id: &str, user_id: &str) -> bool {
        self.agent_id == agent_id && self.user_id == user_id
    }
}

/// Input for creating a new chat
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateChat {
    pub agent_id: String,
    pub user_id: String,
}

/// Input for updating a chat
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct UpdateChat {
    /// Replace the summary
    pub summary: Option<String>,
}

impl UpdateChat {
    /// Returns true when no field would change
    pub fn is_empty(&self) -> bool {
        self.summary.is_none()
    }
}
