/// Agent model
///
/// An agent is a configured assistant owned by a single user. The engine reads
/// `model`, `prompt` and `temperature` when producing replies.
///
/// # Schema
///
/// ```sql
/// CREATE TABLE agents (
///     id TEXT PRIMARY KEY,
///     name VARCHAR(50) NOT NULL,
///     description TEXT,
///     owner TEXT NOT NULL,
///     model VARCHAR(100) NOT NULL,
///     prompt TEXT,
///     temperature REAL,
///     created_at TIMESTAMPTZ NOT NULL DEFAULT NOW(),
///     updated_at TIMESTAMPTZ NOT NULL DEFAULT NOW()
/// );
/// ```

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Model used when the creator does not choose one
pub const DEFAULT_AGENT_MODEL: &str = "gpt-4o-mini";

/// Agent owned by a user
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize, sqlx::FromRow)]
pub struct Agent {
    /// Unique agent ID
    pub id: String,

    /// Display name
    pub name: String,

    /// Free-form description
    pub description: Option<String>,

    /// User ID of the creator
    pub owner: String,

    /// LLM model identifier
    pub model: String,

    /// System instructions handed to the engine
    pub prompt: Option<String>,

    /// Sampling temperature
    pub temperature: Option<f32>,

    /// When the agent was created
    pub created_at: DateTime<Utc>,

    /// When the agent was last updated
    pub updated_at: DateTime<Utc>,
}

impl Agent {
    /// Checks whether the given user owns this agent
    pub fn is_owned_by(&self, user_id: &str) -> bool {
        self.owner == user_id
    }
}

/// Input for creating a new agent
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CreateAgent {
    pub name: String,
    pub description: Option<String>,
    pub owner: String,
    pub model: String,
    pub prompt: Option<String>,
    pub temperature: Option<f32>,
}
