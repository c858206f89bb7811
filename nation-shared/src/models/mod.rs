/// Domain models
///
/// Plain data types shared by the storage backends, the agent engine and the
/// API handlers. Persistence lives in [`crate::store`].
///
/// # Models
///
/// - `agent`: Agents owned by users
/// - `chat`: Chat threads between a user and an agent
/// - `message`: Messages inside a chat thread and history pages

pub mod agent;
pub mod chat;
pub mod message;

pub use agent::{Agent, CreateAgent, DEFAULT_AGENT_MODEL};
pub use chat::{Chat, CreateChat, UpdateChat};
pub use message::{
    AttachmentType, AuthorType, ChatMessage, ChatMessageAttachment, CreateChatMessage,
    MessagePage, API_THREAD_TYPE,
};
