/// API route handlers
///
/// This module contains all route handlers organized by resource:
///
/// - `health`: Health check endpoint
/// - `agents`: Agent creation and lookup
/// - `chats`: Chat threads of an agent
/// - `messages`: Messages inside a chat thread

pub mod agents;
pub mod chats;
pub mod health;
pub mod messages;
