/// Chat message endpoints
///
/// # Endpoints
///
/// - `GET /agents/:aid/chats/:chat_id/messages` - Page through history
/// - `POST /agents/:aid/chats/:chat_id/messages` - Send a message, get replies
/// - `POST /agents/:aid/chats/:chat_id/messages/retry` - Not supported (501)
/// - `GET /messages/:message_id` - Read one message
///
/// # Streaming
///
/// With `"stream": true` the send endpoint answers immediately and writes one
/// reply message per line as the engine produces them:
///
/// ```text
/// {"id":"...","author_type":"assistant","message":"..."}\n
/// {"id":"...","author_type":"skill","message":"..."}\n
/// ```
///
/// Closing the connection cancels the engine.

use super::chats::{require_agent, require_chat};
use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::{ApiJson, ApiQuery},
};
use axum::{
    body::Body,
    extract::{Path, State},
    http::{header, StatusCode},
    response::{IntoResponse, Response},
    Extension, Json,
};
use bytes::Bytes;
use futures::StreamExt;
use nation_shared::{
    auth::middleware::AuthContext,
    models::{ChatMessage, ChatMessageAttachment, CreateChatMessage, MessagePage},
};
use serde::Deserialize;
use validator::Validate;

/// Page size when `limit` is omitted
pub const DEFAULT_PAGE_LIMIT: i64 = 20;

/// Largest page a client may request
pub const MAX_PAGE_LIMIT: i64 = 100;

/// History query parameters
#[derive(Debug, Deserialize)]
pub struct ListMessagesQuery {
    /// Only messages older than this id
    pub cursor: Option<String>,

    /// Page size (1-100)
    pub limit: Option<i64>,
}

/// Send message request
#[derive(Debug, Deserialize, Validate)]
pub struct ChatMessageRequest {
    /// Client application identifier
    pub app_id: Option<String>,

    /// Client-side user id; the author is always the authenticated caller
    #[validate(length(min = 1, message = "User ID must not be empty"))]
    pub user_id: String,

    #[validate(length(min = 1, max = 65535, message = "Message must be 1-65535 characters"))]
    pub message: String,

    /// Stream replies as newline-delimited JSON
    pub stream: Option<bool>,

    pub search_mode: Option<bool>,
    pub super_mode: Option<bool>,

    pub attachments: Option<Vec<ChatMessageAttachment>>,
}

/// List messages
///
/// Newest first. Pass the returned `next_cursor` as `cursor` to continue.
///
/// # Errors
///
/// - `404 Not Found`: Chat not visible to the caller
/// - `422 Unprocessable Entity`: `limit` outside 1-100
pub async fn list_messages(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((aid, chat_id)): Path<(String, String)>,
    ApiQuery(query): ApiQuery<ListMessagesQuery>,
) -> ApiResult<Json<MessagePage>> {
    let limit = query.limit.unwrap_or(DEFAULT_PAGE_LIMIT);
    if !(1..=MAX_PAGE_LIMIT).contains(&limit) {
        return Err(ApiError::invalid(
            "limit",
            format!("Limit must be between 1 and {}", MAX_PAGE_LIMIT),
        ));
    }

    require_chat(state.store.as_ref(), &aid, &chat_id, &auth.user_id).await?;

    let page = state
        .store
        .list_messages(&aid, &chat_id, query.cursor.as_deref(), limit as usize)
        .await?;

    Ok(Json(page))
}

/// Send message
///
/// Stores the caller's message, counts a round on the chat, then runs the
/// agent engine on it.
///
/// # Errors
///
/// - `404 Not Found`: Agent missing, or chat not visible to the caller
/// - `422 Unprocessable Entity`: Validation failed
pub async fn send_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((aid, chat_id)): Path<(String, String)>,
    ApiJson(req): ApiJson<ChatMessageRequest>,
) -> ApiResult<Response> {
    req.validate()?;

    require_agent(state.store.as_ref(), &aid).await?;
    require_chat(state.store.as_ref(), &aid, &chat_id, &auth.user_id).await?;

    let mut input = CreateChatMessage::from_user(&aid, &chat_id, &auth.user_id, req.message);
    input.attachments = req.attachments;
    input.app_id = req.app_id;
    input.search_mode = req.search_mode;
    input.super_mode = req.super_mode;

    let user_message = state.store.create_message(input).await?;
    state.store.record_round(&chat_id).await?;

    tracing::info!(
        user_id = %auth.user_id,
        agent_id = %aid,
        chat_id = %chat_id,
        message_id = %user_message.id,
        engine = state.runner.engine_name(),
        "User message received"
    );

    if req.stream.unwrap_or(false) {
        let lines = state.runner.stream(user_message).map(|item| {
            let message = item?;
            let mut line = serde_json::to_vec(&message)?;
            line.push(b'\n');
            Ok::<_, axum::BoxError>(Bytes::from(line))
        });

        let response = (
            StatusCode::OK,
            [(header::CONTENT_TYPE, "application/json")],
            Body::from_stream(lines),
        )
            .into_response();
        return Ok(response);
    }

    let replies = state.runner.execute(user_message).await?;
    Ok(Json(replies).into_response())
}

/// Retry the last message
///
/// Not supported. Answers 501 for any agent and chat id.
pub async fn retry_message(
    Extension(auth): Extension<AuthContext>,
    Path((aid, chat_id)): Path<(String, String)>,
) -> ApiResult<Json<Vec<ChatMessage>>> {
    tracing::debug!(user_id = %auth.user_id, agent_id = %aid, chat_id = %chat_id, "Retry requested");

    Err(ApiError::NotImplemented(
        "Retrying messages is not supported".to_string(),
    ))
}

/// Get message
///
/// # Errors
///
/// - `404 Not Found`: Message missing or in another user's chat
pub async fn get_message(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(message_id): Path<String>,
) -> ApiResult<Json<ChatMessage>> {
    let message = state
        .store
        .get_message(&message_id)
        .await?
        .filter(|message| message.user_id == auth.user_id)
        .ok_or_else(|| ApiError::NotFound("Message not found".to_string()))?;

    Ok(Json(message))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_validation() {
        let req: ChatMessageRequest =
            serde_json::from_str(r#"{"user_id": "u1", "message": "hi"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.stream.is_none());

        let req: ChatMessageRequest =
            serde_json::from_str(r#"{"user_id": "", "message": ""}"#).unwrap();
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("user_id"));
        assert!(errors.field_errors().contains_key("message"));
    }

    #[test]
    fn test_message_length_limit() {
        let req = ChatMessageRequest {
            app_id: None,
            user_id: "u1".to_string(),
            message: "a".repeat(65536),
            stream: Some(false),
            search_mode: None,
            super_mode: None,
            attachments: None,
        };
        assert!(req.validate().is_err());
    }

    #[test]
    fn test_attachments_parse() {
        let req: ChatMessageRequest = serde_json::from_str(
            r#"{"user_id": "u1", "message": "look", "attachments": [{"type": "image", "url": "https://x/y.png"}]}"#,
        )
        .unwrap();
        assert_eq!(req.attachments.unwrap().len(), 1);
    }
}
