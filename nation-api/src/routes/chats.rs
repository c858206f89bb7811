/// Chat thread endpoints
///
/// A chat is visible only through the agent it belongs to and only to the
/// user who opened it. Everything else answers 404 "Chat not found".
///
/// # Endpoints
///
/// - `GET /agents/:aid/chats` - List the caller's chats with an agent
/// - `POST /agents/:aid/chats` - Open a chat
/// - `GET /agents/:aid/chats/:chat_id` - Read a chat
/// - `PATCH /agents/:aid/chats/:chat_id` - Update the summary
/// - `DELETE /agents/:aid/chats/:chat_id` - Delete a chat and its messages

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::OptionalJson,
};
use axum::{
    extract::{Path, State},
    http::StatusCode,
    Extension, Json,
};
use nation_shared::{
    auth::middleware::AuthContext,
    models::{Agent, Chat, CreateChat, UpdateChat},
    store::Store,
};
use serde::Deserialize;
use validator::Validate;

/// Update chat request
#[derive(Debug, Default, Deserialize, Validate)]
pub struct UpdateChatRequest {
    #[validate(length(max = 1000, message = "Summary must be at most 1000 characters"))]
    pub summary: Option<String>,
}

/// Loads an agent or answers 404 "Agent {aid} not found"
pub(crate) async fn require_agent(store: &dyn Store, aid: &str) -> ApiResult<Agent> {
    store
        .get_agent(aid)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Agent {} not found", aid)))
}

/// Loads a chat the caller may see through this agent
pub(crate) async fn require_chat(
    store: &dyn Store,
    aid: &str,
    chat_id: &str,
    user_id: &str,
) -> ApiResult<Chat> {
    store
        .get_chat(chat_id)
        .await?
        .filter(|chat| chat.is_visible_to(aid, user_id))
        .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))
}

/// List chats
///
/// Most recently updated first.
pub async fn list_chats(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(aid): Path<String>,
) -> ApiResult<Json<Vec<Chat>>> {
    let chats = state.store.list_chats(&aid, &auth.user_id).await?;
    Ok(Json(chats))
}

/// Create chat
///
/// # Errors
///
/// - `404 Not Found`: Agent does not exist
pub async fn create_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(aid): Path<String>,
) -> ApiResult<Json<Chat>> {
    let agent = require_agent(state.store.as_ref(), &aid).await?;

    let chat = state
        .store
        .create_chat(CreateChat {
            agent_id: agent.id,
            user_id: auth.user_id.clone(),
        })
        .await?;

    tracing::info!(user_id = %auth.user_id, agent_id = %aid, chat_id = %chat.id, "Chat created");

    Ok(Json(chat))
}

/// Get chat
pub async fn get_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((aid, chat_id)): Path<(String, String)>,
) -> ApiResult<Json<Chat>> {
    let chat = require_chat(state.store.as_ref(), &aid, &chat_id, &auth.user_id).await?;
    Ok(Json(chat))
}

/// Update chat
///
/// The body is optional; an empty or missing body returns the chat unchanged.
///
/// # Errors
///
/// - `404 Not Found`: Chat not visible to the caller
/// - `422 Unprocessable Entity`: Malformed body or summary too long
pub async fn update_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((aid, chat_id)): Path<(String, String)>,
    OptionalJson(req): OptionalJson<UpdateChatRequest>,
) -> ApiResult<Json<Chat>> {
    let chat = require_chat(state.store.as_ref(), &aid, &chat_id, &auth.user_id).await?;

    req.validate()?;

    let update = UpdateChat {
        summary: req.summary,
    };
    if update.is_empty() {
        return Ok(Json(chat));
    }

    let chat = state
        .store
        .update_chat(&chat_id, update)
        .await?
        .ok_or_else(|| ApiError::NotFound("Chat not found".to_string()))?;

    Ok(Json(chat))
}

/// Delete chat
///
/// Messages of the chat are removed with it.
pub async fn delete_chat(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path((aid, chat_id)): Path<(String, String)>,
) -> ApiResult<StatusCode> {
    require_chat(state.store.as_ref(), &aid, &chat_id, &auth.user_id).await?;

    if !state.store.delete_chat(&chat_id).await? {
        return Err(ApiError::NotFound("Chat not found".to_string()));
    }

    tracing::info!(user_id = %auth.user_id, agent_id = %aid, chat_id = %chat_id, "Chat deleted");

    Ok(StatusCode::NO_CONTENT)
}
