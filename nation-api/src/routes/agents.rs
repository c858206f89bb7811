/// Agent endpoints
///
/// # Endpoints
///
/// - `POST /agents` - Create an agent owned by the caller
/// - `GET /agents/:aid` - Read one of the caller's agents

use crate::{
    app::AppState,
    error::{ApiError, ApiResult},
    extract::ApiJson,
};
use axum::{
    extract::{Path, State},
    Extension, Json,
};
use nation_shared::{
    auth::middleware::AuthContext,
    models::{Agent, CreateAgent, DEFAULT_AGENT_MODEL},
};
use serde::Deserialize;
use validator::Validate;

/// Create agent request
#[derive(Debug, Deserialize, Validate)]
pub struct CreateAgentRequest {
    /// Display name
    #[validate(length(min = 1, max = 50, message = "Name must be 1-50 characters"))]
    pub name: String,

    #[validate(length(max = 2000, message = "Description must be at most 2000 characters"))]
    pub description: Option<String>,

    /// LLM model identifier (default: gpt-4o-mini)
    #[validate(length(min = 1, max = 100, message = "Model must be 1-100 characters"))]
    pub model: Option<String>,

    /// System instructions
    #[validate(length(max = 20000, message = "Prompt must be at most 20000 characters"))]
    pub prompt: Option<String>,

    #[validate(range(min = 0.0, max = 2.0, message = "Temperature must be between 0 and 2"))]
    pub temperature: Option<f32>,
}

/// Create agent
///
/// # Endpoint
///
/// ```text
/// POST /agents
/// Authorization: Bearer <token>
/// Content-Type: application/json
///
/// {
///   "name": "Research Helper",
///   "prompt": "Answer with sources.",
///   "temperature": 0.3
/// }
/// ```
///
/// # Errors
///
/// - `401 Unauthorized`: Missing or invalid token
/// - `422 Unprocessable Entity`: Validation failed
pub async fn create_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    ApiJson(req): ApiJson<CreateAgentRequest>,
) -> ApiResult<Json<Agent>> {
    req.validate()?;

    let agent = state
        .store
        .create_agent(CreateAgent {
            name: req.name,
            description: req.description,
            owner: auth.user_id.clone(),
            model: req
                .model
                .unwrap_or_else(|| DEFAULT_AGENT_MODEL.to_string()),
            prompt: req.prompt,
            temperature: req.temperature,
        })
        .await?;

    tracing::info!(user_id = %auth.user_id, agent_id = %agent.id, "Agent created");

    Ok(Json(agent))
}

/// Get agent
///
/// Agents of other users are reported as missing.
///
/// # Errors
///
/// - `404 Not Found`: Agent missing or owned by someone else
pub async fn get_agent(
    State(state): State<AppState>,
    Extension(auth): Extension<AuthContext>,
    Path(aid): Path<String>,
) -> ApiResult<Json<Agent>> {
    let agent = state
        .store
        .get_agent(&aid)
        .await?
        .filter(|agent| agent.is_owned_by(&auth.user_id))
        .ok_or_else(|| ApiError::NotFound("Agent not found".to_string()))?;

    Ok(Json(agent))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_request_defaults() {
        let req: CreateAgentRequest = serde_json::from_str(r#"{"name": "Helper"}"#).unwrap();
        assert!(req.validate().is_ok());
        assert!(req.model.is_none());
        assert!(req.temperature.is_none());
    }

    #[test]
    fn test_request_limits() {
        let req: CreateAgentRequest =
            serde_json::from_str(r#"{"name": "", "temperature": 2.5}"#).unwrap();
        let errors = req.validate().unwrap_err();
        let fields = errors.field_errors();
        assert!(fields.contains_key("name"));
        assert!(fields.contains_key("temperature"));

        let long_name = "x".repeat(51);
        let req = CreateAgentRequest {
            name: long_name,
            description: None,
            model: Some(String::new()),
            prompt: None,
            temperature: None,
        };
        let errors = req.validate().unwrap_err();
        assert!(errors.field_errors().contains_key("model"));
    }
}
