/// Agent endpoint tests

mod common;

use axum::http::StatusCode;
use common::{TestContext, USER};
use serde_json::json;

#[tokio::test]
async fn test_create_agent_owned_by_caller() {
    let ctx = TestContext::new();

    let agent = ctx
        .json(
            "POST",
            "/agents",
            Some(USER),
            Some(json!({
                "name": "Research Helper",
                "description": "Finds papers",
                "prompt": "Answer with sources.",
                "temperature": 0.3
            })),
            StatusCode::OK,
        )
        .await;

    assert_eq!(agent["owner"], USER);
    assert_eq!(agent["name"], "Research Helper");
    assert_eq!(agent["model"], "gpt-4o-mini");
    assert_eq!(agent["id"].as_str().unwrap().len(), 32);
}

#[tokio::test]
async fn test_agent_ids_are_unique() {
    let ctx = TestContext::new();

    let first = ctx.create_agent(USER, "One").await;
    let second = ctx.create_agent(USER, "Two").await;
    assert_ne!(first, second);
}

#[tokio::test]
async fn test_create_agent_validation() {
    let ctx = TestContext::new();

    let body = ctx
        .json(
            "POST",
            "/agents",
            Some(USER),
            Some(json!({ "name": "", "temperature": 5.0 })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;

    assert_eq!(body["error"], "validation_error");
    let fields: Vec<&str> = body["details"]
        .as_array()
        .unwrap()
        .iter()
        .map(|d| d["field"].as_str().unwrap())
        .collect();
    assert_eq!(fields, vec!["name", "temperature"]);
}

#[tokio::test]
async fn test_create_agent_missing_name() {
    let ctx = TestContext::new();

    let response = ctx
        .request("POST", "/agents", Some(USER), Some(json!({ "description": "no name" })))
        .await;
    assert_eq!(response.status(), StatusCode::UNPROCESSABLE_ENTITY);
    assert_eq!(response.headers()["content-type"], "application/json");

    let body: serde_json::Value =
        serde_json::from_str(&common::body_text(response).await).unwrap();
    assert_eq!(body["error"], "validation_error");
    assert_eq!(body["details"][0]["field"], "body");
    assert!(body["details"][0]["message"]
        .as_str()
        .unwrap()
        .contains("missing field `name`"));
}

#[tokio::test]
async fn test_get_own_agent() {
    let ctx = TestContext::new();
    let agent_id = ctx.create_agent(USER, "Mine").await;

    let agent = ctx
        .json(
            "GET",
            &format!("/agents/{}", agent_id),
            Some(USER),
            None,
            StatusCode::OK,
        )
        .await;
    assert_eq!(agent["id"], agent_id.as_str());
}

#[tokio::test]
async fn test_foreign_agent_is_not_found() {
    let ctx = TestContext::new();
    let agent_id = ctx.create_agent(USER, "Private").await;

    let body = ctx
        .json(
            "GET",
            &format!("/agents/{}", agent_id),
            Some("did:privy:mallory"),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
    assert_eq!(body["error"], "not_found");
    assert_eq!(body["message"], "Agent not found");
}

#[tokio::test]
async fn test_unknown_agent_is_not_found() {
    let ctx = TestContext::new();

    ctx.json(
        "GET",
        "/agents/not-an-id",
        Some(USER),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}
