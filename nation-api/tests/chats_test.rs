/// Chat thread endpoint tests

mod common;

use axum::http::StatusCode;
use common::{TestContext, USER};
use serde_json::json;

const OTHER: &str = "did:privy:bob";

#[tokio::test]
async fn test_create_chat_starts_empty() {
    let ctx = TestContext::new();
    let agent_id = ctx.create_agent(USER, "Helper").await;

    let chat = ctx
        .json(
            "POST",
            &format!("/agents/{}/chats", agent_id),
            Some(USER),
            None,
            StatusCode::OK,
        )
        .await;

    assert_eq!(chat["agent_id"], agent_id.as_str());
    assert_eq!(chat["user_id"], USER);
    assert_eq!(chat["summary"], "");
    assert_eq!(chat["rounds"], 0);
}

#[tokio::test]
async fn test_create_chat_for_missing_agent() {
    let ctx = TestContext::new();

    let body = ctx
        .json(
            "POST",
            "/agents/missing/chats",
            Some(USER),
            None,
            StatusCode::NOT_FOUND,
        )
        .await;
    assert_eq!(body["message"], "Agent missing not found");
}

#[tokio::test]
async fn test_chats_are_isolated_per_user_and_agent() {
    let ctx = TestContext::new();
    let agent_a = ctx.create_agent(USER, "A").await;
    let agent_b = ctx.create_agent(USER, "B").await;

    let mine = ctx.create_chat(USER, &agent_a).await;
    ctx.create_chat(OTHER, &agent_a).await;
    ctx.create_chat(USER, &agent_b).await;

    let chats = ctx
        .json(
            "GET",
            &format!("/agents/{}/chats", agent_a),
            Some(USER),
            None,
            StatusCode::OK,
        )
        .await;
    let chats = chats.as_array().unwrap();
    assert_eq!(chats.len(), 1);
    assert_eq!(chats[0]["id"], mine.as_str());

    // Another user cannot see the chat
    ctx.json(
        "GET",
        &format!("/agents/{}/chats/{}", agent_a, mine),
        Some(OTHER),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;

    // Nor can it be reached through another agent
    ctx.json(
        "GET",
        &format!("/agents/{}/chats/{}", agent_b, mine),
        Some(USER),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn test_list_chats_most_recent_first() {
    let ctx = TestContext::new();
    let agent_id = ctx.create_agent(USER, "Helper").await;

    let older = ctx.create_chat(USER, &agent_id).await;
    let newer = ctx.create_chat(USER, &agent_id).await;

    // Sending to the older chat moves it to the front
    ctx.send(USER, &agent_id, &older, "bump").await;

    let chats = ctx
        .json(
            "GET",
            &format!("/agents/{}/chats", agent_id),
            Some(USER),
            None,
            StatusCode::OK,
        )
        .await;
    let ids: Vec<&str> = chats
        .as_array()
        .unwrap()
        .iter()
        .map(|c| c["id"].as_str().unwrap())
        .collect();
    assert_eq!(ids, vec![older.as_str(), newer.as_str()]);
}

#[tokio::test]
async fn test_update_chat_summary() {
    let ctx = TestContext::new();
    let agent_id = ctx.create_agent(USER, "Helper").await;
    let chat_id = ctx.create_chat(USER, &agent_id).await;
    let uri = format!("/agents/{}/chats/{}", agent_id, chat_id);

    let chat = ctx
        .json(
            "PATCH",
            &uri,
            Some(USER),
            Some(json!({ "summary": "Trip planning" })),
            StatusCode::OK,
        )
        .await;
    assert_eq!(chat["summary"], "Trip planning");

    // Without a body the chat comes back unchanged
    let chat = ctx.json("PATCH", &uri, Some(USER), None, StatusCode::OK).await;
    assert_eq!(chat["summary"], "Trip planning");

    ctx.json(
        "PATCH",
        &uri,
        Some(USER),
        Some(json!({ "summary": "x".repeat(1001) })),
        StatusCode::UNPROCESSABLE_ENTITY,
    )
    .await;

    // A body of the wrong shape is rejected, not ignored
    let body = ctx
        .json(
            "PATCH",
            &uri,
            Some(USER),
            Some(json!({ "summary": 123 })),
            StatusCode::UNPROCESSABLE_ENTITY,
        )
        .await;
    assert_eq!(body["error"], "validation_error");

    let chat = ctx.json("GET", &uri, Some(USER), None, StatusCode::OK).await;
    assert_eq!(chat["summary"], "Trip planning");

    ctx.json(
        "PATCH",
        &uri,
        Some(OTHER),
        Some(json!({ "summary": "hijack" })),
        StatusCode::NOT_FOUND,
    )
    .await;
}

#[tokio::test]
async fn test_delete_chat_removes_messages() {
    let ctx = TestContext::new();
    let agent_id = ctx.create_agent(USER, "Helper").await;
    let chat_id = ctx.create_chat(USER, &agent_id).await;
    let replies = ctx.send(USER, &agent_id, &chat_id, "hello").await;
    let reply_id = replies[0]["id"].as_str().unwrap().to_string();

    let uri = format!("/agents/{}/chats/{}", agent_id, chat_id);

    // Only the owner may delete
    ctx.json("DELETE", &uri, Some(OTHER), None, StatusCode::NOT_FOUND)
        .await;

    let response = ctx.request("DELETE", &uri, Some(USER), None).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    ctx.json("GET", &uri, Some(USER), None, StatusCode::NOT_FOUND)
        .await;
    ctx.json(
        "GET",
        &format!("{}/messages", uri),
        Some(USER),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    ctx.json(
        "GET",
        &format!("/messages/{}", reply_id),
        Some(USER),
        None,
        StatusCode::NOT_FOUND,
    )
    .await;
    assert!(ctx.store.get_message(&reply_id).await.unwrap().is_none());

    ctx.json("DELETE", &uri, Some(USER), None, StatusCode::NOT_FOUND)
        .await;
}
