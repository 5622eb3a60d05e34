//! Integration tests for the chat board.

mod common;

use axum::{
    body::Body,
    http::{Method, Request, StatusCode},
};
use common::{
    create_authenticated_user, delete_request_with_auth, get_request_with_auth,
    json_request_with_auth, parse_response_body, AuthenticatedUser, TestApp, TestUser,
};
use serde_json::{json, Value};

async fn post(app: &TestApp, user: &AuthenticatedUser, body: Value) -> Value {
    let response = app
        .send(json_request_with_auth(
            Method::POST,
            "/api/v1/chat/messages",
            body,
            &user.access_token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::CREATED);
    parse_response_body(response).await
}

#[tokio::test]
async fn test_chat_requires_authentication() {
    let app = TestApp::new();

    let response = app
        .send(
            Request::builder()
                .uri("/api/v1/chat/messages")
                .body(Body::empty())
                .unwrap(),
        )
        .await;
    assert_eq!(response.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
async fn test_post_carries_sender_names() {
    let app = TestApp::new();
    let user = TestUser::student();
    let auth = create_authenticated_user(&app, &user).await;

    let message = post(&app, &auth, json!({ "text": "  Is the lab open?  " })).await;
    assert_eq!(message["text"], "Is the lab open?");
    assert_eq!(message["sender_id"], auth.uid);
    assert_eq!(message["sender_first_name"], user.first_name);
    assert_eq!(message["sender_last_name"], user.last_name);
    assert!(message.get("reply_to_id").is_none());
}

#[tokio::test]
async fn test_empty_message_is_rejected() {
    let app = TestApp::new();
    let auth = create_authenticated_user(&app, &TestUser::student()).await;

    for text in ["", "    "] {
        let response = app
            .send(json_request_with_auth(
                Method::POST,
                "/api/v1/chat/messages",
                json!({ "text": text }),
                &auth.access_token,
            ))
            .await;
        assert_eq!(response.status(), StatusCode::BAD_REQUEST);
    }
}

#[tokio::test]
async fn test_reply_to_missing_message() {
    let app = TestApp::new();
    let auth = create_authenticated_user(&app, &TestUser::student()).await;

    let response = app
        .send(json_request_with_auth(
            Method::POST,
            "/api/v1/chat/messages",
            json!({ "text": "hello", "reply_to_id": uuid::Uuid::new_v4() }),
            &auth.access_token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);
}

#[tokio::test]
async fn test_replies_are_threaded_under_root() {
    let app = TestApp::new();
    let jane = create_authenticated_user(&app, &TestUser::student()).await;
    let john = create_authenticated_user(&app, &TestUser::student()).await;

    let root = post(&app, &jane, json!({ "text": "Physics lab tomorrow?" })).await;
    let reply = post(&app, &john, json!({ "text": "Yes", "reply_to_id": root["id"] })).await;
    let nested = post(&app, &jane, json!({ "text": "Thanks", "reply_to_id": reply["id"] })).await;

    let response = app
        .send(get_request_with_auth("/api/v1/chat/messages", &john.access_token))
        .await;
    assert_eq!(response.status(), StatusCode::OK);

    let threads = parse_response_body(response).await;
    assert_eq!(threads.as_array().unwrap().len(), 1);
    assert_eq!(threads[0]["root"]["id"], root["id"]);

    let replies = threads[0]["replies"].as_array().unwrap();
    assert_eq!(replies.len(), 2);
    assert_eq!(replies[0]["id"], reply["id"]);
    assert_eq!(replies[1]["id"], nested["id"]);
}

#[tokio::test]
async fn test_only_sender_or_staff_can_delete() {
    let app = TestApp::new();
    let jane = create_authenticated_user(&app, &TestUser::student()).await;
    let john = create_authenticated_user(&app, &TestUser::student()).await;
    let teacher = create_authenticated_user(&app, &TestUser::staff()).await;

    let first = post(&app, &jane, json!({ "text": "first" })).await;
    let second = post(&app, &jane, json!({ "text": "second" })).await;

    let uri = format!("/api/v1/chat/messages/{}", first["id"].as_str().unwrap());
    let response = app.send(delete_request_with_auth(&uri, &john.access_token)).await;
    assert_eq!(response.status(), StatusCode::FORBIDDEN);

    let response = app.send(delete_request_with_auth(&uri, &teacher.access_token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app.send(delete_request_with_auth(&uri, &jane.access_token)).await;
    assert_eq!(response.status(), StatusCode::NOT_FOUND);

    let uri = format!("/api/v1/chat/messages/{}", second["id"].as_str().unwrap());
    let response = app.send(delete_request_with_auth(&uri, &jane.access_token)).await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(get_request_with_auth("/api/v1/chat/messages", &jane.access_token))
        .await;
    let threads = parse_response_body(response).await;
    assert!(threads.as_array().unwrap().is_empty());
}

#[tokio::test]
async fn test_deleting_root_removes_its_replies() {
    let app = TestApp::new();
    let jane = create_authenticated_user(&app, &TestUser::student()).await;
    let john = create_authenticated_user(&app, &TestUser::student()).await;

    let root = post(&app, &jane, json!({ "text": "root" })).await;
    post(&app, &john, json!({ "text": "reply", "reply_to_id": root["id"] })).await;

    let response = app
        .send(delete_request_with_auth(
            &format!("/api/v1/chat/messages/{}", root["id"].as_str().unwrap()),
            &jane.access_token,
        ))
        .await;
    assert_eq!(response.status(), StatusCode::NO_CONTENT);

    let response = app
        .send(get_request_with_auth("/api/v1/chat/messages", &john.access_token))
        .await;
    let threads = parse_response_body(response).await;
    assert!(threads.as_array().unwrap().is_empty());
}
