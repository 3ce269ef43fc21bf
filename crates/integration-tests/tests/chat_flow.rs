//! Chat and session flows against a running shop server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (shoppingify-cli migrate)
//! - The shop server running (cargo run -p shoppingify-shop)

use reqwest::StatusCode;
use serde_json::{Value, json};
use shoppingify_integration_tests::{base_url, register_and_login, session_client, unique_email};

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_guest_chat_messages() {
    let client = session_client();
    let base_url = base_url();

    let resp = client
        .post(format!("{base_url}/api/chats/messages"))
        .json(&json!({ "content": "  Do you ship to Canada?  " }))
        .send()
        .await
        .expect("Failed to post message");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let message: Value = resp.json().await.expect("Failed to read message");
    assert_eq!(message["content"], "Do you ship to Canada?");

    let messages: Value = client
        .get(format!("{base_url}/api/chats/messages"))
        .send()
        .await
        .expect("Failed to list messages")
        .json()
        .await
        .expect("Failed to read messages");
    assert_eq!(messages[0]["content"], "Do you ship to Canada?");
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_blank_chat_message_is_rejected() {
    let client = session_client();
    let resp = client
        .post(format!("{}/api/chats/messages", base_url()))
        .json(&json!({ "content": "   " }))
        .send()
        .await
        .expect("Failed to post message");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_session_lifecycle() {
    let client = session_client();
    let base_url = base_url();

    let resp = client
        .get(format!("{base_url}/api/auth/session"))
        .send()
        .await
        .expect("Failed to get session");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);

    let email = unique_email();
    let profile = register_and_login(&client, &email, "integration-pass-1").await;
    assert_eq!(profile["email"], email.as_str());
    assert_eq!(profile["is_admin"], false);

    let resp = client
        .get(format!("{base_url}/api/auth/session"))
        .send()
        .await
        .expect("Failed to get session");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base_url}/api/auth/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::OK);

    let resp = client
        .post(format!("{base_url}/api/auth/logout"))
        .send()
        .await
        .expect("Failed to log out");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_admin_inbox_rejects_customers() {
    let client = session_client();
    register_and_login(&client, &unique_email(), "integration-pass-1").await;

    let resp = client
        .get(format!("{}/api/admin/chats", base_url()))
        .send()
        .await
        .expect("Failed to get inbox");
    assert_eq!(resp.status(), StatusCode::FORBIDDEN);
}
