//! Cart flows against a running shop server.
//!
//! These tests require:
//! - A migrated `PostgreSQL` database (shoppingify-cli migrate)
//! - The shop server running (cargo run -p shoppingify-shop)
//! - A seeded catalog (shoppingify-cli seed products --from-dummyjson)

use reqwest::StatusCode;
use serde_json::{Value, json};
use shoppingify_integration_tests::{
    any_product_id, base_url, register_and_login, session_client, unique_email,
};

const PASSWORD: &str = "integration-pass-1";

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_guest_cart_add_update_remove() {
    let client = session_client();
    let base_url = base_url();
    let product_id = any_product_id(&client).await;

    let resp = client
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product": product_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let item: Value = resp.json().await.expect("Failed to read item");
    assert_eq!(item["quantity"], 2);
    let item_id = item["id"].as_i64().expect("item id");

    let resp = client
        .patch(format!("{base_url}/api/cart/items/{item_id}"))
        .json(&json!({ "quantity": 3 }))
        .send()
        .await
        .expect("Failed to update item");
    assert_eq!(resp.status(), StatusCode::OK);

    let cart: Value = client
        .get(format!("{base_url}/api/cart/current"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read cart");
    assert_eq!(cart["status"], "draft");
    assert_eq!(cart["items"][0]["quantity"], 3);

    let resp = client
        .delete(format!("{base_url}/api/cart/items/{item_id}"))
        .send()
        .await
        .expect("Failed to remove item");
    assert_eq!(resp.status(), StatusCode::NO_CONTENT);
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_explicit_guest_header_shares_cart() {
    let base_url = base_url();
    let first = session_client();

    let resp = first
        .post(format!("{base_url}/api/guests"))
        .send()
        .await
        .expect("Failed to create guest");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let guest: Value = resp.json().await.expect("Failed to read guest");
    let guest_id = guest["guest_id"].as_str().expect("guest id").to_owned();

    let product_id = any_product_id(&first).await;
    first
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product": product_id }))
        .send()
        .await
        .expect("Failed to add item");

    // A cookie-less client presenting the same token sees the same draft.
    let second = reqwest::Client::new();
    let cart: Value = second
        .get(format!("{base_url}/api/cart/current"))
        .header("X-Guest-Id", &guest_id)
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read cart");
    assert_eq!(cart["items"][0]["product"]["id"], product_id);
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_login_merges_guest_cart() {
    let client = session_client();
    let base_url = base_url();
    let product_id = any_product_id(&client).await;

    client
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product": product_id, "quantity": 4 }))
        .send()
        .await
        .expect("Failed to add item");

    register_and_login(&client, &unique_email(), PASSWORD).await;

    let cart: Value = client
        .get(format!("{base_url}/api/cart/current"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read cart");
    let items = cart["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 4);
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_checkout_requires_login() {
    let client = session_client();
    let resp = client
        .post(format!("{}/api/cart/checkout", base_url()))
        .json(&json!({}))
        .send()
        .await
        .expect("Failed to post checkout");
    assert_eq!(resp.status(), StatusCode::UNAUTHORIZED);
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_checkout_empty_cart_is_rejected() {
    let client = session_client();
    let base_url = base_url();
    register_and_login(&client, &unique_email(), PASSWORD).await;

    let resp = client
        .post(format!("{base_url}/api/cart/checkout"))
        .json(&json!({
            "address": {
                "street": "1 Main St",
                "city": "Springfield",
                "zip_code": "12345",
                "country": "US",
                "phone": "+15555550100"
            },
            "payment": { "method": "cash_on_delivery" }
        }))
        .send()
        .await
        .expect("Failed to post checkout");
    assert_eq!(resp.status(), StatusCode::BAD_REQUEST);
    let body: Value = resp.json().await.expect("Failed to read errors");
    assert_eq!(body["items"][0], "Cart is empty.");
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_checkout_places_order_and_opens_empty_draft() {
    let client = session_client();
    let base_url = base_url();
    register_and_login(&client, &unique_email(), PASSWORD).await;
    let product_id = any_product_id(&client).await;

    let resp = client
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product": product_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");
    assert_eq!(resp.status(), StatusCode::CREATED);

    let resp = client
        .post(format!("{base_url}/api/cart/checkout"))
        .json(&json!({
            "address": {
                "street": "1 Main St",
                "city": "Springfield",
                "zip_code": "12345",
                "country": "US",
                "phone": "+15555550100"
            },
            "payment": { "method": "cash_on_delivery" }
        }))
        .send()
        .await
        .expect("Failed to post checkout");
    assert_eq!(resp.status(), StatusCode::CREATED);
    let placed: Value = resp.json().await.expect("Failed to read order");
    assert_eq!(placed["status"], "processing");
    assert_eq!(placed["items"][0]["quantity"], 2);

    let cart: Value = client
        .get(format!("{base_url}/api/cart/current"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read cart");
    assert_eq!(cart["status"], "draft");
    assert_ne!(cart["id"], placed["id"]);
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));

    let orders: Value = client
        .get(format!("{base_url}/api/orders"))
        .send()
        .await
        .expect("Failed to list orders")
        .json()
        .await
        .expect("Failed to read orders");
    assert_eq!(orders[0]["id"], placed["id"]);
}

#[tokio::test]
#[ignore = "Requires running shop server and database"]
async fn test_login_sums_colliding_lines_and_retires_guest() {
    let base_url = base_url();
    let email = unique_email();

    // The account already holds the product in its own draft.
    let member = session_client();
    register_and_login(&member, &email, PASSWORD).await;
    let product_id = any_product_id(&member).await;
    member
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product": product_id, "quantity": 2 }))
        .send()
        .await
        .expect("Failed to add item");

    let visitor = session_client();
    let guest: Value = visitor
        .post(format!("{base_url}/api/guests"))
        .send()
        .await
        .expect("Failed to create guest")
        .json()
        .await
        .expect("Failed to read guest");
    let guest_id = guest["guest_id"].as_str().expect("guest id").to_owned();
    visitor
        .post(format!("{base_url}/api/cart/items"))
        .json(&json!({ "product": product_id, "quantity": 3 }))
        .send()
        .await
        .expect("Failed to add item");

    let resp = visitor
        .post(format!("{base_url}/api/auth/login"))
        .json(&json!({ "email": email, "password": PASSWORD }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), StatusCode::OK);

    let cart: Value = visitor
        .get(format!("{base_url}/api/cart/current"))
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read cart");
    let items = cart["items"].as_array().expect("items");
    assert_eq!(items.len(), 1);
    assert_eq!(items[0]["quantity"], 5);

    // The old token no longer resolves, so a fresh guest with an empty cart
    // is issued instead.
    let stranger = reqwest::Client::new();
    let cart: Value = stranger
        .get(format!("{base_url}/api/cart/current"))
        .header("X-Guest-Id", &guest_id)
        .send()
        .await
        .expect("Failed to get cart")
        .json()
        .await
        .expect("Failed to read cart");
    assert_eq!(cart["items"].as_array().map(Vec::len), Some(0));
}
