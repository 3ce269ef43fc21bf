//! Integration tests for Shoppingify.
//!
//! # Running Tests
//!
//! ```bash
//! # Migrate the database and start the shop server
//! cargo run -p shoppingify-cli -- migrate
//! cargo run -p shoppingify-shop
//!
//! # Run integration tests (they are ignored by default)
//! cargo test -p shoppingify-integration-tests -- --ignored
//! ```
//!
//! The server address comes from `SHOP_BASE_URL` and defaults to
//! `http://localhost:8000`. Catalog tests expect at least one product, e.g.
//! after `shoppingify-cli seed products --from-dummyjson`.

use reqwest::Client;
use serde_json::Value;
use uuid::Uuid;

/// Base URL of the running shop server.
#[must_use]
pub fn base_url() -> String {
    std::env::var("SHOP_BASE_URL").unwrap_or_else(|_| "http://localhost:8000".to_string())
}

/// Client that keeps the session cookie between requests.
///
/// # Panics
///
/// Panics if the HTTP client cannot be built.
#[must_use]
pub fn session_client() -> Client {
    Client::builder()
        .cookie_store(true)
        .build()
        .expect("Failed to create HTTP client")
}

/// Unique email for a throwaway account.
#[must_use]
pub fn unique_email() -> String {
    format!("it-{}@example.com", Uuid::new_v4().simple())
}

/// Register an account and log the client in.
///
/// # Panics
///
/// Panics if registration or login does not succeed.
pub async fn register_and_login(client: &Client, email: &str, password: &str) -> Value {
    let base_url = base_url();

    let resp = client
        .post(format!("{base_url}/api/auth/register"))
        .json(&serde_json::json!({
            "email": email,
            "password1": password,
            "password2": password,
            "first_name": "Integration",
            "last_name": "Test",
        }))
        .send()
        .await
        .expect("Failed to register");
    assert_eq!(resp.status(), 201, "registration failed");

    let resp = client
        .post(format!("{base_url}/api/auth/login"))
        .json(&serde_json::json!({ "email": email, "password": password }))
        .send()
        .await
        .expect("Failed to log in");
    assert_eq!(resp.status(), 200, "login failed");
    resp.json().await.expect("Failed to read profile")
}

/// Id of any product in the catalog.
///
/// # Panics
///
/// Panics if the catalog is empty.
pub async fn any_product_id(client: &Client) -> i64 {
    let products: Value = client
        .get(format!("{}/api/products", base_url()))
        .send()
        .await
        .expect("Failed to list products")
        .json()
        .await
        .expect("Failed to read products");

    products[0]["id"]
        .as_i64()
        .expect("Catalog is empty; seed it first")
}
