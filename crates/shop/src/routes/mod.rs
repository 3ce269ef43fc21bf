//! HTTP route handlers for the shop API.
//!
//! # Route Structure
//!
//! ```text
//! GET  /health                          - Liveness
//! GET  /health/ready                    - Readiness (database ping)
//!
//! # Identity
//! POST /api/guests                      - Issue a guest token
//! POST /api/auth/register               - Create an account
//! POST /api/auth/login                  - Log in, merging the guest cart
//! POST /api/auth/logout                 - Log out
//! GET  /api/auth/session                - Session status
//! GET  /api/auth/profile                - Profile
//! PATCH /api/auth/profile               - Update profile
//!
//! # Catalog
//! GET  /api/products                    - Product listing with filters
//! GET  /api/products/{slug}             - Product detail
//! GET  /api/categories                  - Category listing
//! GET  /api/categories/{slug}           - Category with products
//!
//! # Cart (guests and users)
//! GET  /api/cart/current                - Current draft order
//! GET  /api/cart/items                  - Line items
//! POST /api/cart/items                  - Add or set a line
//! PATCH /api/cart/items/{id}            - Change quantity
//! DELETE /api/cart/items/{id}           - Remove a line
//! PUT  /api/cart/address                - Shipping address
//! POST /api/cart/checkout               - Place the order (users only)
//! GET  /api/orders                      - Placed orders
//! POST /api/payments/stripe/webhook     - Stripe events
//!
//! # Chat
//! GET  /api/chats/messages              - Own chat messages
//! POST /api/chats/messages              - Post a message
//! GET  /ws/chat                         - Live chat with assistant replies
//!
//! # Admin (staff only)
//! GET  /api/admin/chats                 - Inbox
//! GET  /api/admin/chats/{id}            - Chat detail
//! POST /api/admin/chats/{id}/messages   - Staff reply
//! GET  /ws/admin/chats/{id}             - Live staff socket
//! GET  /api/admin/search-index          - Index status
//! POST /api/admin/search-index/rebuild  - Schedule a rebuild
//! ```

pub mod admin;
pub mod auth;
pub mod cart;
pub mod catalog;
pub mod chat;
pub mod guests;
pub mod health;
pub mod payloads;
pub mod payments;
pub mod ws;

use axum::{
    Router,
    routing::{get, patch, post, put},
};

use crate::middleware::{api_rate_limiter, auth_rate_limiter};
use crate::state::AppState;

/// Create the auth routes router.
pub fn auth_routes() -> Router<AppState> {
    let limited = Router::new()
        .route("/register", post(auth::register))
        .route("/login", post(auth::login))
        .layer(auth_rate_limiter());

    Router::new()
        .merge(limited)
        .route("/logout", post(auth::logout))
        .route("/session", get(auth::session_status))
        .route("/profile", get(auth::profile).patch(auth::update_profile))
}

/// Create the catalog routes router.
pub fn catalog_routes() -> Router<AppState> {
    Router::new()
        .route("/products", get(catalog::list_products))
        .route("/products/{slug}", get(catalog::show_product))
        .route("/categories", get(catalog::list_categories))
        .route("/categories/{slug}", get(catalog::show_category))
}

/// Create the cart routes router.
pub fn cart_routes() -> Router<AppState> {
    Router::new()
        .route("/current", get(cart::current))
        .route("/items", get(cart::list_items).post(cart::add_item))
        .route(
            "/items/{id}",
            patch(cart::update_item).delete(cart::remove_item),
        )
        .route("/address", put(cart::set_address))
        .route("/checkout", post(cart::checkout))
}

/// Create the chat routes router.
pub fn chat_routes() -> Router<AppState> {
    Router::new().route(
        "/messages",
        get(chat::list_messages).merge(post(chat::create_message).layer(api_rate_limiter())),
    )
}

/// Create all routes for the shop.
pub fn routes() -> Router<AppState> {
    Router::new()
        .route("/health", get(health::health))
        .route("/health/ready", get(health::readiness))
        .route("/api/guests", post(guests::create))
        .nest("/api/auth", auth_routes())
        .nest("/api", catalog_routes())
        .nest("/api/cart", cart_routes())
        .route("/api/orders", get(cart::orders))
        .route(
            "/api/payments/stripe/webhook",
            post(payments::stripe_webhook),
        )
        .nest("/api/chats", chat_routes())
        .nest("/api/admin", admin::routes())
        .route("/ws/chat", get(ws::chat_socket))
        .route("/ws/admin/chats/{id}", get(ws::admin_chat_socket))
}
