//! Database operations for the shop `PostgreSQL` database.
//!
//! ## Tables
//!
//! - `users`, `guests` - Registered and anonymous identities
//! - `categories`, `discounts`, `products`, `product_files` - Catalog
//! - `orders`, `order_items`, `order_addresses`, `payments` - Carts and placed orders
//! - `chats`, `messages` - Support chat
//! - `tower_sessions.session` - Session storage (created by the session store)
//!
//! Queries are checked at runtime (`sqlx::query_as` with `FromRow` row types)
//! so the crate builds without a live database.
//!
//! Repositories borrow a pool for standalone reads and writes. Operations
//! that must share a transaction take `&mut PgConnection` instead, so callers
//! can pass `&mut *tx`.
//!
//! # Migrations
//!
//! Migrations are stored in `crates/shop/migrations/` and run via:
//! ```bash
//! cargo run -p shoppingify-cli -- migrate
//! ```

use std::time::Duration;

use secrecy::ExposeSecret;
use sqlx::PgPool;
use sqlx::postgres::PgPoolOptions;
use thiserror::Error;

pub mod catalog;
pub mod chat;
pub mod guests;
pub mod orders;
pub mod payments;
pub mod users;

pub use catalog::CatalogRepository;
pub use chat::ChatRepository;
pub use guests::GuestRepository;
pub use orders::OrderRepository;
pub use payments::PaymentRepository;
pub use users::UserRepository;

/// Errors that can occur during repository operations.
#[derive(Debug, Error)]
pub enum RepositoryError {
    /// Database error from sqlx.
    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    /// Data in the database is corrupted or invalid.
    #[error("data corruption: {0}")]
    DataCorruption(String),

    /// Requested entity was not found.
    #[error("not found")]
    NotFound,

    /// Constraint violation (e.g., unique email).
    #[error("constraint violation: {0}")]
    Conflict(String),
}

/// Whether `err` is a unique-constraint violation.
pub(crate) fn is_unique_violation(err: &sqlx::Error) -> bool {
    matches!(err, sqlx::Error::Database(db_err) if db_err.is_unique_violation())
}

/// Create a `PostgreSQL` connection pool with sensible defaults.
///
/// # Errors
///
/// Returns `sqlx::Error` if the connection cannot be established.
pub async fn create_pool(database_url: &secrecy::SecretString) -> Result<PgPool, sqlx::Error> {
    PgPoolOptions::new()
        .max_connections(10)
        .min_connections(2)
        .acquire_timeout(Duration::from_secs(10))
        .connect(database_url.expose_secret())
        .await
}
