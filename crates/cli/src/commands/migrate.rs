//! Database migration command.
//!
//! # Usage
//!
//! ```bash
//! shoppingify-cli migrate
//! ```
//!
//! # Environment Variables
//!
//! - `SHOP_DATABASE_URL` (or `DATABASE_URL`) - `PostgreSQL` connection string
//!
//! # Migration Files
//!
//! Schema migrations live in `crates/shop/migrations/`. The session table is
//! owned by `tower-sessions-sqlx-store` and created by its own migration.

use thiserror::Error;
use tower_sessions_sqlx_store::PostgresStore;

use super::{CommandError, connect};

/// Errors that can occur while migrating.
#[derive(Debug, Error)]
pub enum MigrationError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Migration error: {0}")]
    Migration(#[from] sqlx::migrate::MigrateError),

    #[error("Session store migration error: {0}")]
    SessionStore(#[from] sqlx::Error),
}

/// Run schema and session store migrations.
///
/// # Errors
///
/// Returns an error if the database is unreachable or a migration fails.
pub async fn run() -> Result<(), MigrationError> {
    let pool = connect().await?;

    tracing::info!("Running shop migrations...");
    sqlx::migrate!("../shop/migrations").run(&pool).await?;

    tracing::info!("Running session store migrations...");
    PostgresStore::new(pool.clone()).migrate().await?;

    tracing::info!("Migrations complete!");
    Ok(())
}
