//! Guest identities for anonymous shoppers.

use sqlx::{PgConnection, PgPool};

use shoppingify_core::GuestId;

use super::RepositoryError;

/// Repository for guest rows.
pub struct GuestRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> GuestRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Insert a fresh guest and return its token.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the insert fails.
    pub async fn create(&self) -> Result<GuestId, RepositoryError> {
        let id = GuestId::generate();
        sqlx::query("INSERT INTO guests (id) VALUES ($1)")
            .bind(id)
            .execute(self.pool)
            .await?;
        Ok(id)
    }

    /// Whether a guest with this token exists.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn exists(&self, id: GuestId) -> Result<bool, RepositoryError> {
        let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM guests WHERE id = $1")
            .bind(id)
            .fetch_optional(self.pool)
            .await?;
        Ok(found.is_some())
    }

    /// Delete guests older than `days` that no longer own a cart with items
    /// or a chat with messages.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the delete fails.
    pub async fn purge_stale(&self, days: i32) -> Result<u64, RepositoryError> {
        let result = sqlx::query(
            r"
            DELETE FROM guests g
            WHERE g.created_at < NOW() - make_interval(days => $1)
              AND NOT EXISTS (
                  SELECT 1 FROM orders o JOIN order_items i ON i.order_id = o.id
                  WHERE o.guest_id = g.id
              )
              AND NOT EXISTS (
                  SELECT 1 FROM chats c JOIN messages m ON m.chat_id = c.id
                  WHERE c.guest_id = g.id
              )
            ",
        )
        .bind(days)
        .execute(self.pool)
        .await?;
        Ok(result.rows_affected())
    }
}

/// Delete a guest inside a transaction. Its draft and chat cascade.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete(conn: &mut PgConnection, id: GuestId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM guests WHERE id = $1")
        .bind(id)
        .execute(conn)
        .await?;
    Ok(())
}
