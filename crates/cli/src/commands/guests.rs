//! Guest cleanup.

use shoppingify_shop::db::GuestRepository;

use super::connect;

/// Delete guests older than `days` that own nothing worth keeping.
///
/// # Errors
///
/// Returns an error if the database is unreachable or the delete fails.
pub async fn purge(days: i32) -> Result<(), Box<dyn std::error::Error>> {
    if days < 1 {
        return Err("--days must be at least 1".into());
    }

    let pool = connect().await?;
    let deleted = GuestRepository::new(&pool).purge_stale(days).await?;

    tracing::info!(deleted, days, "Stale guests purged");
    Ok(())
}
