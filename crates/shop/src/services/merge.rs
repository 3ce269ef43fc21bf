//! Guest-to-user reconciliation on login.
//!
//! Runs in one transaction: the guest's draft order and chat are folded into
//! the user's, then the guest row is deleted. Afterwards the user has exactly
//! one draft.

use sqlx::{Connection, PgConnection, PgPool};
use tracing::{info, instrument, warn};

use shoppingify_core::cart::{LineQuantity, LoginMerge, merge_lines};
use shoppingify_core::{GuestId, OrderId, Owner, UserId};

use crate::db::{RepositoryError, chat, guests, is_unique_violation, orders};
use crate::models::order::OrderItem;
use crate::services::cart::refresh_totals;

/// What the login merge did to the carts.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct MergeOutcome {
    pub plan: LoginMerge,
    /// Number of guest lines carried over.
    pub moved_lines: usize,
}

fn quantities(items: &[OrderItem]) -> Vec<LineQuantity> {
    items
        .iter()
        .map(|item| LineQuantity {
            product_id: item.product_id,
            quantity: item.quantity,
        })
        .collect()
}

/// Move everything a guest owns to `user`, then delete the guest.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if any step fails; nothing is applied
/// in that case.
#[instrument(skip(pool), fields(guest = %guest, user = %user))]
pub async fn merge_guest_into_user(
    pool: &PgPool,
    guest: GuestId,
    user: UserId,
) -> Result<MergeOutcome, RepositoryError> {
    let guest_owner = Owner::Guest(guest);
    let user_owner = Owner::User(user);

    let mut tx = pool.begin().await?;

    let user_draft = orders::lock_draft(&mut tx, user_owner).await?;
    let guest_draft = orders::lock_draft(&mut tx, guest_owner).await?;
    let planned = LoginMerge::plan(user_draft.is_some(), guest_draft.is_some());

    let (plan, moved_lines) = match (planned, user_draft, guest_draft) {
        (LoginMerge::AdoptGuestDraft, _, Some(guest_draft)) => {
            adopt_guest_draft(&mut tx, guest_draft.id, user).await?
        }
        (LoginMerge::MergeIntoUserDraft, Some(user_draft), Some(guest_draft)) => {
            let moved = fold_into(&mut tx, user_draft.id, guest_draft.id).await?;
            (planned, moved)
        }
        _ => (planned, 0),
    };

    chat::migrate_guest_chat(&mut tx, guest, user).await?;
    guests::delete(&mut tx, guest).await?;

    tx.commit().await?;

    info!(?plan, moved_lines, "Guest merged into user");
    Ok(MergeOutcome { plan, moved_lines })
}

/// Hand the guest draft to `user`.
///
/// The user had no draft when the plan was made, but a concurrent request
/// may open one before the reassignment lands. The draft unique index then
/// rejects the update, and the guest lines are folded into that draft.
async fn adopt_guest_draft(
    conn: &mut PgConnection,
    guest_draft: OrderId,
    user: UserId,
) -> Result<(LoginMerge, usize), RepositoryError> {
    let user_owner = Owner::User(user);
    let moved = orders::list_items(&mut *conn, guest_draft).await?.len();

    let mut savepoint = Connection::begin(&mut *conn).await?;
    match orders::reassign(&mut savepoint, guest_draft, user_owner).await {
        Ok(()) => {
            savepoint.commit().await?;
            refresh_totals(&mut *conn, guest_draft).await?;
            Ok((LoginMerge::AdoptGuestDraft, moved))
        }
        Err(RepositoryError::Database(e)) if is_unique_violation(&e) => {
            savepoint.rollback().await?;
            warn!(%user, "User draft appeared during login; merging instead");

            let user_draft = orders::lock_draft(&mut *conn, user_owner)
                .await?
                .ok_or_else(|| {
                    RepositoryError::DataCorruption("user draft vanished under lock".to_owned())
                })?;
            let moved = fold_into(conn, user_draft.id, guest_draft).await?;
            Ok((LoginMerge::MergeIntoUserDraft, moved))
        }
        Err(e) => Err(e),
    }
}

/// Sum the guest draft's lines into the user draft and delete the guest
/// draft. Returns the number of guest lines.
async fn fold_into(
    conn: &mut PgConnection,
    user_draft: OrderId,
    guest_draft: OrderId,
) -> Result<usize, RepositoryError> {
    let existing = quantities(&orders::list_items(&mut *conn, user_draft).await?);
    let incoming = quantities(&orders::list_items(&mut *conn, guest_draft).await?);

    orders::delete(&mut *conn, guest_draft).await?;
    for line in merge_lines(&existing, &incoming) {
        orders::upsert_item(&mut *conn, user_draft, line.product_id, line.quantity).await?;
    }
    refresh_totals(&mut *conn, user_draft).await?;
    Ok(incoming.len())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use shoppingify_core::ProductId;

    use super::*;

    async fn seed_owners(pool: &PgPool) -> (UserId, GuestId, ProductId) {
        let user: i32 = sqlx::query_scalar(
            "INSERT INTO users (email, password_hash) VALUES ('merge@example.com', 'x') RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        let guest = GuestId::generate();
        sqlx::query("INSERT INTO guests (id) VALUES ($1)")
            .bind(guest)
            .execute(pool)
            .await
            .unwrap();
        let product: i32 = sqlx::query_scalar(
            "INSERT INTO products (name, slug, price) VALUES ('Lamp', 'lamp', 10.00) RETURNING id",
        )
        .fetch_one(pool)
        .await
        .unwrap();
        (UserId::new(user), guest, ProductId::new(product))
    }

    #[sqlx::test]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_both_drafts_merge_and_guest_is_deleted(pool: PgPool) {
        let (user, guest, lamp) = seed_owners(&pool).await;
        let mut conn = pool.acquire().await.unwrap();
        let user_draft = orders::get_or_create_draft(&mut conn, Owner::User(user)).await.unwrap();
        let guest_draft = orders::get_or_create_draft(&mut conn, Owner::Guest(guest)).await.unwrap();
        orders::upsert_item(&mut conn, user_draft.id, lamp, 2).await.unwrap();
        orders::upsert_item(&mut conn, guest_draft.id, lamp, 3).await.unwrap();
        drop(conn);

        let outcome = merge_guest_into_user(&pool, guest, user).await.unwrap();
        assert_eq!(outcome.plan, LoginMerge::MergeIntoUserDraft);

        let mut conn = pool.acquire().await.unwrap();
        let items = orders::list_items(&mut conn, user_draft.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].quantity, 5);
        assert!(!guests::GuestRepository::new(&pool).exists(guest).await.unwrap());
    }

    #[sqlx::test]
    #[ignore = "Requires PostgreSQL (DATABASE_URL)"]
    async fn test_adopt_falls_back_to_merge_when_user_draft_appears(pool: PgPool) {
        let (user, guest, lamp) = seed_owners(&pool).await;
        let mut tx = pool.begin().await.unwrap();
        let guest_draft = orders::get_or_create_draft(&mut tx, Owner::Guest(guest)).await.unwrap();
        orders::upsert_item(&mut tx, guest_draft.id, lamp, 1).await.unwrap();
        // Opened after the plan chose adoption.
        let user_draft = orders::get_or_create_draft(&mut tx, Owner::User(user)).await.unwrap();

        let (plan, moved) = adopt_guest_draft(&mut tx, guest_draft.id, user).await.unwrap();
        assert_eq!(plan, LoginMerge::MergeIntoUserDraft);
        assert_eq!(moved, 1);

        let items = orders::list_items(&mut tx, user_draft.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].product_id, lamp);
        assert!(orders::find_draft(&mut tx, Owner::Guest(guest)).await.unwrap().is_none());
    }
}
