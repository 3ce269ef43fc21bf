//! Cart service: the requester's draft order and its lines.
//!
//! Every write runs in one transaction and ends with [`refresh_totals`], so
//! cached line subtotals and the order total always reflect current,
//! discount-aware product prices.

use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use tracing::{debug, instrument};

use shoppingify_core::cart::{AddressInput, order_total, validate_quantity};
use shoppingify_core::{OrderId, OrderItemId, Owner, ProductId, ValidationErrors};

use crate::db::RepositoryError;
use crate::db::orders::{self, OrderRepository};
use crate::models::order::{Cart, OrderAddress, OrderItem};

/// Errors from cart operations.
#[derive(Debug, thiserror::Error)]
pub enum CartError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid input: {0}")]
    Invalid(#[from] ValidationErrors),

    /// The line is not in the requester's cart.
    #[error("cart item not found")]
    ItemNotFound,
}

/// Re-cache every line subtotal and the order total from current prices.
///
/// Returns the lines with fresh subtotals and the new total.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn refresh_totals(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<(Vec<OrderItem>, Decimal), RepositoryError> {
    let mut items = orders::list_items(&mut *conn, order_id).await?;

    for item in &mut items {
        let subtotal = item.line().subtotal();
        if subtotal != item.subtotal {
            orders::set_item_subtotal(&mut *conn, item.id, subtotal).await?;
            item.subtotal = subtotal;
        }
    }

    let lines: Vec<_> = items.iter().map(OrderItem::line).collect();
    let total = order_total(&lines);
    orders::set_total(conn, order_id, total).await?;
    debug!(order_id = %order_id, %total, "Cart totals refreshed");

    Ok((items, total))
}

/// Cart operations scoped to one requester.
pub struct CartService<'a> {
    pool: &'a PgPool,
}

impl<'a> CartService<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// The requester's draft with lines, address and totals, created if absent.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn current(&self, owner: Owner) -> Result<Cart, CartError> {
        let mut tx = self.pool.begin().await?;
        let mut order = orders::get_or_create_draft(&mut tx, owner).await?;
        let (items, total) = refresh_totals(&mut tx, order.id).await?;
        order.total_amount = total;
        let address = orders::get_address(&mut tx, order.id).await?;
        tx.commit().await?;

        Ok(Cart {
            order,
            items,
            address,
            payment: None,
        })
    }

    /// Lines of the requester's draft.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn items(&self, owner: Owner) -> Result<Vec<OrderItem>, CartError> {
        Ok(self.current(owner).await?.items)
    }

    /// Add a product to the cart. An existing line for the product gets the
    /// new quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Invalid` for an unknown product or a bad quantity.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn add_item(
        &self,
        owner: Owner,
        product_id: ProductId,
        quantity: i32,
    ) -> Result<OrderItem, CartError> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;
        if !orders::product_exists(&mut tx, product_id).await? {
            return Err(ValidationErrors::field(
                "product_id",
                format!("Invalid pk \"{product_id}\" - object does not exist."),
            )
            .into());
        }

        let draft = orders::get_or_create_draft(&mut tx, owner).await?;
        let item_id = orders::upsert_item(&mut tx, draft.id, product_id, quantity).await?;
        let item = refreshed_item(&mut tx, draft.id, item_id).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Change a line's quantity.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the cart.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn update_item(
        &self,
        owner: Owner,
        item_id: OrderItemId,
        quantity: i32,
    ) -> Result<OrderItem, CartError> {
        validate_quantity(quantity)?;

        let mut tx = self.pool.begin().await?;
        let draft = orders::get_or_create_draft(&mut tx, owner).await?;
        if !orders::set_item_quantity(&mut tx, draft.id, item_id, quantity).await? {
            return Err(CartError::ItemNotFound);
        }
        let item = refreshed_item(&mut tx, draft.id, item_id).await?;
        tx.commit().await?;

        Ok(item)
    }

    /// Remove a line from the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::ItemNotFound` if the line is not in the cart.
    #[instrument(skip(self), fields(owner = %owner))]
    pub async fn remove_item(&self, owner: Owner, item_id: OrderItemId) -> Result<(), CartError> {
        let mut tx = self.pool.begin().await?;
        let draft = orders::get_or_create_draft(&mut tx, owner).await?;
        if !orders::delete_item(&mut tx, draft.id, item_id).await? {
            return Err(CartError::ItemNotFound);
        }
        refresh_totals(&mut tx, draft.id).await?;
        tx.commit().await?;
        Ok(())
    }

    /// Attach or replace the shipping address of the cart.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Invalid` with per-field messages.
    #[instrument(skip_all, fields(owner = %owner))]
    pub async fn set_address(
        &self,
        owner: Owner,
        address: &AddressInput,
    ) -> Result<OrderAddress, CartError> {
        address.validate()?;

        let mut tx = self.pool.begin().await?;
        let draft = orders::get_or_create_draft(&mut tx, owner).await?;
        let saved = orders::upsert_address(&mut tx, draft.id, address).await?;
        tx.commit().await?;
        Ok(saved)
    }

    /// Placed orders of the requester, newest first.
    ///
    /// # Errors
    ///
    /// Returns `CartError::Repository` if a query fails.
    pub async fn placed_orders(&self, owner: Owner) -> Result<Vec<Cart>, CartError> {
        Ok(OrderRepository::new(self.pool).list_placed(owner).await?)
    }
}

async fn refreshed_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item_id: OrderItemId,
) -> Result<OrderItem, CartError> {
    let (items, _) = refresh_totals(conn, order_id).await?;
    items
        .into_iter()
        .find(|item| item.id == item_id)
        .ok_or(CartError::ItemNotFound)
}
