//! Order repository: drafts (carts), lines, addresses and placed orders.
//!
//! Cart mutations are free functions over `&mut PgConnection` so the cart
//! and checkout services can compose them inside one transaction.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::{PgConnection, PgPool};
use uuid::Uuid;

use shoppingify_core::cart::AddressInput;
use shoppingify_core::{
    AddressId, GuestId, OrderId, OrderItemId, OrderStatus, Owner, ProductId, UserId,
};

use super::RepositoryError;
use crate::models::order::{Cart, Order, OrderAddress, OrderItem};

const ORDER_COLUMNS: &str = "id, user_id, guest_id, status, total_amount, created_at, updated_at";

const ITEM_SELECT: &str = r"
    SELECT i.id, i.order_id, i.product_id, i.quantity, i.subtotal,
           p.slug AS product_slug, p.name AS product_name,
           ROUND(p.price * (1 - COALESCE(CASE WHEN d.active THEN d.percent END, 0) / 100), 2)
               AS current_price,
           ARRAY(
               SELECT f.file FROM product_files f
               WHERE f.product_id = p.id
               ORDER BY f.position, f.id
           ) AS product_files
    FROM order_items i
    JOIN products p ON p.id = i.product_id
    LEFT JOIN discounts d ON d.id = p.discount_id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: i32,
    user_id: Option<i32>,
    guest_id: Option<Uuid>,
    status: OrderStatus,
    total_amount: Decimal,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
}

impl TryFrom<OrderRow> for Order {
    type Error = RepositoryError;

    fn try_from(row: OrderRow) -> Result<Self, Self::Error> {
        let owner = Owner::from_columns(
            row.user_id.map(UserId::new),
            row.guest_id.map(GuestId::from_uuid),
        )
        .ok_or_else(|| {
            RepositoryError::DataCorruption(format!("order {} has no single owner", row.id))
        })?;

        Ok(Self {
            id: OrderId::new(row.id),
            owner,
            status: row.status,
            total_amount: row.total_amount,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: i32,
    order_id: i32,
    product_id: i32,
    quantity: i32,
    subtotal: Decimal,
    product_slug: String,
    product_name: String,
    current_price: Decimal,
    product_files: Vec<String>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        Self {
            id: OrderItemId::new(row.id),
            order_id: OrderId::new(row.order_id),
            product_id: ProductId::new(row.product_id),
            product_slug: row.product_slug,
            product_name: row.product_name,
            product_files: row.product_files,
            quantity: row.quantity,
            current_price: row.current_price,
            subtotal: row.subtotal,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct AddressRow {
    id: i32,
    order_id: i32,
    street: String,
    city: String,
    zip_code: String,
    country: String,
    phone: String,
}

impl From<AddressRow> for OrderAddress {
    fn from(row: AddressRow) -> Self {
        Self {
            id: AddressId::new(row.id),
            order_id: OrderId::new(row.order_id),
            street: row.street,
            city: row.city,
            zip_code: row.zip_code,
            country: row.country,
            phone: row.phone,
        }
    }
}

// =============================================================================
// Repository (pool-level reads)
// =============================================================================

/// Repository for order reads that need no transaction.
pub struct OrderRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> OrderRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// Placed (non-draft) orders of `owner`, newest first, with their lines.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if a query fails.
    pub async fn list_placed(&self, owner: Owner) -> Result<Vec<Cart>, RepositoryError> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            r"
            SELECT {ORDER_COLUMNS} FROM orders
            WHERE user_id IS NOT DISTINCT FROM $1
              AND guest_id IS NOT DISTINCT FROM $2
              AND status <> 'draft'
            ORDER BY created_at DESC, id DESC
            "
        ))
        .bind(owner.user_id())
        .bind(owner.guest_id())
        .fetch_all(self.pool)
        .await?;

        let mut conn = self.pool.acquire().await?;
        let mut orders = Vec::with_capacity(rows.len());
        for row in rows {
            orders.push(load_cart(&mut conn, row.try_into()?).await?);
        }
        Ok(orders)
    }
}

// =============================================================================
// Draft lookup
// =============================================================================

/// The owner's draft, if any.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn find_draft(
    conn: &mut PgConnection,
    owner: Owner,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        SELECT {ORDER_COLUMNS} FROM orders
        WHERE user_id IS NOT DISTINCT FROM $1
          AND guest_id IS NOT DISTINCT FROM $2
          AND status = 'draft'
        "
    ))
    .bind(owner.user_id())
    .bind(owner.guest_id())
    .fetch_optional(conn)
    .await?;

    row.map(Order::try_from).transpose()
}

/// The owner's draft row, locked `FOR UPDATE` until the transaction ends.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn lock_draft(
    conn: &mut PgConnection,
    owner: Owner,
) -> Result<Option<Order>, RepositoryError> {
    let row = sqlx::query_as::<_, OrderRow>(&format!(
        r"
        SELECT {ORDER_COLUMNS} FROM orders
        WHERE user_id IS NOT DISTINCT FROM $1
          AND guest_id IS NOT DISTINCT FROM $2
          AND status = 'draft'
        FOR UPDATE
        "
    ))
    .bind(owner.user_id())
    .bind(owner.guest_id())
    .fetch_optional(conn)
    .await?;

    row.map(Order::try_from).transpose()
}

/// Return the owner's draft, creating an empty one if absent.
///
/// The partial unique indexes make concurrent callers converge on one row.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn get_or_create_draft(
    conn: &mut PgConnection,
    owner: Owner,
) -> Result<Order, RepositoryError> {
    sqlx::query("INSERT INTO orders (user_id, guest_id) VALUES ($1, $2) ON CONFLICT DO NOTHING")
        .bind(owner.user_id())
        .bind(owner.guest_id())
        .execute(&mut *conn)
        .await?;

    find_draft(conn, owner)
        .await?
        .ok_or_else(|| RepositoryError::DataCorruption(format!("draft for {owner} vanished")))
}

/// Move an order to another owner.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn reassign(
    conn: &mut PgConnection,
    order_id: OrderId,
    owner: Owner,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET user_id = $2, guest_id = $3, updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .bind(owner.user_id())
        .bind(owner.guest_id())
        .execute(conn)
        .await?;
    Ok(())
}

/// Delete an order and, by cascade, its lines.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete(conn: &mut PgConnection, order_id: OrderId) -> Result<(), RepositoryError> {
    sqlx::query("DELETE FROM orders WHERE id = $1")
        .bind(order_id)
        .execute(conn)
        .await?;
    Ok(())
}

/// Set an order's status.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_status(
    conn: &mut PgConnection,
    order_id: OrderId,
    status: OrderStatus,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET status = $2, updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .bind(status)
        .execute(conn)
        .await?;
    Ok(())
}

// =============================================================================
// Lines
// =============================================================================

/// Lines of an order with current product prices.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn list_items(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Vec<OrderItem>, RepositoryError> {
    let rows = sqlx::query_as::<_, OrderItemRow>(&format!(
        "{ITEM_SELECT} WHERE i.order_id = $1 ORDER BY i.id"
    ))
    .bind(order_id)
    .fetch_all(conn)
    .await?;

    Ok(rows.into_iter().map(OrderItem::from).collect())
}

/// Whether a product exists.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn product_exists(
    conn: &mut PgConnection,
    product_id: ProductId,
) -> Result<bool, RepositoryError> {
    let found: Option<i32> = sqlx::query_scalar("SELECT 1 FROM products WHERE id = $1")
        .bind(product_id)
        .fetch_optional(conn)
        .await?;
    Ok(found.is_some())
}

/// Insert a line, or set the quantity of the existing line for the product.
///
/// Returns the line id.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the upsert fails.
pub async fn upsert_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    product_id: ProductId,
    quantity: i32,
) -> Result<OrderItemId, RepositoryError> {
    let id: i32 = sqlx::query_scalar(
        r"
        INSERT INTO order_items (order_id, product_id, quantity)
        VALUES ($1, $2, $3)
        ON CONFLICT (order_id, product_id) DO UPDATE SET quantity = EXCLUDED.quantity
        RETURNING id
        ",
    )
    .bind(order_id)
    .bind(product_id)
    .bind(quantity)
    .fetch_one(conn)
    .await?;

    Ok(OrderItemId::new(id))
}

/// Change a line's quantity. Returns `false` if the line is not in the order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_item_quantity(
    conn: &mut PgConnection,
    order_id: OrderId,
    item_id: OrderItemId,
    quantity: i32,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("UPDATE order_items SET quantity = $3 WHERE order_id = $1 AND id = $2")
        .bind(order_id)
        .bind(item_id)
        .bind(quantity)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Remove a line. Returns `false` if the line is not in the order.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the delete fails.
pub async fn delete_item(
    conn: &mut PgConnection,
    order_id: OrderId,
    item_id: OrderItemId,
) -> Result<bool, RepositoryError> {
    let result = sqlx::query("DELETE FROM order_items WHERE order_id = $1 AND id = $2")
        .bind(order_id)
        .bind(item_id)
        .execute(conn)
        .await?;
    Ok(result.rows_affected() > 0)
}

/// Cache a line's subtotal.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_item_subtotal(
    conn: &mut PgConnection,
    item_id: OrderItemId,
    subtotal: Decimal,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE order_items SET subtotal = $2 WHERE id = $1")
        .bind(item_id)
        .bind(subtotal)
        .execute(conn)
        .await?;
    Ok(())
}

/// Cache an order's total.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the update fails.
pub async fn set_total(
    conn: &mut PgConnection,
    order_id: OrderId,
    total: Decimal,
) -> Result<(), RepositoryError> {
    sqlx::query("UPDATE orders SET total_amount = $2, updated_at = NOW() WHERE id = $1")
        .bind(order_id)
        .bind(total)
        .execute(conn)
        .await?;
    Ok(())
}

// =============================================================================
// Address
// =============================================================================

/// The order's shipping address.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the query fails.
pub async fn get_address(
    conn: &mut PgConnection,
    order_id: OrderId,
) -> Result<Option<OrderAddress>, RepositoryError> {
    let row = sqlx::query_as::<_, AddressRow>(
        "SELECT id, order_id, street, city, zip_code, country, phone FROM order_addresses WHERE order_id = $1",
    )
    .bind(order_id)
    .fetch_optional(conn)
    .await?;

    Ok(row.map(OrderAddress::from))
}

/// Attach or replace the order's shipping address.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if the upsert fails.
pub async fn upsert_address(
    conn: &mut PgConnection,
    order_id: OrderId,
    address: &AddressInput,
) -> Result<OrderAddress, RepositoryError> {
    let address = address.normalized();
    let row = sqlx::query_as::<_, AddressRow>(
        r"
        INSERT INTO order_addresses (order_id, street, city, zip_code, country, phone)
        VALUES ($1, $2, $3, $4, $5, $6)
        ON CONFLICT (order_id) DO UPDATE
        SET street = EXCLUDED.street,
            city = EXCLUDED.city,
            zip_code = EXCLUDED.zip_code,
            country = EXCLUDED.country,
            phone = EXCLUDED.phone
        RETURNING id, order_id, street, city, zip_code, country, phone
        ",
    )
    .bind(order_id)
    .bind(&address.street)
    .bind(&address.city)
    .bind(&address.zip_code)
    .bind(&address.country)
    .bind(&address.phone)
    .fetch_one(conn)
    .await?;

    Ok(row.into())
}

/// Load an order with its lines, address and payment.
///
/// # Errors
///
/// Returns `RepositoryError::Database` if a query fails.
pub async fn load_cart(conn: &mut PgConnection, order: Order) -> Result<Cart, RepositoryError> {
    let items = list_items(&mut *conn, order.id).await?;
    let address = get_address(&mut *conn, order.id).await?;
    let payment = super::payments::get_for_order(&mut *conn, order.id).await?;

    Ok(Cart {
        order,
        items,
        address,
        payment,
    })
}
