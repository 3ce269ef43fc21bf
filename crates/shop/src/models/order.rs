//! Order and cart domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;

use shoppingify_core::cart::CartLine;
use shoppingify_core::{
    AddressId, OrderId, OrderItemId, OrderStatus, Owner, PaymentId, PaymentMethod, PaymentStatus,
    ProductId,
};

/// An order row. A `draft` order is the owner's cart.
#[derive(Debug, Clone)]
pub struct Order {
    pub id: OrderId,
    pub owner: Owner,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// A cart line joined with the product fields the cart shows.
#[derive(Debug, Clone)]
pub struct OrderItem {
    pub id: OrderItemId,
    pub order_id: OrderId,
    pub product_id: ProductId,
    pub product_slug: String,
    pub product_name: String,
    pub product_files: Vec<String>,
    pub quantity: i32,
    /// Current discount-aware unit price of the product.
    pub current_price: Decimal,
    /// Cached `current_price * quantity` as of the last write.
    pub subtotal: Decimal,
}

impl OrderItem {
    #[must_use]
    pub const fn line(&self) -> CartLine {
        CartLine {
            product_id: self.product_id,
            quantity: self.quantity,
            current_price: self.current_price,
        }
    }
}

/// Shipping address of an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderAddress {
    pub id: AddressId,
    pub order_id: OrderId,
    pub street: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
}

/// Payment attached to a placed order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Payment {
    pub id: PaymentId,
    pub order_id: OrderId,
    pub method: PaymentMethod,
    pub status: PaymentStatus,
    /// Gateway PaymentIntent id.
    pub external_id: Option<String>,
}

/// An order with everything the cart and order endpoints render.
#[derive(Debug, Clone)]
pub struct Cart {
    pub order: Order,
    pub items: Vec<OrderItem>,
    pub address: Option<OrderAddress>,
    pub payment: Option<Payment>,
}
