//! JSON response shapes.
//!
//! Domain models stay free of presentation concerns; handlers convert them
//! into these views right before responding.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Serialize;

use shoppingify_core::{
    AddressId, CategoryId, ChatId, CurrencyCode, Discount, MessageId, OrderId, OrderItemId,
    OrderStatus, Owner, PaymentMethod, PaymentStatus, ProductId,
};

use crate::models::{
    AuthorProfile, Cart, Category, ChatMessage, ChatSummary, OrderAddress, OrderItem, Product,
    User,
};
use crate::state::AppState;

// =============================================================================
// Catalog
// =============================================================================

#[derive(Debug, Serialize)]
pub struct FileView {
    pub url: String,
}

fn files(state: &AppState, files: &[String]) -> Vec<FileView> {
    files
        .iter()
        .map(|file| FileView {
            url: state.media_url(file),
        })
        .collect()
}

#[derive(Debug, Serialize)]
pub struct CategoryRef {
    pub slug: String,
    pub id: CategoryId,
    pub name: String,
}

impl From<&Category> for CategoryRef {
    fn from(category: &Category) -> Self {
        Self {
            slug: category.slug.clone(),
            id: category.id,
            name: category.name.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ProductView {
    pub slug: String,
    pub id: ProductId,
    pub name: String,
    pub files: Vec<FileView>,
    pub price: Decimal,
    pub price_currency: CurrencyCode,
    pub discount: Option<Discount>,
    pub current_price: Decimal,
    pub category: Option<CategoryRef>,
    pub description_html: String,
    pub updated_at: DateTime<Utc>,
}

impl ProductView {
    #[must_use]
    pub fn new(state: &AppState, product: &Product) -> Self {
        Self {
            slug: product.slug.clone(),
            id: product.id,
            name: product.name.clone(),
            files: files(state, &product.files),
            price: product.price.amount,
            price_currency: product.price.currency_code,
            discount: product.discount.clone(),
            current_price: product.current_price(),
            category: product.category.as_ref().map(CategoryRef::from),
            description_html: product.description_html.clone(),
            updated_at: product.updated_at,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct CategoryView {
    pub slug: String,
    pub id: CategoryId,
    pub name: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub products: Option<Vec<ProductView>>,
}

impl CategoryView {
    #[must_use]
    pub fn new(category: &Category) -> Self {
        Self {
            slug: category.slug.clone(),
            id: category.id,
            name: category.name.clone(),
            products: None,
        }
    }

    #[must_use]
    pub fn with_products(mut self, state: &AppState, products: &[Product]) -> Self {
        self.products = Some(products.iter().map(|p| ProductView::new(state, p)).collect());
        self
    }
}

// =============================================================================
// Cart and orders
// =============================================================================

#[derive(Debug, Serialize)]
pub struct CartProductView {
    pub slug: String,
    pub id: ProductId,
    pub name: String,
    pub files: Vec<FileView>,
}

#[derive(Debug, Serialize)]
pub struct CartItemView {
    pub id: OrderItemId,
    pub product: CartProductView,
    pub quantity: i32,
    pub subtotal: Decimal,
}

impl CartItemView {
    #[must_use]
    pub fn new(state: &AppState, item: &OrderItem) -> Self {
        Self {
            id: item.id,
            product: CartProductView {
                slug: item.product_slug.clone(),
                id: item.product_id,
                name: item.product_name.clone(),
                files: files(state, &item.product_files),
            },
            quantity: item.quantity,
            subtotal: item.subtotal,
        }
    }
}

#[derive(Debug, Serialize)]
pub struct AddressView {
    pub id: AddressId,
    pub street: String,
    pub city: String,
    pub zip_code: String,
    pub country: String,
    pub phone: String,
}

impl From<&OrderAddress> for AddressView {
    fn from(address: &OrderAddress) -> Self {
        Self {
            id: address.id,
            street: address.street.clone(),
            city: address.city.clone(),
            zip_code: address.zip_code.clone(),
            country: address.country.clone(),
            phone: address.phone.clone(),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct PaymentView {
    pub payment_method: PaymentMethod,
    pub status: PaymentStatus,
    pub external_id: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct CartView {
    pub id: OrderId,
    pub status: OrderStatus,
    pub total_amount: Decimal,
    pub items: Vec<CartItemView>,
    pub address: Option<AddressView>,
    pub payment: Option<PaymentView>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl CartView {
    #[must_use]
    pub fn new(state: &AppState, cart: &Cart) -> Self {
        Self {
            id: cart.order.id,
            status: cart.order.status,
            total_amount: cart.order.total_amount,
            items: cart
                .items
                .iter()
                .map(|item| CartItemView::new(state, item))
                .collect(),
            address: cart.address.as_ref().map(AddressView::from),
            payment: cart.payment.as_ref().map(|p| PaymentView {
                payment_method: p.method,
                status: p.status,
                external_id: p.external_id.clone(),
            }),
            created_at: cart.order.created_at,
            updated_at: cart.order.updated_at,
        }
    }
}

// =============================================================================
// Accounts
// =============================================================================

#[derive(Debug, Serialize)]
pub struct ProfileView {
    pub first_name: String,
    pub last_name: String,
    pub email: String,
    pub profile_photo: Option<String>,
    pub is_admin: bool,
}

impl From<&User> for ProfileView {
    fn from(user: &User) -> Self {
        Self {
            first_name: user.first_name.clone(),
            last_name: user.last_name.clone(),
            email: user.email.to_string(),
            profile_photo: user.profile_photo.clone(),
            is_admin: user.is_staff,
        }
    }
}

// =============================================================================
// Chat
// =============================================================================

/// A message as seen by one viewer.
#[derive(Debug, Clone, Serialize)]
pub struct MessageView {
    pub id: MessageId,
    pub content: String,
    pub created_by: Option<AuthorProfile>,
    pub created_at: DateTime<Utc>,
    pub is_mine: bool,
}

impl MessageView {
    /// `viewer` decides `is_mine`; staff views pass `None`.
    #[must_use]
    pub fn new(message: &ChatMessage, viewer: Option<Owner>) -> Self {
        Self {
            id: message.id,
            content: message.content.clone(),
            created_by: message.profile.clone(),
            created_at: message.created_at,
            is_mine: viewer.is_some_and(|v| message.is_written_by(v)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatListEntry {
    pub id: ChatId,
    pub created_by: Option<AuthorProfile>,
    pub created_at: DateTime<Utc>,
    pub latest_message: Option<MessageView>,
}

impl ChatListEntry {
    #[must_use]
    pub fn new(summary: &ChatSummary, viewer: Option<Owner>) -> Self {
        Self {
            id: summary.chat.id,
            created_by: summary.owner_profile.clone(),
            created_at: summary.chat.created_at,
            latest_message: summary
                .latest_message
                .as_ref()
                .map(|m| MessageView::new(m, viewer)),
        }
    }
}

#[derive(Debug, Serialize)]
pub struct ChatDetailView {
    #[serde(flatten)]
    pub chat: ChatListEntry,
    pub messages: Vec<MessageView>,
}

/// WebSocket frame carrying a message.
#[derive(Debug, Serialize)]
pub struct MessageFrame {
    pub data: MessageView,
}

/// WebSocket frame carrying an error.
#[derive(Debug, Serialize)]
pub struct ErrorFrame {
    pub error: String,
}
