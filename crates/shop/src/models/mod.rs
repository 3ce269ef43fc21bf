//! Domain models for the shop.
//!
//! These are validated domain objects, separate from the database row types
//! in [`crate::db`] and the JSON payloads in [`crate::routes`].

pub mod catalog;
pub mod chat;
pub mod order;
pub mod session;
pub mod user;

pub use catalog::{Category, Product, ProductFilter};
pub use chat::{AuthorProfile, Chat, ChatMessage, ChatSummary};
pub use order::{Cart, Order, OrderAddress, OrderItem, Payment};
pub use session::CurrentUser;
pub use user::User;
