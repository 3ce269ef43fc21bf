//! Core types for Shoppingify.
//!
//! This module provides type-safe wrappers for common domain concepts.

pub mod email;
pub mod id;
pub mod money;
pub mod owner;
pub mod slug;
pub mod status;

pub use email::{Email, EmailError};
pub use id::*;
pub use money::{CurrencyCode, Discount, Price, current_price, round_money, to_minor_units};
pub use owner::Owner;
pub use slug::slugify;
pub use status::*;
