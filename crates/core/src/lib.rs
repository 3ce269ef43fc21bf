//! Shoppingify Core - Shared domain types and cart arithmetic.
//!
//! This crate provides the types used by every Shoppingify component:
//! - `shop` - The HTTP/WebSocket API server
//! - `cli` - Command-line tools for migrations, seeding and user management
//!
//! # Architecture
//!
//! The core crate contains only types and pure functions - no I/O, no
//! database access, no HTTP clients. The cart merge, pricing and checkout
//! validation rules live here so they can be tested without Postgres.
//!
//! # Modules
//!
//! - [`types`] - Type-safe IDs, emails, money and statuses
//! - [`cart`] - Line pricing, totals, login merge and checkout validation
//! - [`validation`] - Field-level validation errors

#![cfg_attr(not(test), forbid(unsafe_code))]

pub mod cart;
pub mod types;
pub mod validation;

pub use types::*;
pub use validation::ValidationErrors;
