//! Business logic between the HTTP layer and the repositories.

pub mod assistant;
pub mod auth;
pub mod cart;
pub mod chat;
pub mod checkout;
pub mod merge;
pub mod payments;
