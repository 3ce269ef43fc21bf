//! Payment gateway integration.
//!
//! Checkout talks to the gateway through [`PaymentGateway`] so tests can
//! substitute a fake. [`StripeClient`] is the production implementation.

mod stripe;
pub mod webhook;

use std::future::Future;

use thiserror::Error;

use shoppingify_core::{OrderId, PaymentStatus};

pub use stripe::StripeClient;

/// Errors from the payment gateway.
#[derive(Debug, Error)]
pub enum PaymentError {
    /// HTTP request failed.
    #[error("HTTP error: {0}")]
    Http(#[from] reqwest::Error),

    /// The gateway declined or rejected the request.
    #[error("{message}")]
    Gateway {
        /// Gateway error code, e.g. `card_declined`.
        code: Option<String>,
        /// Human-readable message, safe to show to the shopper.
        message: String,
    },

    /// Unexpected response body.
    #[error("parse error: {0}")]
    Parse(String),

    /// The client could not be configured.
    #[error("configuration error: {0}")]
    Config(String),
}

/// A confirmed charge for one order.
#[derive(Debug, Clone)]
pub struct Charge<'a> {
    pub order_id: OrderId,
    /// Customer email the gateway customer is keyed by.
    pub email: &'a str,
    /// Amount in minor units (cents).
    pub amount: i64,
    /// Lowercase ISO-4217 code.
    pub currency: &'a str,
    /// Gateway payment method token.
    pub payment_method_id: &'a str,
}

impl Charge<'_> {
    /// Idempotency key for this charge.
    ///
    /// Retrying the same order with the same amount and payment method
    /// replays the first result instead of charging twice.
    #[must_use]
    pub fn idempotency_key(&self) -> String {
        format!(
            "checkout-{}-{}-{}-{}",
            self.order_id, self.amount, self.currency, self.payment_method_id
        )
    }
}

/// The gateway's view of a charge after confirmation.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct PaymentIntent {
    pub id: String,
    pub status: IntentStatus,
}

/// Subset of gateway intent states the shop distinguishes.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum IntentStatus {
    Succeeded,
    /// Processing, requires action, or any other non-final state.
    Pending,
}

impl IntentStatus {
    #[must_use]
    pub fn from_gateway(status: &str) -> Self {
        if status == "succeeded" {
            Self::Succeeded
        } else {
            Self::Pending
        }
    }

    #[must_use]
    pub const fn payment_status(self) -> PaymentStatus {
        match self {
            Self::Succeeded => PaymentStatus::Succeeded,
            Self::Pending => PaymentStatus::Pending,
        }
    }
}

/// A payment gateway able to create and confirm a charge.
pub trait PaymentGateway: Send + Sync {
    /// Create and confirm a charge.
    fn charge(
        &self,
        charge: &Charge<'_>,
    ) -> impl Future<Output = Result<PaymentIntent, PaymentError>> + Send;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_status_mapping() {
        assert_eq!(IntentStatus::from_gateway("succeeded"), IntentStatus::Succeeded);
        assert_eq!(IntentStatus::from_gateway("processing"), IntentStatus::Pending);
        assert_eq!(
            IntentStatus::from_gateway("requires_action"),
            IntentStatus::Pending
        );
        assert_eq!(
            IntentStatus::Succeeded.payment_status(),
            PaymentStatus::Succeeded
        );
    }

    #[test]
    fn test_idempotency_key_is_stable_per_order_and_method() {
        let charge = Charge {
            order_id: OrderId::new(12),
            email: "a@example.com",
            amount: 1999,
            currency: "usd",
            payment_method_id: "pm_card_visa",
        };
        assert_eq!(charge.idempotency_key(), "checkout-12-1999-usd-pm_card_visa");

        let other_card = Charge {
            payment_method_id: "pm_card_mastercard",
            ..charge
        };
        assert_ne!(other_card.idempotency_key(), charge.idempotency_key());
    }

    #[test]
    fn test_gateway_error_displays_message_only() {
        let err = PaymentError::Gateway {
            code: Some("card_declined".to_owned()),
            message: "Your card was declined.".to_owned(),
        };
        assert_eq!(err.to_string(), "Your card was declined.");
    }
}
