//! Status enums for orders, payments and chat messages.
//!
//! Each enum maps onto a Postgres enum type of the same snake-case name when
//! the `postgres` feature is enabled.

use serde::{Deserialize, Serialize};

/// Order lifecycle.
///
/// `draft` is the open cart. Checkout moves it to `processing`; fulfilment
/// continues to `shipped` and `delivered`. Orders can be canceled until they
/// ship.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "order_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum OrderStatus {
    #[default]
    Draft,
    Processing,
    Shipped,
    Delivered,
    Canceled,
}

impl OrderStatus {
    /// Whether moving from `self` to `next` is a legal transition.
    #[must_use]
    pub const fn can_transition_to(self, next: Self) -> bool {
        matches!(
            (self, next),
            (Self::Draft, Self::Processing | Self::Canceled)
                | (Self::Processing, Self::Shipped | Self::Canceled)
                | (Self::Shipped, Self::Delivered)
        )
    }

    #[must_use]
    pub const fn is_draft(self) -> bool {
        matches!(self, Self::Draft)
    }
}

impl std::fmt::Display for OrderStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Draft => write!(f, "draft"),
            Self::Processing => write!(f, "processing"),
            Self::Shipped => write!(f, "shipped"),
            Self::Delivered => write!(f, "delivered"),
            Self::Canceled => write!(f, "canceled"),
        }
    }
}

impl std::str::FromStr for OrderStatus {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "draft" => Ok(Self::Draft),
            "processing" => Ok(Self::Processing),
            "shipped" => Ok(Self::Shipped),
            "delivered" => Ok(Self::Delivered),
            "canceled" => Ok(Self::Canceled),
            _ => Err(format!("invalid order status: {s}")),
        }
    }
}

/// How an order is paid.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_method", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentMethod {
    /// Card payment through the Stripe gateway.
    Stripe,
    /// Paid in cash when the parcel arrives; no gateway call.
    CashOnDelivery,
}

impl PaymentMethod {
    /// Whether checkout needs a gateway call.
    #[must_use]
    pub const fn requires_gateway(self) -> bool {
        matches!(self, Self::Stripe)
    }
}

impl std::fmt::Display for PaymentMethod {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::Stripe => write!(f, "stripe"),
            Self::CashOnDelivery => write!(f, "cash_on_delivery"),
        }
    }
}

/// Payment state as reported by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize, Default)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "payment_status", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum PaymentStatus {
    #[default]
    Pending,
    Succeeded,
}

/// Who wrote a chat message.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[cfg_attr(feature = "postgres", derive(sqlx::Type))]
#[cfg_attr(
    feature = "postgres",
    sqlx(type_name = "message_author", rename_all = "snake_case")
)]
#[serde(rename_all = "snake_case")]
pub enum MessageAuthor {
    /// A registered user, customer or staff.
    User,
    /// An anonymous shopper.
    Guest,
    /// The AI shopping assistant.
    Assistant,
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_order_transitions() {
        assert!(OrderStatus::Draft.can_transition_to(OrderStatus::Processing));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Shipped));
        assert!(OrderStatus::Shipped.can_transition_to(OrderStatus::Delivered));
        assert!(OrderStatus::Processing.can_transition_to(OrderStatus::Canceled));

        assert!(!OrderStatus::Processing.can_transition_to(OrderStatus::Draft));
        assert!(!OrderStatus::Delivered.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::Shipped.can_transition_to(OrderStatus::Canceled));
        assert!(!OrderStatus::Draft.can_transition_to(OrderStatus::Draft));
    }

    #[test]
    fn test_order_status_string_roundtrip() {
        for status in [
            OrderStatus::Draft,
            OrderStatus::Processing,
            OrderStatus::Shipped,
            OrderStatus::Delivered,
            OrderStatus::Canceled,
        ] {
            assert_eq!(status.to_string().parse::<OrderStatus>().unwrap(), status);
        }
        assert!("paid".parse::<OrderStatus>().is_err());
    }

    #[test]
    fn test_payment_method_serde() {
        let method: PaymentMethod = serde_json::from_str("\"cash_on_delivery\"").unwrap();
        assert_eq!(method, PaymentMethod::CashOnDelivery);
        assert!(!method.requires_gateway());
        assert!(PaymentMethod::Stripe.requires_gateway());
        assert!(serde_json::from_str::<PaymentMethod>("\"paypal\"").is_err());
    }
}
