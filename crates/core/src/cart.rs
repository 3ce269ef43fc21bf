//! Cart arithmetic and checkout validation.
//!
//! Everything here is pure: the shop's repositories load rows, hand them to
//! these functions, and persist the results inside their own transactions.
//!
//! # Invariants
//!
//! - A line's subtotal is `current_price * quantity`, rounded to cents.
//! - An order's total is the sum of its line subtotals.
//! - Merging two carts never produces two lines for the same product.

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};

use crate::types::{OrderId, PaymentMethod, ProductId, round_money};
use crate::validation::{REQUIRED, ValidationErrors};

/// Largest quantity a single line may hold.
pub const MAX_QUANTITY: i32 = 10_000;

/// Check a requested line quantity.
///
/// # Errors
///
/// Returns a `quantity` field error when the value is below 1 or above
/// [`MAX_QUANTITY`].
pub fn validate_quantity(quantity: i32) -> Result<(), ValidationErrors> {
    if quantity < 1 {
        return Err(ValidationErrors::field(
            "quantity",
            "Ensure this value is greater than or equal to 1.",
        ));
    }
    if quantity > MAX_QUANTITY {
        return Err(ValidationErrors::field(
            "quantity",
            format!("Ensure this value is less than or equal to {MAX_QUANTITY}."),
        ));
    }
    Ok(())
}

// =============================================================================
// Pricing
// =============================================================================

/// Discount-aware subtotal of one line.
#[must_use]
pub fn line_subtotal(current_price: Decimal, quantity: i32) -> Decimal {
    round_money(current_price * Decimal::from(quantity))
}

/// A priced cart line.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CartLine {
    pub product_id: ProductId,
    pub quantity: i32,
    /// Unit price with the product's active discount applied.
    pub current_price: Decimal,
}

impl CartLine {
    #[must_use]
    pub fn subtotal(&self) -> Decimal {
        line_subtotal(self.current_price, self.quantity)
    }
}

/// Sum of line subtotals.
#[must_use]
pub fn order_total<'a>(lines: impl IntoIterator<Item = &'a CartLine>) -> Decimal {
    lines
        .into_iter()
        .map(CartLine::subtotal)
        .fold(Decimal::ZERO, |acc, s| acc + s)
}

// =============================================================================
// Login merge
// =============================================================================

/// Product and quantity of a line, without pricing.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct LineQuantity {
    pub product_id: ProductId,
    pub quantity: i32,
}

/// What to do with a guest's draft when the guest logs in.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LoginMerge {
    /// The guest had no draft; nothing moves.
    Nothing,
    /// The user had no draft; the guest draft changes owner and keeps its id.
    AdoptGuestDraft,
    /// Both had drafts; guest lines fold into the user draft, which survives.
    MergeIntoUserDraft,
}

impl LoginMerge {
    #[must_use]
    pub const fn plan(user_has_draft: bool, guest_has_draft: bool) -> Self {
        match (user_has_draft, guest_has_draft) {
            (_, false) => Self::Nothing,
            (false, true) => Self::AdoptGuestDraft,
            (true, true) => Self::MergeIntoUserDraft,
        }
    }
}

/// Fold `incoming` lines into `existing`, summing quantities per product.
///
/// Existing lines keep their order; products only present in `incoming` are
/// appended in their original order. Summed quantities saturate at
/// [`MAX_QUANTITY`].
#[must_use]
pub fn merge_lines(existing: &[LineQuantity], incoming: &[LineQuantity]) -> Vec<LineQuantity> {
    let mut merged: Vec<LineQuantity> = Vec::with_capacity(existing.len() + incoming.len());

    for line in existing.iter().chain(incoming) {
        if let Some(slot) = merged.iter_mut().find(|l| l.product_id == line.product_id) {
            slot.quantity = slot.quantity.saturating_add(line.quantity).min(MAX_QUANTITY);
        } else {
            merged.push(*line);
        }
    }

    merged
}

// =============================================================================
// Checkout
// =============================================================================

/// Shipping address submitted at checkout.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct AddressInput {
    #[serde(default)]
    pub street: String,
    #[serde(default)]
    pub city: String,
    #[serde(default)]
    pub zip_code: String,
    #[serde(default)]
    pub country: String,
    #[serde(default)]
    pub phone: String,
}

impl AddressInput {
    /// Trimmed copy of every field.
    #[must_use]
    pub fn normalized(&self) -> Self {
        Self {
            street: self.street.trim().to_owned(),
            city: self.city.trim().to_owned(),
            zip_code: self.zip_code.trim().to_owned(),
            country: self.country.trim().to_owned(),
            phone: self.phone.trim().to_owned(),
        }
    }

    /// Validate every field, collecting all failures.
    ///
    /// # Errors
    ///
    /// Returns one entry per failing field.
    pub fn validate(&self) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();
        let fields: [(&str, &str, usize); 5] = [
            ("street", &self.street, 255),
            ("city", &self.city, 100),
            ("zip_code", &self.zip_code, 20),
            ("country", &self.country, 100),
            ("phone", &self.phone, 32),
        ];

        for (name, value, max) in fields {
            let value = value.trim();
            if value.is_empty() {
                errors.add(name, REQUIRED);
            } else if value.chars().count() > max {
                errors.add(
                    name,
                    format!("Ensure this field has no more than {max} characters."),
                );
            }
        }

        let phone = self.phone.trim();
        if !phone.is_empty()
            && !phone
                .chars()
                .all(|c| c.is_ascii_digit() || matches!(c, '+' | '-' | ' ' | '(' | ')'))
        {
            errors.add("phone", "Enter a valid phone number.");
        }

        errors.into_result()
    }
}

/// Payment choice submitted at checkout.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentInput {
    pub method: PaymentMethod,
    /// Gateway payment method token (`pm_...`), required for Stripe.
    #[serde(default, alias = "external_id")]
    pub payment_method_id: Option<String>,
}

/// Body of `POST /api/cart/checkout`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CheckoutRequest {
    /// Draft the client believes it is checking out.
    #[serde(default)]
    pub order_id: Option<OrderId>,
    /// New shipping address; optional when one is already attached.
    #[serde(default)]
    pub address: Option<AddressInput>,
    #[serde(default)]
    pub payment: Option<PaymentInput>,
}

/// What checkout needs to know about the requester's draft.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct DraftSnapshot {
    pub order_id: OrderId,
    pub item_count: usize,
    pub has_address: bool,
}

impl CheckoutRequest {
    /// Validate the request against the requester's draft.
    ///
    /// # Errors
    ///
    /// Returns every failing field: ownership of `order_id`, an empty cart,
    /// a missing or invalid address, and a missing payment or Stripe token.
    pub fn validate(&self, draft: &DraftSnapshot) -> Result<(), ValidationErrors> {
        let mut errors = ValidationErrors::new();

        if self.order_id.is_some_and(|id| id != draft.order_id) {
            errors.add("order_id", "Order does not belong to the current user.");
        }

        if draft.item_count == 0 {
            errors.add("items", "Cart is empty.");
        }

        match &self.address {
            Some(address) => {
                if let Err(address_errors) = address.validate() {
                    errors.extend_prefixed("address", address_errors);
                }
            }
            None if !draft.has_address => errors.add("address", REQUIRED),
            None => {}
        }

        match &self.payment {
            None => errors.add("payment", REQUIRED),
            Some(payment) => {
                let has_token = payment
                    .payment_method_id
                    .as_deref()
                    .is_some_and(|id| !id.trim().is_empty());
                if payment.method.requires_gateway() && !has_token {
                    errors.add(
                        "payment.payment_method_id",
                        "This field is required for Stripe payments.",
                    );
                }
            }
        }

        errors.into_result()
    }
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    fn line(product: i32, quantity: i32) -> LineQuantity {
        LineQuantity {
            product_id: ProductId::new(product),
            quantity,
        }
    }

    fn address() -> AddressInput {
        AddressInput {
            street: "1 Main St".to_owned(),
            city: "Springfield".to_owned(),
            zip_code: "12345".to_owned(),
            country: "US".to_owned(),
            phone: "+1 (555) 123-4567".to_owned(),
        }
    }

    fn draft(items: usize, has_address: bool) -> DraftSnapshot {
        DraftSnapshot {
            order_id: OrderId::new(7),
            item_count: items,
            has_address,
        }
    }

    fn cod() -> Option<PaymentInput> {
        Some(PaymentInput {
            method: PaymentMethod::CashOnDelivery,
            payment_method_id: None,
        })
    }

    #[test]
    fn test_total_is_sum_of_discounted_subtotals() {
        let lines = [
            CartLine {
                product_id: ProductId::new(1),
                quantity: 3,
                current_price: dec!(16.99),
            },
            CartLine {
                product_id: ProductId::new(2),
                quantity: 1,
                current_price: dec!(5.00),
            },
        ];
        assert_eq!(lines[0].subtotal(), dec!(50.97));
        assert_eq!(order_total(&lines), dec!(55.97));
        assert_eq!(order_total(&[] as &[CartLine]), Decimal::ZERO);
    }

    #[test]
    fn test_merge_sums_colliding_products() {
        let user = [line(1, 2), line(2, 1)];
        let guest = [line(2, 3), line(3, 1)];
        let merged = merge_lines(&user, &guest);
        assert_eq!(merged, vec![line(1, 2), line(2, 4), line(3, 1)]);
    }

    #[test]
    fn test_merge_into_empty_cart() {
        let guest = [line(5, 1), line(6, 2)];
        assert_eq!(merge_lines(&[], &guest), guest.to_vec());
        assert_eq!(merge_lines(&guest, &[]), guest.to_vec());
    }

    #[test]
    fn test_merge_saturates_quantity() {
        let merged = merge_lines(&[line(1, MAX_QUANTITY)], &[line(1, 5)]);
        assert_eq!(merged, vec![line(1, MAX_QUANTITY)]);
    }

    #[test]
    fn test_login_merge_plan() {
        assert_eq!(LoginMerge::plan(true, false), LoginMerge::Nothing);
        assert_eq!(LoginMerge::plan(false, false), LoginMerge::Nothing);
        assert_eq!(LoginMerge::plan(false, true), LoginMerge::AdoptGuestDraft);
        assert_eq!(LoginMerge::plan(true, true), LoginMerge::MergeIntoUserDraft);
    }

    #[test]
    fn test_validate_quantity() {
        assert!(validate_quantity(1).is_ok());
        assert!(validate_quantity(MAX_QUANTITY).is_ok());
        assert!(validate_quantity(0).is_err());
        assert!(validate_quantity(-2).is_err());
        assert!(validate_quantity(MAX_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_checkout_rejects_empty_cart() {
        let request = CheckoutRequest {
            order_id: None,
            address: Some(address()),
            payment: cod(),
        };
        let errors = request.validate(&draft(0, false)).unwrap_err();
        assert_eq!(errors.get("items").unwrap(), ["Cart is empty."]);
    }

    #[test]
    fn test_checkout_rejects_foreign_order() {
        let request = CheckoutRequest {
            order_id: Some(OrderId::new(99)),
            address: Some(address()),
            payment: cod(),
        };
        let errors = request.validate(&draft(1, false)).unwrap_err();
        assert!(errors.get("order_id").is_some());
        assert!(errors.get("items").is_none());
    }

    #[test]
    fn test_checkout_requires_address_unless_attached() {
        let request = CheckoutRequest {
            order_id: None,
            address: None,
            payment: cod(),
        };
        let errors = request.validate(&draft(2, false)).unwrap_err();
        assert_eq!(errors.get("address").unwrap(), [REQUIRED]);
        assert!(request.validate(&draft(2, true)).is_ok());
    }

    #[test]
    fn test_checkout_reports_nested_address_fields() {
        let request = CheckoutRequest {
            order_id: None,
            address: Some(AddressInput {
                phone: "call me".to_owned(),
                ..address()
            }),
            payment: cod(),
        };
        let errors = request.validate(&draft(1, false)).unwrap_err();
        assert!(errors.get("address.phone").is_some());
    }

    #[test]
    fn test_stripe_requires_payment_method_id() {
        let mut request = CheckoutRequest {
            order_id: Some(OrderId::new(7)),
            address: Some(address()),
            payment: Some(PaymentInput {
                method: PaymentMethod::Stripe,
                payment_method_id: Some("  ".to_owned()),
            }),
        };
        let errors = request.validate(&draft(1, false)).unwrap_err();
        assert!(errors.get("payment.payment_method_id").is_some());

        request.payment = Some(PaymentInput {
            method: PaymentMethod::Stripe,
            payment_method_id: Some("pm_card_visa".to_owned()),
        });
        assert!(request.validate(&draft(1, false)).is_ok());
    }

    #[test]
    fn test_checkout_request_deserializes_external_id_alias() {
        let request: CheckoutRequest = serde_json::from_value(serde_json::json!({
            "order_id": 7,
            "address": {"street": "a", "city": "b", "zip_code": "c", "country": "d", "phone": "1"},
            "payment": {"method": "stripe", "external_id": "pm_123"}
        }))
        .unwrap();
        assert_eq!(
            request.payment.unwrap().payment_method_id.as_deref(),
            Some("pm_123")
        );
    }
}
