//! Checkout: the draft → processing transition.
//!
//! The draft row stays locked from validation until commit. On success the
//! order is `processing`, carries a payment row, and the user gets a fresh
//! empty draft.

use rust_decimal::Decimal;
use sqlx::{PgPool, Postgres, Transaction};
use tracing::{debug, error, info, instrument, warn};

use shoppingify_core::cart::{CheckoutRequest, DraftSnapshot};
use shoppingify_core::validation::REQUIRED;
use shoppingify_core::{
    OrderStatus, Owner, PaymentMethod, PaymentStatus, ValidationErrors, to_minor_units,
};

use crate::db::{RepositoryError, orders, payments};
use crate::models::order::{Cart, Order};
use crate::models::session::CurrentUser;
use crate::services::cart::refresh_totals;

use super::payments::{Charge, PaymentError, PaymentGateway};

/// Errors from checkout.
#[derive(Debug, thiserror::Error)]
pub enum CheckoutError {
    #[error("database error: {0}")]
    Repository(#[from] RepositoryError),

    #[error("database error: {0}")]
    Database(#[from] sqlx::Error),

    #[error("invalid checkout: {0}")]
    Invalid(#[from] ValidationErrors),

    /// The gateway refused the charge. The order is left as a draft.
    #[error("payment failed: {0}")]
    Payment(#[from] PaymentError),

    /// Stripe was chosen but no gateway is configured.
    #[error("card payments are not available")]
    GatewayUnavailable,
}

/// Checkout service.
pub struct CheckoutService<'a, G> {
    pool: &'a PgPool,
    gateway: Option<&'a G>,
    currency: &'a str,
}

impl<'a, G: PaymentGateway> CheckoutService<'a, G> {
    #[must_use]
    pub const fn new(pool: &'a PgPool, gateway: Option<&'a G>, currency: &'a str) -> Self {
        Self {
            pool,
            gateway,
            currency,
        }
    }

    /// Place the user's draft order.
    ///
    /// # Errors
    ///
    /// Returns `CheckoutError::Invalid` with field errors for a foreign order,
    /// an empty cart, or missing address or payment data.
    /// Returns `CheckoutError::Payment` when the gateway declines.
    #[instrument(skip(self, user, request), fields(user_id = %user.id))]
    pub async fn checkout(
        &self,
        user: &CurrentUser,
        request: &CheckoutRequest,
    ) -> Result<Cart, CheckoutError> {
        let owner = Owner::User(user.id);
        let mut tx = self.pool.begin().await?;

        orders::get_or_create_draft(&mut tx, owner).await?;
        let order = orders::lock_draft(&mut tx, owner)
            .await?
            .ok_or_else(|| {
                RepositoryError::DataCorruption("draft vanished under lock".to_owned())
            })?;

        let (items, total) = refresh_totals(&mut tx, order.id).await?;
        let existing_address = orders::get_address(&mut tx, order.id).await?;

        request.validate(&DraftSnapshot {
            order_id: order.id,
            item_count: items.len(),
            has_address: existing_address.is_some(),
        })?;

        if let Some(address) = &request.address {
            orders::upsert_address(&mut tx, order.id, address).await?;
        }

        let Some(payment) = &request.payment else {
            return Err(ValidationErrors::field("payment", REQUIRED).into());
        };

        let (status, external_id) = match payment.method {
            PaymentMethod::Stripe => {
                let gateway = self.gateway.ok_or(CheckoutError::GatewayUnavailable)?;
                let amount = to_minor_units(total).ok_or_else(|| {
                    ValidationErrors::field("items", "Order total is out of range.")
                })?;
                let payment_method_id = payment.payment_method_id.as_deref().unwrap_or_default();

                let intent = gateway
                    .charge(&Charge {
                        order_id: order.id,
                        email: user.email.as_str(),
                        amount,
                        currency: self.currency,
                        payment_method_id,
                    })
                    .await
                    .inspect_err(|e| warn!(error = %e, order_id = %order.id, "Charge failed"))?;

                (intent.status.payment_status(), Some(intent.id))
            }
            PaymentMethod::CashOnDelivery => (PaymentStatus::Pending, None),
        };

        let settlement = Settlement {
            method: payment.method,
            status,
            external_id,
        };
        let order_id = order.id;
        let placed = place(tx, owner, order, total, &settlement)
            .await
            .inspect_err(|e| {
                // The gateway kept the money; the intent id is the reconciliation handle.
                if let Some(intent) = &settlement.external_id {
                    error!(
                        error = %e,
                        %order_id,
                        %intent,
                        "Charge captured but the order was not saved"
                    );
                }
            })?;

        info!(
            order_id = %placed.order.id,
            method = %settlement.method,
            %total,
            "Order placed"
        );
        Ok(placed)
    }
}

/// How a checkout was paid.
struct Settlement {
    method: PaymentMethod,
    status: PaymentStatus,
    external_id: Option<String>,
}

/// Record the payment, move the draft to processing, open the next draft
/// and commit.
async fn place(
    mut tx: Transaction<'_, Postgres>,
    owner: Owner,
    mut order: Order,
    total: Decimal,
    settlement: &Settlement,
) -> Result<Cart, CheckoutError> {
    payments::create(
        &mut tx,
        order.id,
        settlement.method,
        settlement.status,
        settlement.external_id.as_deref(),
    )
    .await?;

    debug_assert!(order.status.can_transition_to(OrderStatus::Processing));
    orders::set_status(&mut tx, order.id, OrderStatus::Processing).await?;
    order.status = OrderStatus::Processing;
    order.total_amount = total;

    let next_draft = orders::get_or_create_draft(&mut tx, owner).await?;
    let placed = orders::load_cart(&mut tx, order).await?;

    tx.commit().await?;
    debug!(next_draft = %next_draft.id, "Fresh draft opened");
    Ok(placed)
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use std::sync::Mutex;

    use shoppingify_core::OrderId;

    use super::super::payments::{IntentStatus, PaymentIntent};
    use super::*;

    /// Records charges and answers with a canned result.
    struct FakeGateway {
        charges: Mutex<Vec<(OrderId, i64, String)>>,
        decline: bool,
    }

    impl PaymentGateway for FakeGateway {
        async fn charge(&self, charge: &Charge<'_>) -> Result<PaymentIntent, PaymentError> {
            self.charges.lock().unwrap().push((
                charge.order_id,
                charge.amount,
                charge.payment_method_id.to_owned(),
            ));
            if self.decline {
                return Err(PaymentError::Gateway {
                    code: Some("card_declined".to_owned()),
                    message: "Your card was declined.".to_owned(),
                });
            }
            Ok(PaymentIntent {
                id: "pi_test".to_owned(),
                status: IntentStatus::Succeeded,
            })
        }
    }

    #[tokio::test]
    async fn test_fake_gateway_records_charge() {
        let gateway = FakeGateway {
            charges: Mutex::new(Vec::new()),
            decline: false,
        };
        let intent = gateway
            .charge(&Charge {
                order_id: OrderId::new(3),
                email: "a@example.com",
                amount: 1999,
                currency: "usd",
                payment_method_id: "pm_card_visa",
            })
            .await
            .unwrap();
        assert_eq!(intent.status, IntentStatus::Succeeded);
        assert_eq!(
            gateway.charges.lock().unwrap().as_slice(),
            &[(OrderId::new(3), 1999, "pm_card_visa".to_owned())]
        );
    }

    #[tokio::test]
    async fn test_declined_charge_maps_to_checkout_error() {
        let gateway = FakeGateway {
            charges: Mutex::new(Vec::new()),
            decline: true,
        };
        let err: CheckoutError = gateway
            .charge(&Charge {
                order_id: OrderId::new(1),
                email: "a@example.com",
                amount: 100,
                currency: "usd",
                payment_method_id: "pm_card_chargeDeclined",
            })
            .await
            .unwrap_err()
            .into();
        assert!(matches!(
            err,
            CheckoutError::Payment(PaymentError::Gateway { .. })
        ));
    }
}
