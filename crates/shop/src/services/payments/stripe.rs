//! Stripe REST client.
//!
//! Only the two calls checkout needs: find-or-create a customer by email,
//! and create a confirmed `PaymentIntent`.

use std::sync::Arc;

use reqwest::StatusCode;
use reqwest::header::{AUTHORIZATION, HeaderMap, HeaderValue};
use secrecy::ExposeSecret;
use serde::Deserialize;
use tracing::{debug, instrument};

use crate::config::StripeConfig;

use super::{Charge, IntentStatus, PaymentError, PaymentGateway, PaymentIntent};

const STRIPE_API_URL: &str = "https://api.stripe.com/v1";
const IDEMPOTENCY_KEY: &str = "Idempotency-Key";

/// Stripe API client.
#[derive(Clone)]
pub struct StripeClient {
    inner: Arc<StripeClientInner>,
}

struct StripeClientInner {
    client: reqwest::Client,
    base_url: String,
    currency: String,
}

#[derive(Debug, Deserialize)]
struct CustomerList {
    data: Vec<Customer>,
}

#[derive(Debug, Deserialize)]
struct Customer {
    id: String,
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
}

#[derive(Debug, Deserialize)]
struct ErrorResponse {
    error: ErrorBody,
}

#[derive(Debug, Deserialize)]
struct ErrorBody {
    code: Option<String>,
    message: Option<String>,
}

impl StripeClient {
    /// Create a new Stripe client.
    ///
    /// # Errors
    ///
    /// Returns `PaymentError::Config` if the secret key is not a valid header value.
    pub fn new(config: &StripeConfig) -> Result<Self, PaymentError> {
        Self::with_base_url(config, STRIPE_API_URL)
    }

    fn with_base_url(config: &StripeConfig, base_url: &str) -> Result<Self, PaymentError> {
        let mut auth = HeaderValue::from_str(&format!(
            "Bearer {}",
            config.secret_key.expose_secret()
        ))
        .map_err(|_| PaymentError::Config("invalid Stripe secret key".to_owned()))?;
        auth.set_sensitive(true);

        let mut headers = HeaderMap::new();
        headers.insert(AUTHORIZATION, auth);

        let client = reqwest::Client::builder()
            .default_headers(headers)
            .build()
            .map_err(|e| PaymentError::Config(e.to_string()))?;

        Ok(Self {
            inner: Arc::new(StripeClientInner {
                client,
                base_url: base_url.trim_end_matches('/').to_owned(),
                currency: config.currency.clone(),
            }),
        })
    }

    /// Currency charges are created in.
    #[must_use]
    pub fn currency(&self) -> &str {
        &self.inner.currency
    }

    /// Find the customer with this email, creating one if none exists.
    #[instrument(skip(self, email))]
    async fn customer_for(&self, email: &str) -> Result<String, PaymentError> {
        let response = self
            .inner
            .client
            .get(format!("{}/customers", self.inner.base_url))
            .query(&[("email", email), ("limit", "1")])
            .send()
            .await?;
        let existing: CustomerList = Self::parse(response).await?;

        if let Some(customer) = existing.data.into_iter().next() {
            debug!(customer = %customer.id, "Reusing Stripe customer");
            return Ok(customer.id);
        }

        let response = self
            .inner
            .client
            .post(format!("{}/customers", self.inner.base_url))
            .form(&[("email", email)])
            .send()
            .await?;
        let created: Customer = Self::parse(response).await?;
        debug!(customer = %created.id, "Created Stripe customer");
        Ok(created.id)
    }

    async fn parse<T: serde::de::DeserializeOwned>(
        response: reqwest::Response,
    ) -> Result<T, PaymentError> {
        let status = response.status();
        let body = response.text().await?;

        if !status.is_success() {
            return Err(gateway_error(status, &body));
        }

        serde_json::from_str(&body)
            .map_err(|e| PaymentError::Parse(format!("Failed to parse Stripe response: {e}")))
    }
}

impl PaymentGateway for StripeClient {
    #[instrument(skip(self, charge), fields(order_id = %charge.order_id, amount = charge.amount))]
    async fn charge(&self, charge: &Charge<'_>) -> Result<PaymentIntent, PaymentError> {
        let customer = self.customer_for(charge.email).await?;

        let form = [
            ("amount", charge.amount.to_string()),
            ("currency", charge.currency.to_owned()),
            ("customer", customer),
            ("payment_method", charge.payment_method_id.to_owned()),
            ("confirm", "true".to_owned()),
            ("metadata[order_id]", charge.order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_owned()),
            ("automatic_payment_methods[allow_redirects]", "never".to_owned()),
        ];

        let response = self
            .inner
            .client
            .post(format!("{}/payment_intents", self.inner.base_url))
            .header(IDEMPOTENCY_KEY, charge.idempotency_key())
            .form(&form)
            .send()
            .await?;
        let intent: IntentResponse = Self::parse(response).await?;

        debug!(intent = %intent.id, status = %intent.status, "PaymentIntent created");
        Ok(PaymentIntent {
            status: IntentStatus::from_gateway(&intent.status),
            id: intent.id,
        })
    }
}

/// Turn a failed Stripe response into a `PaymentError`.
///
/// Only a 4xx with a Stripe error body is a decline the shopper can act on.
/// Server errors and unreadable bodies are gateway faults.
fn gateway_error(status: StatusCode, body: &str) -> PaymentError {
    if status.is_server_error() {
        return PaymentError::Parse(format!("Stripe returned {status}"));
    }
    match serde_json::from_str::<ErrorResponse>(body) {
        Ok(parsed) => PaymentError::Gateway {
            code: parsed.error.code,
            message: parsed
                .error
                .message
                .unwrap_or_else(|| "Payment failed".to_owned()),
        },
        Err(e) => PaymentError::Parse(format!("Unreadable Stripe error ({status}): {e}")),
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_gateway_error_from_stripe_body() {
        let body = r#"{"error": {"code": "card_declined", "message": "Your card was declined.", "type": "card_error"}}"#;
        match gateway_error(StatusCode::PAYMENT_REQUIRED, body) {
            PaymentError::Gateway { code, message } => {
                assert_eq!(code.as_deref(), Some("card_declined"));
                assert_eq!(message, "Your card was declined.");
            }
            other => panic!("unexpected error: {other:?}"),
        }
    }

    #[test]
    fn test_unreadable_error_body_is_not_a_decline() {
        assert!(matches!(
            gateway_error(StatusCode::BAD_REQUEST, "<html>bad request</html>"),
            PaymentError::Parse(_)
        ));
    }

    #[test]
    fn test_server_error_is_not_a_decline() {
        assert!(matches!(
            gateway_error(StatusCode::BAD_GATEWAY, "<html>bad gateway</html>"),
            PaymentError::Parse(_)
        ));
        let body = r#"{"error": {"message": "An unknown error occurred", "type": "api_error"}}"#;
        assert!(matches!(
            gateway_error(StatusCode::INTERNAL_SERVER_ERROR, body),
            PaymentError::Parse(_)
        ));
    }
}
