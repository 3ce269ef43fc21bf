//! Unified error handling with Sentry integration.
//!
//! Every route handler returns `Result<T, AppError>`. Server-side failures are
//! captured to Sentry before responding; clients only ever see a JSON body:
//! field errors as `{"field": ["message"]}`, gateway failures as
//! `{"message": "..."}` and everything else as `{"detail": "..."}`.

use axum::{
    Json,
    http::StatusCode,
    response::{IntoResponse, Response},
};
use serde_json::json;
use thiserror::Error;

use shoppingify_core::ValidationErrors;

use crate::db::RepositoryError;
use crate::search::SearchError;
use crate::services::auth::AuthError;
use crate::services::cart::CartError;
use crate::services::chat::ChatError;
use crate::services::checkout::CheckoutError;
use crate::services::payments::PaymentError;

const INTERNAL_DETAIL: &str = "Internal server error";

/// Application-level error type for the shop.
#[derive(Debug, Error)]
pub enum AppError {
    /// Database operation failed.
    #[error("Database error: {0}")]
    Database(#[from] RepositoryError),

    /// Authentication operation failed.
    #[error("Auth error: {0}")]
    Auth(#[from] AuthError),

    /// Field-level validation failed.
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationErrors),

    /// The payment gateway refused or failed.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Search index failure.
    #[error("Search error: {0}")]
    Search(#[from] SearchError),

    /// Resource not found.
    #[error("Not found: {0}")]
    NotFound(String),

    /// User is not authenticated.
    #[error("Unauthorized: {0}")]
    Unauthorized(String),

    /// Authenticated but not allowed.
    #[error("Forbidden: {0}")]
    Forbidden(String),

    /// Bad request from client.
    #[error("Bad request: {0}")]
    BadRequest(String),

    /// Rate limited.
    #[error("Rate limited")]
    RateLimited,

    /// A required integration is not configured.
    #[error("Service unavailable: {0}")]
    ServiceUnavailable(String),

    /// Internal server error.
    #[error("Internal error: {0}")]
    Internal(String),
}

impl From<CartError> for AppError {
    fn from(err: CartError) -> Self {
        match err {
            CartError::Repository(e) => Self::Database(e),
            CartError::Database(e) => Self::Database(e.into()),
            CartError::Invalid(e) => Self::Validation(e),
            CartError::ItemNotFound => Self::NotFound("cart item".to_owned()),
        }
    }
}

impl From<CheckoutError> for AppError {
    fn from(err: CheckoutError) -> Self {
        match err {
            CheckoutError::Repository(e) => Self::Database(e),
            CheckoutError::Database(e) => Self::Database(e.into()),
            CheckoutError::Invalid(e) => Self::Validation(e),
            CheckoutError::Payment(e) => Self::Payment(e),
            CheckoutError::GatewayUnavailable => {
                Self::ServiceUnavailable("Card payments are not available.".to_owned())
            }
        }
    }
}

impl From<ChatError> for AppError {
    fn from(err: ChatError) -> Self {
        match err {
            ChatError::Repository(e) => Self::Database(e),
            ChatError::Database(e) => Self::Database(e.into()),
            ChatError::Invalid(e) => Self::Validation(e),
            ChatError::ChatNotFound => Self::NotFound("chat".to_owned()),
        }
    }
}

impl AppError {
    /// HTTP status for this error.
    #[must_use]
    pub const fn status(&self) -> StatusCode {
        match self {
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => StatusCode::NOT_FOUND,
            Self::Database(RepositoryError::Conflict(_)) => StatusCode::CONFLICT,
            Self::Database(_) | Self::Search(_) | Self::Internal(_) => {
                StatusCode::INTERNAL_SERVER_ERROR
            }
            Self::Auth(err) => match err {
                AuthError::Repository(_) | AuthError::PasswordHash => {
                    StatusCode::INTERNAL_SERVER_ERROR
                }
                _ => StatusCode::BAD_REQUEST,
            },
            Self::Validation(_) | Self::Payment(_) | Self::BadRequest(_) => {
                StatusCode::BAD_REQUEST
            }
            Self::Unauthorized(_) => StatusCode::UNAUTHORIZED,
            Self::Forbidden(_) => StatusCode::FORBIDDEN,
            Self::RateLimited => StatusCode::TOO_MANY_REQUESTS,
            Self::ServiceUnavailable(_) => StatusCode::SERVICE_UNAVAILABLE,
        }
    }

    /// Whether the failure is ours rather than the client's.
    fn is_server_fault(&self) -> bool {
        self.status().is_server_error()
            || matches!(
                self,
                Self::Payment(
                    PaymentError::Http(_) | PaymentError::Parse(_) | PaymentError::Config(_)
                )
            )
    }

    fn body(&self) -> serde_json::Value {
        match self {
            Self::Validation(errors) => json!(errors),
            Self::Auth(err) => auth_body(err),
            Self::Payment(PaymentError::Gateway { message, .. }) => json!({ "message": message }),
            Self::Payment(_) => json!({ "message": "Payment could not be processed." }),
            Self::Database(RepositoryError::NotFound) | Self::NotFound(_) => {
                json!({ "detail": "Not found." })
            }
            Self::Database(RepositoryError::Conflict(msg)) => json!({ "detail": msg }),
            Self::Database(_) | Self::Search(_) | Self::Internal(_) => {
                json!({ "detail": INTERNAL_DETAIL })
            }
            Self::Unauthorized(msg)
            | Self::Forbidden(msg)
            | Self::BadRequest(msg)
            | Self::ServiceUnavailable(msg) => json!({ "detail": msg }),
            Self::RateLimited => json!({ "detail": "Request was throttled." }),
        }
    }
}

/// Auth failures shaped like form errors on the offending field.
fn auth_body(err: &AuthError) -> serde_json::Value {
    let errors = match err {
        AuthError::InvalidEmail(_) => {
            ValidationErrors::field("email", "Enter a valid email address.")
        }
        AuthError::UserAlreadyExists => ValidationErrors::field(
            "email",
            "A user is already registered with this e-mail address.",
        ),
        AuthError::WeakPassword(msg) => ValidationErrors::field("password1", msg.as_str()),
        AuthError::InvalidCredentials | AuthError::UserNotFound => ValidationErrors::field(
            "non_field_errors",
            "Unable to log in with provided credentials.",
        ),
        AuthError::Repository(_) | AuthError::PasswordHash => {
            return json!({ "detail": INTERNAL_DETAIL });
        }
    };
    json!(errors)
}

impl IntoResponse for AppError {
    fn into_response(self) -> Response {
        if self.is_server_fault() {
            let event_id = sentry::capture_error(&self);
            tracing::error!(
                error = %self,
                sentry_event_id = %event_id,
                "Request error"
            );
        }

        (self.status(), Json(self.body())).into_response()
    }
}

/// Result type alias for `AppError`.
pub type Result<T> = std::result::Result<T, AppError>;

/// Set the Sentry user context.
///
/// Call this after successful authentication to associate errors with users.
pub fn set_sentry_user(user_id: &impl ToString, email: Option<&str>) {
    sentry::configure_scope(|scope| {
        scope.set_user(Some(sentry::User {
            id: Some(user_id.to_string()),
            email: email.map(String::from),
            ..Default::default()
        }));
    });
}

/// Clear the Sentry user context.
pub fn clear_sentry_user() {
    sentry::configure_scope(|scope| {
        scope.set_user(None);
    });
}

/// Add a breadcrumb for a shopper action.
pub fn add_breadcrumb(category: &str, message: &str, data: Option<&[(&str, &str)]>) {
    let mut breadcrumb = sentry::Breadcrumb {
        category: Some(category.to_string()),
        message: Some(message.to_string()),
        level: sentry::Level::Info,
        ..Default::default()
    };

    if let Some(pairs) = data {
        for (key, value) in pairs {
            breadcrumb.data.insert(
                (*key).to_string(),
                serde_json::Value::String((*value).to_string()),
            );
        }
    }

    sentry::add_breadcrumb(breadcrumb);
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use http_body_util::BodyExt;

    use super::*;

    async fn body_json(err: AppError) -> (StatusCode, serde_json::Value) {
        let response = err.into_response();
        let status = response.status();
        let bytes = response.into_body().collect().await.unwrap().to_bytes();
        (status, serde_json::from_slice(&bytes).unwrap())
    }

    #[test]
    fn test_app_error_display() {
        let err = AppError::NotFound("product-123".to_string());
        assert_eq!(err.to_string(), "Not found: product-123");

        let err = AppError::BadRequest("invalid input".to_string());
        assert_eq!(err.to_string(), "Bad request: invalid input");
    }

    #[test]
    fn test_app_error_status_codes() {
        assert_eq!(
            AppError::NotFound("test".to_string()).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Database(RepositoryError::NotFound).status(),
            StatusCode::NOT_FOUND
        );
        assert_eq!(
            AppError::Unauthorized("test".to_string()).status(),
            StatusCode::UNAUTHORIZED
        );
        assert_eq!(
            AppError::Forbidden("test".to_string()).status(),
            StatusCode::FORBIDDEN
        );
        assert_eq!(AppError::RateLimited.status(), StatusCode::TOO_MANY_REQUESTS);
        assert_eq!(
            AppError::Internal("test".to_string()).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
        assert_eq!(
            AppError::Auth(AuthError::InvalidCredentials).status(),
            StatusCode::BAD_REQUEST
        );
        assert_eq!(
            AppError::Auth(AuthError::PasswordHash).status(),
            StatusCode::INTERNAL_SERVER_ERROR
        );
    }

    #[tokio::test]
    async fn test_validation_body_is_flat_field_map() {
        let mut errors = ValidationErrors::new();
        errors.add("items", "Cart is empty.");
        errors.add("address.zip_code", "This field is required.");

        let (status, body) = body_json(AppError::Validation(errors)).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body["items"][0], "Cart is empty.");
        assert_eq!(body["address.zip_code"][0], "This field is required.");
    }

    #[tokio::test]
    async fn test_gateway_failure_body() {
        let err = CheckoutError::Payment(PaymentError::Gateway {
            code: Some("card_declined".to_owned()),
            message: "Your card was declined.".to_owned(),
        });
        let (status, body) = body_json(err.into()).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
        assert_eq!(body, json!({ "message": "Your card was declined." }));
    }

    #[tokio::test]
    async fn test_internal_details_are_hidden() {
        let err = AppError::Database(RepositoryError::DataCorruption("secret".to_owned()));
        let (status, body) = body_json(err).await;
        assert_eq!(status, StatusCode::INTERNAL_SERVER_ERROR);
        assert_eq!(body, json!({ "detail": INTERNAL_DETAIL }));
    }

    #[tokio::test]
    async fn test_auth_errors_are_field_errors() {
        let (_, body) = body_json(AppError::Auth(AuthError::UserAlreadyExists)).await;
        assert_eq!(
            body["email"][0],
            "A user is already registered with this e-mail address."
        );

        let (_, body) = body_json(AppError::Auth(AuthError::InvalidCredentials)).await;
        assert_eq!(
            body["non_field_errors"][0],
            "Unable to log in with provided credentials."
        );
    }

    #[test]
    fn test_cart_item_not_found_maps_to_404() {
        let err: AppError = CartError::ItemNotFound.into();
        assert_eq!(err.status(), StatusCode::NOT_FOUND);
    }
}
