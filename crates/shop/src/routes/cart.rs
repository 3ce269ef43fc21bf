//! Cart, checkout and order history route handlers.
//!
//! Every cart endpoint works for guests and users alike through the
//! [`Requester`] extractor; checkout requires a logged-in user.

use axum::{
    Json,
    extract::{Path, State},
    http::StatusCode,
};
use serde::Deserialize;

use shoppingify_core::cart::{AddressInput, CheckoutRequest};
use shoppingify_core::{OrderItemId, ProductId};

use crate::error::{Result, add_breadcrumb};
use crate::middleware::{ApiJson, RequireAuth, Requester};
use crate::routes::payloads::{AddressView, CartItemView, CartView};
use crate::services::cart::CartService;
use crate::services::checkout::CheckoutService;
use crate::services::payments::StripeClient;
use crate::state::AppState;

/// Currency used when Stripe is not configured.
const DEFAULT_CURRENCY: &str = "usd";

#[derive(Debug, Deserialize)]
pub struct AddItemRequest {
    #[serde(alias = "product_id")]
    pub product: ProductId,
    #[serde(default = "one")]
    pub quantity: i32,
}

const fn one() -> i32 {
    1
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemRequest {
    pub quantity: i32,
}

/// Current draft order.
///
/// GET /api/cart/current
pub async fn current(
    State(state): State<AppState>,
    Requester(owner): Requester,
) -> Result<Json<CartView>> {
    let cart = CartService::new(state.pool()).current(owner).await?;
    Ok(Json(CartView::new(&state, &cart)))
}

/// Items in the current draft.
///
/// GET /api/cart/items
pub async fn list_items(
    State(state): State<AppState>,
    Requester(owner): Requester,
) -> Result<Json<Vec<CartItemView>>> {
    let items = CartService::new(state.pool()).items(owner).await?;
    Ok(Json(
        items
            .iter()
            .map(|item| CartItemView::new(&state, item))
            .collect(),
    ))
}

/// Add a product, or set the quantity of an existing line.
///
/// POST /api/cart/items
pub async fn add_item(
    State(state): State<AppState>,
    Requester(owner): Requester,
    ApiJson(body): ApiJson<AddItemRequest>,
) -> Result<(StatusCode, Json<CartItemView>)> {
    let item = CartService::new(state.pool())
        .add_item(owner, body.product, body.quantity)
        .await?;

    let product_id = body.product.to_string();
    add_breadcrumb("cart", "Item added", Some(&[("product_id", product_id.as_str())]));

    Ok((StatusCode::CREATED, Json(CartItemView::new(&state, &item))))
}

/// Change a line's quantity.
///
/// PATCH /api/cart/items/{id}
pub async fn update_item(
    State(state): State<AppState>,
    Requester(owner): Requester,
    Path(item_id): Path<OrderItemId>,
    ApiJson(body): ApiJson<UpdateItemRequest>,
) -> Result<Json<CartItemView>> {
    let item = CartService::new(state.pool())
        .update_item(owner, item_id, body.quantity)
        .await?;
    Ok(Json(CartItemView::new(&state, &item)))
}

/// Remove a line.
///
/// DELETE /api/cart/items/{id}
pub async fn remove_item(
    State(state): State<AppState>,
    Requester(owner): Requester,
    Path(item_id): Path<OrderItemId>,
) -> Result<StatusCode> {
    CartService::new(state.pool())
        .remove_item(owner, item_id)
        .await?;
    Ok(StatusCode::NO_CONTENT)
}

/// Attach or replace the shipping address.
///
/// PUT /api/cart/address
pub async fn set_address(
    State(state): State<AppState>,
    Requester(owner): Requester,
    ApiJson(address): ApiJson<AddressInput>,
) -> Result<Json<AddressView>> {
    let saved = CartService::new(state.pool())
        .set_address(owner, &address.normalized())
        .await?;
    Ok(Json(AddressView::from(&saved)))
}

/// Place the current draft.
///
/// POST /api/cart/checkout
pub async fn checkout(
    State(state): State<AppState>,
    RequireAuth(user): RequireAuth,
    ApiJson(request): ApiJson<CheckoutRequest>,
) -> Result<(StatusCode, Json<CartView>)> {
    let stripe = state.stripe();
    let currency = stripe.map_or(DEFAULT_CURRENCY, StripeClient::currency);

    let cart = CheckoutService::new(state.pool(), stripe, currency)
        .checkout(&user, &request)
        .await?;

    let order_id = cart.order.id.to_string();
    add_breadcrumb("checkout", "Order placed", Some(&[("order_id", order_id.as_str())]));

    Ok((StatusCode::CREATED, Json(CartView::new(&state, &cart))))
}

/// Placed orders of the requester, newest first.
///
/// GET /api/orders
pub async fn orders(
    State(state): State<AppState>,
    Requester(owner): Requester,
) -> Result<Json<Vec<CartView>>> {
    let orders = CartService::new(state.pool()).placed_orders(owner).await?;
    Ok(Json(
        orders
            .iter()
            .map(|order| CartView::new(&state, order))
            .collect(),
    ))
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use super::*;

    #[test]
    fn test_add_item_accepts_both_field_names() {
        let body: AddItemRequest =
            serde_json::from_str(r#"{"product": 4, "quantity": 2}"#).unwrap();
        assert_eq!(body.product, ProductId::new(4));
        assert_eq!(body.quantity, 2);

        let body: AddItemRequest = serde_json::from_str(r#"{"product_id": 9}"#).unwrap();
        assert_eq!(body.product, ProductId::new(9));
        assert_eq!(body.quantity, 1);
    }
}
