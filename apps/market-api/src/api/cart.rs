//! Server cart routes for the signed-in user.
//!
//! These are the `cart_add_item` / `cart_set_quantity` / `cart_clear`
//! procedures a storefront session mirrors its local cart into.

use std::sync::Arc;

use axum::extract::State;
use axum::http::HeaderMap;
use axum::Json;
use serde::{Deserialize, Serialize};
use tracing::debug;
use treido_core::money::major_units;
use treido_core::{Cart, CartItem, Money};

use super::AppState;
use crate::error::ApiError;

/// Cart lines plus totals.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CartResponse {
    pub items: Vec<CartItem>,
    pub total_items: i64,
    #[serde(with = "major_units")]
    pub subtotal: Money,
}

impl From<Vec<CartItem>> for CartResponse {
    fn from(items: Vec<CartItem>) -> Self {
        let cart = Cart::from_items(items);
        CartResponse {
            total_items: cart.total_items(),
            subtotal: cart.subtotal(),
            items: cart.into_items(),
        }
    }
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CartLineRequest {
    pub product_id: String,
    #[serde(default)]
    pub variant_id: Option<String>,
    #[serde(default = "default_quantity")]
    pub quantity: i64,
}

fn default_quantity() -> i64 {
    1
}

async fn load(state: &AppState, user_id: &str) -> Result<Json<CartResponse>, ApiError> {
    let items = state.db.carts().list_for_user(user_id).await?;
    Ok(Json(CartResponse::from(items)))
}

/// `GET /api/cart`
pub async fn get_cart(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<CartResponse>, ApiError> {
    let user_id = state.require_user(&headers)?;
    load(&state, &user_id).await
}

/// `POST /api/cart`: adds to a line (quantities merge, capped at 99).
pub async fn add_item(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CartLineRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id = state.require_user(&headers)?;
    if request.product_id.trim().is_empty() {
        return Err(ApiError::validation("productId is required"));
    }
    if state.db.products().get_by_id(&request.product_id).await?.is_none() {
        return Err(ApiError::not_found("Product", &request.product_id));
    }

    let quantity = state
        .db
        .carts()
        .add_item(&user_id, &request.product_id, request.variant_id.as_deref(), request.quantity)
        .await?;
    debug!(user_id = %user_id, product_id = %request.product_id, quantity, "Cart line added");
    load(&state, &user_id).await
}

/// `PATCH /api/cart`: sets a line's quantity; zero removes it.
pub async fn set_quantity(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CartLineRequest>,
) -> Result<Json<CartResponse>, ApiError> {
    let user_id = state.require_user(&headers)?;
    state
        .db
        .carts()
        .set_quantity(&user_id, &request.product_id, request.variant_id.as_deref(), request.quantity)
        .await?;
    load(&state, &user_id).await
}

/// `DELETE /api/cart`
pub async fn clear_cart(State(state): State<Arc<AppState>>, headers: HeaderMap) -> Result<Json<CartResponse>, ApiError> {
    let user_id = state.require_user(&headers)?;
    let removed = state.db.carts().clear(&user_id).await?;
    debug!(user_id = %user_id, removed, "Cart cleared");
    load(&state, &user_id).await
}
