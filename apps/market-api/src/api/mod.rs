//! # HTTP API
//!
//! axum routes over the catalog, the signed-in user's server cart and
//! checkout.
//!
//! ## Routes
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  GET    /health                          liveness + database check     │
//! │                                                                         │
//! │  GET    /api/categories                  root categories               │
//! │  GET    /api/categories/{slug}/context   parent, siblings, children    │
//! │  GET    /api/products/newest             ?category&page&limit&attr_*   │
//! │  GET    /api/products/search             ?q&page&limit                 │
//! │                                                                         │
//! │  GET    /api/cart                        server cart           (auth)  │
//! │  POST   /api/cart                        cart_add_item         (auth)  │
//! │  PATCH  /api/cart                        cart_set_quantity     (auth)  │
//! │  DELETE /api/cart                        cart_clear            (auth)  │
//! │                                                                         │
//! │  POST   /api/checkout/session            hosted checkout       (auth)  │
//! │  POST   /api/checkout/verify             verify + create order (auth)  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Authentication happens upstream. The user id arrives in the header named
//! by `[auth] user_header` (default `x-user-id`).

pub mod cart;
pub mod catalog;
pub mod checkout;

use std::sync::Arc;

use axum::http::HeaderMap;
use axum::extract::State;
use axum::routing::{get, post};
use axum::{Json, Router};
use serde_json::{json, Value};
use tracing::debug;
use treido_db::Database;

use crate::checkout::CheckoutService;
use crate::config::MarketConfig;
use crate::error::ApiError;

/// Shared application state.
pub struct AppState {
    pub db: Database,
    pub checkout: CheckoutService,
    pub config: MarketConfig,
}

impl AppState {
    /// User id from the trusted auth header. Blank values read as signed out.
    pub fn current_user(&self, headers: &HeaderMap) -> Option<String> {
        headers
            .get(self.config.auth.user_header.as_str())
            .and_then(|value| value.to_str().ok())
            .map(str::trim)
            .filter(|value| !value.is_empty())
            .map(str::to_string)
    }

    /// Like [`AppState::current_user`], but rejects anonymous callers.
    pub fn require_user(&self, headers: &HeaderMap) -> Result<String, ApiError> {
        self.current_user(headers).ok_or_else(ApiError::unauthorized)
    }
}

/// Builds the API router.
pub fn router(state: Arc<AppState>) -> Router {
    Router::new()
        .route("/health", get(health))
        .route("/api/categories", get(catalog::list_categories))
        .route("/api/categories/{slug}/context", get(catalog::category_context))
        .route("/api/products/newest", get(catalog::newest_products))
        .route("/api/products/search", get(catalog::search_products))
        .route(
            "/api/cart",
            get(cart::get_cart)
                .post(cart::add_item)
                .patch(cart::set_quantity)
                .delete(cart::clear_cart),
        )
        .route("/api/checkout/session", post(checkout::create_session))
        .route("/api/checkout/verify", post(checkout::verify_session))
        .with_state(state)
}

async fn health(State(state): State<Arc<AppState>>) -> Json<Value> {
    let database = state.db.health_check().await;
    debug!(database, "health check");
    let status = if database { "ok" } else { "degraded" };
    Json(json!({
        "status": status,
        "database": database,
    }))
}


#[cfg(test)]
mod tests {
    use super::test_support::{send, state};
    use super::*;
    use axum::http::StatusCode;

    #[tokio::test]
    async fn test_health() {
        let state = state().await;
        let (status, body) = send(&state, "GET", "/health", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["status"], "ok");
    }

    #[tokio::test]
    async fn test_current_user_header() {
        let state = state().await;
        let mut headers = HeaderMap::new();
        assert_eq!(state.current_user(&headers), None);
        headers.insert("x-user-id", "  ".parse().unwrap());
        assert!(state.require_user(&headers).is_err());
        headers.insert("x-user-id", "buyer".parse().unwrap());
        assert_eq!(state.current_user(&headers).as_deref(), Some("buyer"));
    }
}
