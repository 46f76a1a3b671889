//! Checkout routes.
//!
//! ```text
//! POST /api/checkout/session  { items?, locale? }  ──► { sessionId, url }
//!        items omitted ──► the caller's server cart is checked out
//!
//! POST /api/checkout/verify   { sessionId }        ──► VerifyOutcome
//! ```
//!
//! Failures carry the checkout code in `reason` (`selfPurchase`,
//! `paymentNotCompleted`, ...).

use std::sync::Arc;

use axum::extract::State;
use axum::http::{header, HeaderMap};
use axum::Json;
use serde::Deserialize;
use tracing::info;
use treido_core::{CartItem, VerifyOutcome};

use super::AppState;
use crate::checkout::CreateSessionOutcome;
use crate::error::ApiError;
use crate::locale::{infer_locale, LOCALE_HEADER};

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionRequest {
    #[serde(default)]
    pub items: Option<Vec<CartItem>>,
    #[serde(default)]
    pub locale: Option<String>,
}

#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct VerifyRequest {
    pub session_id: String,
}

fn header_str<'a>(headers: &'a HeaderMap, name: &str) -> Option<&'a str> {
    headers.get(name).and_then(|value| value.to_str().ok())
}

/// `POST /api/checkout/session`
pub async fn create_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<CreateSessionRequest>,
) -> Result<Json<CreateSessionOutcome>, ApiError> {
    let user_id = state.current_user(&headers);
    let locale = infer_locale(
        request.locale.as_deref(),
        header_str(&headers, LOCALE_HEADER),
        header_str(&headers, header::REFERER.as_str()),
    );

    let outcome = match &request.items {
        Some(items) => {
            state
                .checkout
                .create_session(user_id.as_deref(), items, locale)
                .await?
        }
        None => {
            state
                .checkout
                .create_session_for_cart(user_id.as_deref(), locale)
                .await?
        }
    };

    info!(session_id = %outcome.session_id, locale = %locale, "Checkout session opened");
    Ok(Json(outcome))
}

/// `POST /api/checkout/verify`
pub async fn verify_session(
    State(state): State<Arc<AppState>>,
    headers: HeaderMap,
    Json(request): Json<VerifyRequest>,
) -> Result<Json<VerifyOutcome>, ApiError> {
    let user_id = state.current_user(&headers);
    let outcome = state
        .checkout
        .verify_and_create_order(user_id.as_deref(), &request.session_id)
        .await?;
    Ok(Json(outcome))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, state, state_with};
    use crate::error::{MarketError, MarketResult};
    use crate::payment::{CheckoutSession, NewCheckoutSession, PaymentGateway};
    use async_trait::async_trait;
    use axum::http::StatusCode;
    use serde_json::json;
    use std::sync::Arc;
    use tokio::sync::Mutex;

    /// Gateway that opens sessions locally and reports them as paid.
    #[derive(Default)]
    struct PaidGateway {
        last: Mutex<Option<NewCheckoutSession>>,
    }

    #[async_trait]
    impl PaymentGateway for PaidGateway {
        async fn create_checkout_session(&self, request: &NewCheckoutSession) -> MarketResult<CheckoutSession> {
            *self.last.lock().await = Some(request.clone());
            Ok(CheckoutSession {
                id: "cs_test_api".into(),
                url: Some("https://pay.test/cs_test_api".into()),
                ..Default::default()
            })
        }

        async fn retrieve_checkout_session(&self, session_id: &str) -> MarketResult<CheckoutSession> {
            let Some(request) = self.last.lock().await.clone() else {
                return Err(MarketError::Payment("No such checkout.session".into()));
            };
            Ok(CheckoutSession {
                id: session_id.to_string(),
                payment_status: Some("paid".into()),
                payment_intent: Some(json!("pi_api")),
                amount_total: Some(3998),
                client_reference_id: Some(request.client_reference_id),
                metadata: request.metadata,
                ..Default::default()
            })
        }
    }

    #[tokio::test]
    async fn test_session_requires_sign_in() {
        let state = state().await;
        let (status, body) = send(&state, "POST", "/api/checkout/session", None, Some(json!({}))).await;
        assert_eq!(status, StatusCode::UNAUTHORIZED);
        assert_eq!(body["reason"], "authRequired");
    }

    #[tokio::test]
    async fn test_self_purchase_and_provider_errors() {
        let state = state().await;
        let items = json!({ "items": [{ "id": "p1", "title": "Oak chair", "price": 19.99, "quantity": 1 }] });

        let (status, body) = send(&state, "POST", "/api/checkout/session", Some("seller"), Some(items.clone())).await;
        assert_eq!(status, StatusCode::UNPROCESSABLE_ENTITY);
        assert_eq!(body["reason"], "selfPurchase");

        // payments disabled
        let (status, body) = send(&state, "POST", "/api/checkout/session", Some("buyer"), Some(items)).await;
        assert_eq!(status, StatusCode::BAD_GATEWAY);
        assert_eq!(body["reason"], "payment");
    }

    #[tokio::test]
    async fn test_checkout_round_trip_through_routes() {
        let gateway = Arc::new(PaidGateway::default());
        let state = state_with(gateway.clone()).await;
        let user = Some("buyer");

        send(&state, "POST", "/api/cart", user, Some(json!({ "productId": "p1", "quantity": 2 }))).await;
        let (status, body) = send(&state, "POST", "/api/checkout/session", user, Some(json!({ "locale": "bg" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["sessionId"], "cs_test_api");
        let created = gateway.last.lock().await.clone().unwrap();
        assert!(created.cancel_url.ends_with("/bg/cart"));

        let (status, body) = send(&state, "POST", "/api/checkout/verify", user, Some(json!({ "sessionId": "cs_test_api" }))).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["itemCount"], 2);
        assert_eq!(body["isExisting"], false);

        let (_, again) = send(&state, "POST", "/api/checkout/verify", user, Some(json!({ "sessionId": "cs_test_api" }))).await;
        assert_eq!(again["orderId"], body["orderId"]);
        assert_eq!(again["isExisting"], true);

        let (_, cart) = send(&state, "GET", "/api/cart", user, None).await;
        assert_eq!(cart["totalItems"], 0);
    }

    #[tokio::test]
    async fn test_verify_rejects_bad_session_id() {
        let state = state().await;
        for session_id in ["pi_123", " cs_/../../../../v1/customers "] {
            let (status, body) = send(&state, "POST", "/api/checkout/verify", Some("buyer"), Some(json!({ "sessionId": session_id }))).await;
            assert_eq!(status, StatusCode::BAD_REQUEST);
            assert_eq!(body["reason"], "invalidSession");
        }
    }
}
