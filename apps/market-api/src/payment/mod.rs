//! # Payment Gateway
//!
//! The hosted payment provider behind checkout.
//!
//! ## Checkout Session Lifecycle
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Hosted Checkout Session                              │
//! │                                                                         │
//! │  create_checkout_session(NewCheckoutSession)                           │
//! │       │   line items (current prices), metadata.items_json,            │
//! │       │   metadata.user_id, client_reference_id                        │
//! │       ▼                                                                 │
//! │  CheckoutSession { id: "cs_...", url } ──► buyer pays on hosted page   │
//! │                                                 │                       │
//! │                                                 ▼                       │
//! │  success_url?session_id=cs_...  ──► retrieve_checkout_session(id)      │
//! │                                       payment_status, payment_intent,  │
//! │                                       amount_total, customer_details   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod stripe;

use async_trait::async_trait;
use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;
use treido_core::{Money, PostalAddress, ShippingAddress};

use crate::error::{MarketError, MarketResult};

pub use stripe::StripeGateway;

/// Placeholder the provider replaces with the real session id in return URLs.
pub const SESSION_ID_PLACEHOLDER: &str = "{CHECKOUT_SESSION_ID}";

// =============================================================================
// Requests
// =============================================================================

/// One line on the hosted payment page.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CheckoutLineItem {
    pub name: String,
    pub unit_amount: Money,
    pub quantity: i64,
    pub image: Option<String>,
}

/// Everything needed to open a hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewCheckoutSession {
    pub currency: String,
    pub line_items: Vec<CheckoutLineItem>,
    pub success_url: String,
    pub cancel_url: String,
    pub client_reference_id: String,
    pub metadata: BTreeMap<String, String>,
}

// =============================================================================
// Responses
// =============================================================================

/// Buyer details collected on the hosted page.
#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub name: Option<String>,
    #[serde(default)]
    pub email: Option<String>,
    #[serde(default)]
    pub address: Option<PostalAddress>,
}

impl CustomerDetails {
    /// Shipping address as stored with the order.
    pub fn to_shipping_address(&self) -> ShippingAddress {
        ShippingAddress {
            name: self.name.clone(),
            email: self.email.clone(),
            address: self.address.clone().unwrap_or_default(),
        }
    }
}

/// A checkout session as returned by the provider.
///
/// Only the fields checkout reads are modelled; everything else is ignored.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    /// `paid`, `unpaid` or `no_payment_required`.
    #[serde(default)]
    pub payment_status: Option<String>,
    /// Id string, or an expanded object when requested with `expand[]`.
    #[serde(default)]
    pub payment_intent: Option<Value>,
    /// Minor units.
    #[serde(default)]
    pub amount_total: Option<i64>,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub metadata: BTreeMap<String, String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
}

impl CheckoutSession {
    pub fn is_paid(&self) -> bool {
        self.payment_status.as_deref() == Some("paid")
    }

    /// The payment intent id, only when the provider returned a plain string.
    pub fn payment_intent_id(&self) -> Option<&str> {
        self.payment_intent
            .as_ref()
            .and_then(Value::as_str)
            .filter(|id| !id.is_empty())
    }

    pub fn metadata_value(&self, key: &str) -> Option<&str> {
        self.metadata.get(key).map(String::as_str)
    }

    /// Amount charged; missing totals count as zero.
    pub fn total(&self) -> Money {
        Money::from_minor(self.amount_total.unwrap_or(0))
    }
}

// =============================================================================
// Gateway Trait
// =============================================================================

/// A hosted-checkout payment provider.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Opens a hosted checkout session.
    async fn create_checkout_session(&self, request: &NewCheckoutSession) -> MarketResult<CheckoutSession>;

    /// Fetches a session by id.
    async fn retrieve_checkout_session(&self, session_id: &str) -> MarketResult<CheckoutSession>;
}

/// Gateway used when payments are not configured. Every call fails.
#[derive(Debug, Clone, Copy, Default)]
pub struct DisabledPayments;

#[async_trait]
impl PaymentGateway for DisabledPayments {
    async fn create_checkout_session(&self, _request: &NewCheckoutSession) -> MarketResult<CheckoutSession> {
        Err(MarketError::Payment("payments are not configured".into()))
    }

    async fn retrieve_checkout_session(&self, _session_id: &str) -> MarketResult<CheckoutSession> {
        Err(MarketError::Payment("payments are not configured".into()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    #[test]
    fn test_session_deserialization() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_test_1",
            "object": "checkout.session",
            "payment_status": "paid",
            "payment_intent": "pi_1",
            "amount_total": 2599,
            "client_reference_id": "buyer",
            "metadata": { "user_id": "buyer", "items_json": "[]" },
            "customer_details": {
                "name": "Ivan",
                "email": "ivan@example.com",
                "address": { "city": "Sofia", "country": "BG", "line1": null }
            }
        }))
        .unwrap();

        assert!(session.is_paid());
        assert_eq!(session.payment_intent_id(), Some("pi_1"));
        assert_eq!(session.total(), Money::from_minor(2599));
        assert_eq!(session.metadata_value("user_id"), Some("buyer"));

        let shipping = session.customer_details.unwrap().to_shipping_address();
        assert_eq!(shipping.address.city.as_deref(), Some("Sofia"));
    }

    #[test]
    fn test_expanded_payment_intent_is_not_an_id() {
        let session: CheckoutSession = serde_json::from_value(json!({
            "id": "cs_test_1",
            "payment_intent": { "id": "pi_1", "object": "payment_intent" }
        }))
        .unwrap();
        assert_eq!(session.payment_intent_id(), None);
        assert!(!session.is_paid());
    }

    #[tokio::test]
    async fn test_disabled_payments_fail() {
        let err = DisabledPayments.retrieve_checkout_session("cs_1").await.unwrap_err();
        assert!(matches!(err, MarketError::Payment(_)));
    }
}
