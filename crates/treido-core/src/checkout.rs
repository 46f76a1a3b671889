//! # Checkout Rules
//!
//! The pure half of checkout: what goes into the payment session, how it is
//! read back, and how an order is drafted from it.
//!
//! ## Checkout Round Trip
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                       Checkout Round Trip                               │
//! │                                                                         │
//! │  Cart lines                                                             │
//! │     │ ensure_not_self_purchase()                                        │
//! │     │ session_items_from_cart()                                         │
//! │     ▼                                                                   │
//! │  metadata.items_json = encode_session_items()  ──► payment provider     │
//! │                                                                         │
//! │                    ... buyer pays on hosted page ...                    │
//! │                                                                         │
//! │  payment provider ──► session.metadata.items_json                       │
//! │     │ parse_session_items_json()   (bad entries dropped)                │
//! │     │ build_order_items()          (unknown products dropped)           │
//! │     ▼                                                                   │
//! │  orders + order_items ──► stock decrement per line (floored at 0)       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::cart::{normalize_price, normalize_quantity, CartItem};
use crate::error::{CoreError, CoreResult};
use crate::money::{self, Money};

// =============================================================================
// Session Items
// =============================================================================

/// One purchased line as embedded in the session's `items_json` metadata.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct SessionItem {
    /// Product id.
    pub id: String,
    #[serde(rename = "variantId", default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variant_id: Option<String>,
    pub qty: i64,
    /// Unit price, major units on the wire.
    #[serde(with = "money::major_units")]
    #[ts(type = "number")]
    pub price: Money,
}

/// Maps cart lines to session items.
pub fn session_items_from_cart(items: &[CartItem]) -> Vec<SessionItem> {
    items
        .iter()
        .map(|item| SessionItem {
            id: item.id.clone(),
            variant_id: item.variant_id.clone(),
            qty: item.quantity,
            price: item.price,
        })
        .collect()
}

/// Serializes session items for the `items_json` metadata field.
pub fn encode_session_items(items: &[SessionItem]) -> CoreResult<String> {
    Ok(serde_json::to_string(items)?)
}

fn parse_session_entry(entry: &Value) -> Option<SessionItem> {
    let obj = entry.as_object()?;
    let id = obj.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
    let qty = normalize_quantity(obj.get("qty").unwrap_or(&Value::Null))?;
    let price = normalize_price(obj.get("price").unwrap_or(&Value::Null))?;

    Some(SessionItem {
        id: id.to_string(),
        variant_id: obj
            .get("variantId")
            .and_then(Value::as_str)
            .filter(|v| !v.is_empty())
            .map(str::to_string),
        qty,
        price,
    })
}

/// Reads `items_json` back from session metadata.
///
/// Missing, unparsable or non-array metadata yields `None`. Entries that
/// fail validation are dropped individually.
pub fn parse_session_items_json(raw: Option<&str>) -> Option<Vec<SessionItem>> {
    let raw = raw.filter(|s| !s.trim().is_empty())?;
    let parsed: Value = serde_json::from_str(raw).ok()?;
    let entries = parsed.as_array()?;
    Some(entries.iter().filter_map(parse_session_entry).collect())
}

/// Total units across session items.
pub fn session_item_count(items: &[SessionItem]) -> i64 {
    items.iter().map(|item| item.qty).sum()
}

// =============================================================================
// Buyer / Seller Rules
// =============================================================================

/// Resolves who paid for a session.
///
/// `client_reference_id` wins when present; otherwise `metadata.user_id`.
/// Empty values count as no buyer.
pub fn resolve_buyer_id<'a>(
    client_reference_id: Option<&'a str>,
    metadata_user_id: Option<&'a str>,
) -> Option<&'a str> {
    client_reference_id
        .or(metadata_user_id)
        .filter(|id| !id.is_empty())
}

/// Rejects checkout when any line is sold by the buyer.
///
/// `sellers` yields `(product_id, seller_id)` pairs.
pub fn ensure_not_self_purchase<'a, I>(user_id: &str, sellers: I) -> CoreResult<()>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    match sellers.into_iter().find(|(_, seller_id)| *seller_id == user_id) {
        Some((product_id, _)) => Err(CoreError::SelfPurchase {
            product_id: product_id.to_string(),
        }),
        None => Ok(()),
    }
}

// =============================================================================
// Order Drafting
// =============================================================================

/// An order line ready to insert.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OrderItemDraft {
    pub product_id: String,
    pub seller_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    pub price_at_purchase: Money,
}

/// Drafts order lines, dropping items whose product has no known seller.
pub fn build_order_items(
    items: &[SessionItem],
    sellers: &HashMap<String, String>,
) -> Vec<OrderItemDraft> {
    items
        .iter()
        .filter_map(|item| {
            let seller_id = sellers.get(&item.id).filter(|s| !s.is_empty())?;
            Some(OrderItemDraft {
                product_id: item.id.clone(),
                seller_id: seller_id.clone(),
                variant_id: item.variant_id.clone(),
                quantity: item.qty,
                price_at_purchase: item.price,
            })
        })
        .collect()
}

/// Total units across drafted lines.
pub fn draft_item_count(drafts: &[OrderItemDraft]) -> i64 {
    drafts.iter().map(|d| d.quantity).sum()
}

// =============================================================================
// Verification Result
// =============================================================================

/// Machine-readable reasons order verification can fail.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub enum VerifyErrorCode {
    InvalidSession,
    AuthRequired,
    NotAuthorized,
    PaymentNotCompleted,
    MissingPaymentIntent,
    MissingItems,
    Database,
    Unknown,
}

impl VerifyErrorCode {
    /// Wire name, as serialized.
    pub const fn as_str(&self) -> &'static str {
        match self {
            VerifyErrorCode::InvalidSession => "invalidSession",
            VerifyErrorCode::AuthRequired => "authRequired",
            VerifyErrorCode::NotAuthorized => "notAuthorized",
            VerifyErrorCode::PaymentNotCompleted => "paymentNotCompleted",
            VerifyErrorCode::MissingPaymentIntent => "missingPaymentIntent",
            VerifyErrorCode::MissingItems => "missingItems",
            VerifyErrorCode::Database => "database",
            VerifyErrorCode::Unknown => "unknown",
        }
    }

    /// The message shown to the buyer.
    pub const fn message(&self) -> &'static str {
        match self {
            VerifyErrorCode::InvalidSession => "Invalid checkout session.",
            VerifyErrorCode::AuthRequired => "User not authenticated.",
            VerifyErrorCode::NotAuthorized => "Not authorized to verify this session.",
            VerifyErrorCode::PaymentNotCompleted => "Payment not completed.",
            VerifyErrorCode::MissingPaymentIntent => "Missing payment intent.",
            VerifyErrorCode::MissingItems => "Checkout session items are missing.",
            VerifyErrorCode::Database => "Failed to create order.",
            VerifyErrorCode::Unknown => {
                "Failed to verify checkout session. Please contact support if payment was charged."
            }
        }
    }
}

/// Successful verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct VerifyOutcome {
    pub order_id: String,
    /// Amount charged, major units on the wire.
    #[serde(with = "money::major_units")]
    #[ts(type = "number")]
    pub total_amount: Money,
    pub item_count: i64,
    /// True when the order already existed for this payment intent.
    pub is_existing: bool,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn session_item(id: &str, qty: i64, price_minor: i64) -> SessionItem {
        SessionItem {
            id: id.to_string(),
            variant_id: None,
            qty,
            price: Money::from_minor(price_minor),
        }
    }

    #[test]
    fn test_items_json_round_trip_shape() {
        let items = vec![SessionItem {
            variant_id: Some("v1".into()),
            ..session_item("p1", 2, 1999)
        }];
        let encoded = encode_session_items(&items).unwrap();
        assert_eq!(encoded, r#"[{"id":"p1","variantId":"v1","qty":2,"price":19.99}]"#);
        assert_eq!(parse_session_items_json(Some(&encoded)), Some(items));
    }

    #[test]
    fn test_parse_items_json_drops_bad_entries() {
        let raw = r#"[
            {"id":"p1","qty":1,"price":5},
            {"id":"","qty":1,"price":5},
            {"id":"p2","qty":0,"price":5},
            {"id":"p3","qty":1,"price":-1},
            {"id":"p4","qty":"2","price":"3.50","variantId":""}
        ]"#;
        let items = parse_session_items_json(Some(raw)).unwrap();
        assert_eq!(items.len(), 2);
        assert_eq!(items[1].qty, 2);
        assert_eq!(items[1].price, Money::from_minor(350));
        assert_eq!(items[1].variant_id, None);
    }

    #[test]
    fn test_parse_items_json_missing_or_corrupt() {
        assert_eq!(parse_session_items_json(None), None);
        assert_eq!(parse_session_items_json(Some("")), None);
        assert_eq!(parse_session_items_json(Some("{oops")), None);
        assert_eq!(parse_session_items_json(Some(r#"{"id":"p1"}"#)), None);
        assert_eq!(parse_session_items_json(Some("[]")), Some(Vec::new()));
    }

    #[test]
    fn test_resolve_buyer_id() {
        assert_eq!(resolve_buyer_id(Some("u1"), Some("u2")), Some("u1"));
        assert_eq!(resolve_buyer_id(None, Some("u2")), Some("u2"));
        assert_eq!(resolve_buyer_id(Some(""), Some("u2")), None);
        assert_eq!(resolve_buyer_id(None, None), None);
    }

    #[test]
    fn test_self_purchase_rejected() {
        let sellers = [("p1", "seller-a"), ("p2", "buyer")];
        let err = ensure_not_self_purchase("buyer", sellers).unwrap_err();
        assert!(matches!(err, CoreError::SelfPurchase { ref product_id } if product_id == "p2"));

        assert!(ensure_not_self_purchase("someone-else", sellers).is_ok());
    }

    #[test]
    fn test_build_order_items_skips_unknown_products() {
        let items = vec![session_item("p1", 2, 1000), session_item("ghost", 1, 500)];
        let sellers = HashMap::from([("p1".to_string(), "s1".to_string())]);

        let drafts = build_order_items(&items, &sellers);
        assert_eq!(drafts.len(), 1);
        assert_eq!(drafts[0].seller_id, "s1");
        assert_eq!(draft_item_count(&drafts), 2);
        assert_eq!(session_item_count(&items), 3);
    }

    #[test]
    fn test_verify_error_code_wire_names() {
        assert_eq!(
            serde_json::to_string(&VerifyErrorCode::PaymentNotCompleted).unwrap(),
            r#""paymentNotCompleted""#
        );
    }

    #[test]
    fn test_verify_outcome_shape() {
        let outcome = VerifyOutcome {
            order_id: "o1".into(),
            total_amount: Money::from_minor(4250),
            item_count: 3,
            is_existing: false,
        };
        let value = serde_json::to_value(&outcome).unwrap();
        assert_eq!(value["orderId"], "o1");
        assert_eq!(value["totalAmount"], serde_json::json!(42.5));
        assert_eq!(value["isExisting"], false);
    }
}
