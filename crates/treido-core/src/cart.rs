//! # Cart Module
//!
//! Cart lines, the normalization rules every line passes through, and the
//! in-memory [`Cart`] the storefront session mutates.
//!
//! ## Where Cart Lines Come From
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Cart Line Sources                                    │
//! │                                                                         │
//! │  localStorage["cart"] (untrusted JSON)                                  │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  read_cart_value() ──► sanitize_cart_items() ──► Vec<CartItem>          │
//! │                              │                                          │
//! │                              ├── no id              → dropped           │
//! │                              ├── price < 0 / NaN    → dropped           │
//! │                              ├── qty ≤ 0 / garbage  → dropped           │
//! │                              └── qty 150            → 99                │
//! │                                                                         │
//! │  Add-to-cart button ──► Cart::add_item() ──► same normalization         │
//! │                                                                         │
//! │  Server cart rows ──► treido-db CartRepository::list_for_user()         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Lines are keyed by `(id, variant_id)`: the same product in two variants
//! is two lines.

use serde::{Deserialize, Serialize};
use serde_json::Value;
use ts_rs::TS;

use crate::error::{CoreError, CoreResult};
use crate::money::{self, Money};
use crate::{MAX_CART_QUANTITY, MAX_SAFE_INTEGER, PLACEHOLDER_IMAGE};

// =============================================================================
// Cart Item
// =============================================================================

/// A single cart line as the storefront persists it.
///
/// ## Wire Format
/// ```json
/// {
///   "id": "7f0c...",
///   "variantId": "v-blue",
///   "title": "Oak desk",
///   "price": 129.9,
///   "image": "https://cdn.treido.eu/desk.jpg",
///   "quantity": 2,
///   "slug": "oak-desk",
///   "username": "woodshop",
///   "storeSlug": "woodshop"
/// }
/// ```
/// `storeSlug` is the deprecated alias of `username`; both are kept in step
/// by [`normalize_seller_slugs`].
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct CartItem {
    /// Product id.
    pub id: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variant_id: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub variant_name: Option<String>,

    #[serde(default)]
    pub title: String,

    /// Unit price. Serialized in major units.
    #[serde(with = "money::major_units")]
    #[ts(type = "number")]
    pub price: Money,

    #[serde(default)]
    pub image: String,

    /// Always within 1..=99 once normalized.
    pub quantity: i64,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub slug: Option<String>,

    /// Seller username.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub username: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    #[ts(optional)]
    pub store_slug: Option<String>,
}

impl CartItem {
    /// Creates a bare line for a product. Optional fields start empty.
    pub fn new(id: impl Into<String>, title: impl Into<String>, price: Money, quantity: i64) -> Self {
        CartItem {
            id: id.into(),
            variant_id: None,
            variant_name: None,
            title: title.into(),
            price,
            image: PLACEHOLDER_IMAGE.to_string(),
            quantity,
            slug: None,
            username: None,
            store_slug: None,
        }
    }

    /// Sets the variant this line refers to.
    pub fn with_variant(mut self, variant_id: impl Into<String>) -> Self {
        self.variant_id = Some(variant_id.into());
        self
    }

    /// Sets the seller username.
    pub fn with_seller(mut self, username: impl Into<String>) -> Self {
        self.username = Some(username.into());
        self
    }

    /// True if this line is `(id, variant_id)`.
    #[inline]
    pub fn matches(&self, id: &str, variant_id: Option<&str>) -> bool {
        self.id == id && self.variant_id.as_deref() == variant_id
    }

    /// Unit price × quantity, saturating on overflow.
    #[inline]
    pub fn line_total(&self) -> Money {
        self.price * self.quantity
    }

    /// Re-applies every normalization rule to an already typed line.
    ///
    /// Returns `None` when the line would be dropped by
    /// [`sanitize_cart_items`].
    pub fn normalized(&self) -> Option<CartItem> {
        if self.id.is_empty() || self.price.is_negative() {
            return None;
        }
        let quantity = normalize_quantity_i64(self.quantity)?;
        let (username, store_slug) =
            normalize_seller_slugs(self.username.as_deref(), self.store_slug.as_deref());

        Some(CartItem {
            image: normalize_image_url(Some(&self.image)),
            quantity,
            username,
            store_slug,
            ..self.clone()
        })
    }
}

// =============================================================================
// Normalization Rules
// =============================================================================

/// Normalizes an integer quantity: must be positive and safe, capped at 99.
pub fn normalize_quantity_i64(quantity: i64) -> Option<i64> {
    if quantity <= 0 || quantity > MAX_SAFE_INTEGER {
        return None;
    }
    Some(quantity.min(MAX_CART_QUANTITY))
}

fn normalize_quantity_f64(quantity: f64) -> Option<i64> {
    if !quantity.is_finite() {
        return None;
    }
    let floored = quantity.floor();
    if floored <= 0.0 || floored > MAX_SAFE_INTEGER as f64 {
        return None;
    }
    Some((floored as i64).min(MAX_CART_QUANTITY))
}

/// Normalizes a loosely typed quantity.
///
/// ## Rules
/// ```text
/// 2        → 2         "3"   → 3        2.9 → 2
/// 150      → 99        "abc" → None     0.5 → None   (floors to 0)
/// 0 / -1   → None      null  → None     2^60 → None  (unsafe integer)
/// ```
pub fn normalize_quantity(value: &Value) -> Option<i64> {
    match value {
        Value::Number(n) => {
            if let Some(whole) = n.as_i64() {
                normalize_quantity_i64(whole)
            } else if n.as_u64().is_some() {
                None
            } else {
                n.as_f64().and_then(normalize_quantity_f64)
            }
        }
        Value::String(s) => {
            let trimmed = s.trim();
            if trimmed.is_empty() {
                return None;
            }
            trimmed.parse::<f64>().ok().and_then(normalize_quantity_f64)
        }
        _ => None,
    }
}

/// Normalizes a loosely typed major-unit price. Negative or non-numeric → `None`.
///
/// The sign is checked on the raw value, so `-0.004` is rejected even though
/// it would round to zero.
pub fn normalize_price(value: &Value) -> Option<Money> {
    let negative = match value {
        Value::Number(n) => n.as_f64().is_some_and(|f| f.is_sign_negative() && f != 0.0),
        Value::String(s) => s.trim().starts_with('-') && s.trim().parse::<f64>().is_ok_and(|f| f != 0.0),
        _ => false,
    };
    if negative {
        return None;
    }
    Money::from_json_major(value).filter(|price| !price.is_negative())
}

/// Keeps `username` and its deprecated alias `storeSlug` in step.
///
/// `username` falls back to a non-empty `storeSlug`; `storeSlug` falls back
/// to `username`. Empty strings never survive.
pub fn normalize_seller_slugs(
    username: Option<&str>,
    store_slug: Option<&str>,
) -> (Option<String>, Option<String>) {
    let non_empty = |s: &&str| !s.is_empty();

    let resolved_username = match username {
        Some(name) => Some(name),
        None => store_slug.filter(non_empty),
    }
    .filter(non_empty);

    let resolved_store_slug = store_slug.filter(non_empty).or(username.filter(non_empty));

    (
        resolved_username.map(str::to_string),
        resolved_store_slug.map(str::to_string),
    )
}

/// Normalizes an image reference for display.
///
/// Missing or blank → placeholder; protocol-relative `//cdn/x` → `https://cdn/x`.
pub fn normalize_image_url(image: Option<&str>) -> String {
    match image.map(str::trim) {
        None | Some("") => PLACEHOLDER_IMAGE.to_string(),
        Some(url) if url.starts_with("//") => format!("https:{}", url),
        Some(url) => url.to_string(),
    }
}

// =============================================================================
// Sanitizing Untrusted Input
// =============================================================================

fn string_field(entry: &serde_json::Map<String, Value>, key: &str) -> Option<String> {
    entry.get(key).and_then(Value::as_str).map(str::to_string)
}

fn sanitize_entry(entry: &Value) -> Option<CartItem> {
    let obj = entry.as_object()?;

    let id = obj.get("id").and_then(Value::as_str).filter(|id| !id.is_empty())?;
    let price = normalize_price(obj.get("price").unwrap_or(&Value::Null))?;
    let quantity = normalize_quantity(obj.get("quantity").unwrap_or(&Value::Null))?;

    let username = string_field(obj, "username");
    let store_slug = string_field(obj, "storeSlug");
    let (username, store_slug) =
        normalize_seller_slugs(username.as_deref(), store_slug.as_deref());

    Some(CartItem {
        id: id.to_string(),
        variant_id: string_field(obj, "variantId"),
        variant_name: string_field(obj, "variantName"),
        title: string_field(obj, "title").unwrap_or_default(),
        price,
        image: normalize_image_url(obj.get("image").and_then(Value::as_str)),
        quantity,
        slug: string_field(obj, "slug"),
        username,
        store_slug,
    })
}

/// Sanitizes an untrusted JSON array of cart lines.
///
/// Lines without a non-empty string id, with an invalid price, or with an
/// invalid quantity are dropped. Non-array input yields no lines.
pub fn sanitize_cart_items(raw: &Value) -> Vec<CartItem> {
    raw.as_array()
        .map(|entries| entries.iter().filter_map(sanitize_entry).collect())
        .unwrap_or_default()
}

/// Sanitizes already typed lines (used before persisting state).
pub fn sanitize_items(items: &[CartItem]) -> Vec<CartItem> {
    items.iter().filter_map(CartItem::normalized).collect()
}

// =============================================================================
// Stored Cart Report
// =============================================================================

/// What to do with the persisted cart after reading it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum StorageAction {
    /// Stored value is fine as is.
    Keep,
    /// Some lines were dropped; write the sanitized list back.
    Rewrite,
    /// Value was corrupt or every line was invalid; delete the key.
    Remove,
}

/// Result of reading the persisted `cart` value.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct StoredCart {
    pub items: Vec<CartItem>,
    /// A non-empty value existed under the key.
    pub had_raw_value: bool,
    /// The value was not a JSON array.
    pub was_corrupt: bool,
    /// At least one line was dropped.
    pub was_sanitized: bool,
}

impl StoredCart {
    /// Decides how the stored value should be repaired.
    pub fn storage_action(&self) -> StorageAction {
        if !self.items.is_empty() {
            if self.was_sanitized {
                StorageAction::Rewrite
            } else {
                StorageAction::Keep
            }
        } else if self.had_raw_value && (self.was_corrupt || self.was_sanitized) {
            StorageAction::Remove
        } else {
            StorageAction::Keep
        }
    }
}

/// Parses and sanitizes the raw text stored under the `cart` key.
pub fn read_cart_value(raw: Option<&str>) -> StoredCart {
    let raw = match raw {
        Some(text) if !text.is_empty() => text,
        _ => return StoredCart::default(),
    };

    let parsed: Value = serde_json::from_str(raw).unwrap_or(Value::Null);
    let entries = match parsed.as_array() {
        Some(entries) => entries,
        None => {
            return StoredCart {
                items: Vec::new(),
                had_raw_value: true,
                was_corrupt: true,
                was_sanitized: false,
            }
        }
    };

    let items = sanitize_cart_items(&parsed);
    let was_sanitized = items.len() != entries.len();

    StoredCart {
        items,
        had_raw_value: true,
        was_corrupt: false,
        was_sanitized,
    }
}

// =============================================================================
// Cart
// =============================================================================

/// Outcome of a quantity change.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum QuantityChange {
    /// Line now holds this (normalized) quantity.
    Set(i64),
    /// Quantity was invalid or zero; the line was removed.
    Removed,
}

/// The shopping cart.
///
/// ## Invariants
/// - Lines are unique by `(id, variant_id)`; adding an existing line merges
/// - Every quantity is within 1..=99
/// - Every price is non-negative
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Cart {
    items: Vec<CartItem>,
}

impl Cart {
    pub fn new() -> Self {
        Cart { items: Vec::new() }
    }

    /// Builds a cart from lines, sanitizing each one.
    pub fn from_items(items: Vec<CartItem>) -> Self {
        Cart {
            items: sanitize_items(&items),
        }
    }

    pub fn items(&self) -> &[CartItem] {
        &self.items
    }

    pub fn into_items(self) -> Vec<CartItem> {
        self.items
    }

    pub fn is_empty(&self) -> bool {
        self.items.is_empty()
    }

    pub fn len(&self) -> usize {
        self.items.len()
    }

    pub fn find(&self, id: &str, variant_id: Option<&str>) -> Option<&CartItem> {
        self.items.iter().find(|item| item.matches(id, variant_id))
    }

    /// Adds a line or merges it into an existing `(id, variant_id)` line.
    ///
    /// ## Behavior
    /// - Invalid line (empty id, negative price, bad quantity) → error, cart unchanged
    /// - Existing line → quantities summed, capped at 99
    /// - New line → appended
    ///
    /// Returns the normalized line as added, which is what a server-side
    /// mirror should receive (the server merges quantities itself).
    pub fn add_item(&mut self, item: CartItem) -> CoreResult<CartItem> {
        if item.id.is_empty() {
            return Err(CoreError::InvalidCartItem {
                reason: "missing product id".to_string(),
            });
        }
        if item.price.is_negative() {
            return Err(CoreError::InvalidCartItem {
                reason: format!("negative price for {}", item.id),
            });
        }
        let normalized = item.normalized().ok_or_else(|| CoreError::InvalidCartItem {
            reason: format!("invalid quantity {} for {}", item.quantity, item.id),
        })?;

        if let Some(existing) = self
            .items
            .iter_mut()
            .find(|line| line.matches(&normalized.id, normalized.variant_id.as_deref()))
        {
            existing.quantity = existing
                .quantity
                .checked_add(normalized.quantity)
                .and_then(normalize_quantity_i64)
                .unwrap_or(MAX_CART_QUANTITY);
        } else {
            self.items.push(normalized.clone());
        }

        Ok(normalized)
    }

    /// Sets a line's quantity. An invalid quantity removes the line.
    pub fn update_quantity(&mut self, id: &str, variant_id: Option<&str>, quantity: i64) -> QuantityChange {
        match normalize_quantity_i64(quantity) {
            Some(normalized) => {
                for line in self.items.iter_mut().filter(|line| line.matches(id, variant_id)) {
                    line.quantity = normalized;
                }
                QuantityChange::Set(normalized)
            }
            None => {
                self.remove_item(id, variant_id);
                QuantityChange::Removed
            }
        }
    }

    /// Removes the `(id, variant_id)` line. Returns true if something was removed.
    pub fn remove_item(&mut self, id: &str, variant_id: Option<&str>) -> bool {
        let before = self.items.len();
        self.items.retain(|line| !line.matches(id, variant_id));
        self.items.len() != before
    }

    pub fn clear(&mut self) {
        self.items.clear();
    }

    /// Replaces every line (e.g. with the server cart after a reload).
    pub fn replace(&mut self, items: Vec<CartItem>) {
        self.items = sanitize_items(&items);
    }

    /// Sum of quantities.
    pub fn total_items(&self) -> i64 {
        self.items.iter().map(|line| line.quantity).sum()
    }

    /// Sum of line totals. Saturates instead of overflowing.
    pub fn subtotal(&self) -> Money {
        self.items.iter().map(CartItem::line_total).sum()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn item(id: &str, price_minor: i64, quantity: i64) -> CartItem {
        CartItem::new(id, format!("Item {}", id), Money::from_minor(price_minor), quantity)
    }

    #[test]
    fn test_normalize_quantity_rules() {
        assert_eq!(normalize_quantity(&json!(2)), Some(2));
        assert_eq!(normalize_quantity(&json!("3")), Some(3));
        assert_eq!(normalize_quantity(&json!(2.9)), Some(2));
        assert_eq!(normalize_quantity(&json!(150)), Some(99));
        assert_eq!(normalize_quantity(&json!(0)), None);
        assert_eq!(normalize_quantity(&json!(-4)), None);
        assert_eq!(normalize_quantity(&json!(0.5)), None);
        assert_eq!(normalize_quantity(&json!("abc")), None);
        assert_eq!(normalize_quantity(&json!("")), None);
        assert_eq!(normalize_quantity(&json!(null)), None);
        assert_eq!(normalize_quantity(&json!(1_u64 << 60)), None);
    }

    #[test]
    fn test_normalize_price_rules() {
        assert_eq!(normalize_price(&json!(10)), Some(Money::from_minor(1000)));
        assert_eq!(normalize_price(&json!("4.20")), Some(Money::from_minor(420)));
        assert_eq!(normalize_price(&json!(0)), Some(Money::zero()));
        assert_eq!(normalize_price(&json!(-5)), None);
        assert_eq!(normalize_price(&json!("free")), None);
        assert_eq!(normalize_price(&json!(-0.004)), None);
        assert_eq!(normalize_price(&json!("-0.004")), None);
        assert_eq!(normalize_price(&json!(0.004)), Some(Money::zero()));
    }

    #[test]
    fn test_seller_slug_fallbacks() {
        assert_eq!(
            normalize_seller_slugs(Some("anna"), None),
            (Some("anna".to_string()), Some("anna".to_string()))
        );
        assert_eq!(
            normalize_seller_slugs(None, Some("shop")),
            (Some("shop".to_string()), Some("shop".to_string()))
        );
        assert_eq!(
            normalize_seller_slugs(Some(""), Some("shop")),
            (None, Some("shop".to_string()))
        );
        assert_eq!(normalize_seller_slugs(None, Some("")), (None, None));
    }

    #[test]
    fn test_image_normalization() {
        assert_eq!(normalize_image_url(None), PLACEHOLDER_IMAGE);
        assert_eq!(normalize_image_url(Some("  ")), PLACEHOLDER_IMAGE);
        assert_eq!(normalize_image_url(Some("//cdn.x/a.jpg")), "https://cdn.x/a.jpg");
        assert_eq!(normalize_image_url(Some("/img/a.jpg")), "/img/a.jpg");
    }

    #[test]
    fn test_sanitize_drops_invalid_and_clamps() {
        let raw = json!([
            { "id": "p1", "price": -5, "quantity": 2 },
            { "id": "p2", "price": 10, "quantity": 150, "title": "Chair" },
            { "price": 10, "quantity": 1 },
            { "id": "", "price": 10, "quantity": 1 },
            { "id": "p3", "price": "abc", "quantity": 1 },
            { "id": "p4", "price": 1, "quantity": 0 },
            "not an object",
            { "id": "p5", "price": "2.50", "quantity": "4", "storeSlug": "shop" },
        ]);

        let items = sanitize_cart_items(&raw);
        assert_eq!(items.len(), 2);

        assert_eq!(items[0].id, "p2");
        assert_eq!(items[0].quantity, 99);
        assert_eq!(items[0].price, Money::from_minor(1000));
        assert_eq!(items[0].image, PLACEHOLDER_IMAGE);

        assert_eq!(items[1].id, "p5");
        assert_eq!(items[1].quantity, 4);
        assert_eq!(items[1].price, Money::from_minor(250));
        assert_eq!(items[1].username.as_deref(), Some("shop"));
    }

    #[test]
    fn test_sanitize_non_array_is_empty() {
        assert!(sanitize_cart_items(&json!({ "id": "p1" })).is_empty());
        assert!(sanitize_cart_items(&json!(null)).is_empty());
    }

    #[test]
    fn test_read_cart_value_reports() {
        let missing = read_cart_value(None);
        assert!(!missing.had_raw_value);
        assert_eq!(missing.storage_action(), StorageAction::Keep);

        let corrupt = read_cart_value(Some("{not json"));
        assert!(corrupt.had_raw_value && corrupt.was_corrupt);
        assert_eq!(corrupt.storage_action(), StorageAction::Remove);

        let object = read_cart_value(Some(r#"{"id":"p1"}"#));
        assert!(object.was_corrupt);

        let partly = read_cart_value(Some(
            r#"[{"id":"p1","price":1,"quantity":1},{"id":"p2","price":-1,"quantity":1}]"#,
        ));
        assert!(partly.was_sanitized);
        assert_eq!(partly.items.len(), 1);
        assert_eq!(partly.storage_action(), StorageAction::Rewrite);

        let all_bad = read_cart_value(Some(r#"[{"id":"p2","price":-1,"quantity":1}]"#));
        assert_eq!(all_bad.storage_action(), StorageAction::Remove);

        let clean = read_cart_value(Some(r#"[{"id":"p1","price":1,"quantity":1}]"#));
        assert_eq!(clean.storage_action(), StorageAction::Keep);
    }

    #[test]
    fn test_add_item_merges_by_product_and_variant() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", 500, 2)).unwrap();
        cart.add_item(item("p1", 500, 3)).unwrap();
        cart.add_item(item("p1", 500, 1).with_variant("blue")).unwrap();

        assert_eq!(cart.len(), 2);
        assert_eq!(cart.find("p1", None).unwrap().quantity, 5);
        assert_eq!(cart.find("p1", Some("blue")).unwrap().quantity, 1);
    }

    #[test]
    fn test_add_item_caps_merged_quantity() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", 100, 90)).unwrap();
        let added = cart.add_item(item("p1", 100, 20)).unwrap();

        assert_eq!(added.quantity, 20);
        assert_eq!(cart.find("p1", None).unwrap().quantity, 99);
    }

    #[test]
    fn test_add_item_rejects_invalid_lines() {
        let mut cart = Cart::new();
        assert!(cart.add_item(item("", 100, 1)).is_err());
        assert!(cart.add_item(item("p1", -1, 1)).is_err());
        assert!(cart.add_item(item("p1", 100, 0)).is_err());
        assert!(cart.is_empty());
    }

    #[test]
    fn test_update_quantity_and_remove() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", 250, 1)).unwrap();
        cart.add_item(item("p2", 100, 1)).unwrap();

        assert_eq!(cart.update_quantity("p1", None, 4), QuantityChange::Set(4));
        assert_eq!(cart.update_quantity("p1", None, 500), QuantityChange::Set(99));
        assert_eq!(cart.update_quantity("p2", None, 0), QuantityChange::Removed);
        assert!(cart.find("p2", None).is_none());

        assert!(cart.remove_item("p1", None));
        assert!(!cart.remove_item("p1", None));
        assert!(cart.is_empty());
    }

    #[test]
    fn test_totals() {
        let mut cart = Cart::new();
        cart.add_item(item("p1", 1099, 3)).unwrap();
        cart.add_item(item("p2", 250, 2)).unwrap();

        assert_eq!(cart.total_items(), 5);
        assert_eq!(cart.subtotal(), Money::from_minor(3797));

        cart.clear();
        assert_eq!(cart.total_items(), 0);
        assert!(cart.subtotal().is_zero());
    }

    #[test]
    fn test_subtotal_saturates_on_huge_stored_price() {
        let stored = read_cart_value(Some(r#"[{"id":"p1","price":90000000000000000,"quantity":99}]"#));
        assert_eq!(stored.items.len(), 1);

        let cart = Cart::from_items(stored.items);
        assert_eq!(cart.items()[0].line_total().minor(), i64::MAX);
        assert_eq!(cart.subtotal().minor(), i64::MAX);
    }

    #[test]
    fn test_cart_item_json_shape() {
        let line = item("p1", 1099, 2).with_variant("v1").with_seller("anna");
        let value = serde_json::to_value(line.normalized().unwrap()).unwrap();

        assert_eq!(value["variantId"], "v1");
        assert_eq!(value["price"], json!(10.99));
        assert_eq!(value["storeSlug"], "anna");
        assert!(value.get("slug").is_none());

        let round: Vec<CartItem> = sanitize_cart_items(&json!([value]));
        assert_eq!(round[0].price, Money::from_minor(1099));
    }
}
