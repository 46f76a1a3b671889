//! # Domain Types
//!
//! Products, feed pages and orders.
//!
//! ## Type Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Domain Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    Product      │   │     Order       │   │   OrderItem     │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  id (UUID)      │   │  id (UUID)      │   │  order_id (FK)  │       │
//! │  │  seller_id      │   │  user_id        │   │  seller_id      │       │
//! │  │  price_cents    │   │  total_cents    │   │  quantity       │       │
//! │  │  stock          │   │  payment intent │   │  price at buy   │       │
//! │  └────────┬────────┘   └─────────────────┘   └─────────────────┘       │
//! │           │ projected to                                                │
//! │  ┌────────▼────────┐   ┌─────────────────┐                              │
//! │  │  ProductCard    │──►│  ProductPage    │  { products, hasMore }       │
//! │  └─────────────────┘   └─────────────────┘                              │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Snapshot Pattern
//! `OrderItem.price_at_purchase_cents` freezes the price paid; later edits
//! to the listing never change past orders.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use ts_rs::TS;

use crate::money::{self, Money};

// =============================================================================
// Product
// =============================================================================

/// A marketplace listing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Product {
    pub id: String,
    /// Profile id of the seller.
    pub seller_id: String,
    pub category_id: Option<String>,
    pub title: String,
    pub slug: Option<String>,
    /// Price in minor units.
    pub price_cents: i64,
    pub images: Vec<String>,
    /// When false, stock is never decremented.
    pub track_inventory: bool,
    pub stock: i64,
    pub is_active: bool,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Product {
    #[inline]
    pub fn price(&self) -> Money {
        Money::from_minor(self.price_cents)
    }

    /// First image, if any.
    pub fn primary_image(&self) -> Option<&str> {
        self.images.first().map(String::as_str)
    }
}

/// A product as shown in feeds and search results.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductCard {
    pub id: String,
    pub title: String,
    #[serde(with = "money::major_units")]
    #[ts(type = "number")]
    pub price: Money,
    pub image: String,
    pub slug: Option<String>,
    /// Seller username.
    pub store_slug: Option<String>,
    pub category_slug: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

/// One page of a product feed.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[serde(rename_all = "camelCase")]
#[ts(export)]
pub struct ProductPage {
    #[serde(default)]
    pub products: Vec<ProductCard>,
    #[serde(default)]
    pub has_more: bool,
}

// =============================================================================
// Profile
// =============================================================================

/// A buyer/seller account.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::FromRow))]
#[ts(export)]
pub struct Profile {
    pub id: String,
    pub username: Option<String>,
    pub display_name: Option<String>,
}

// =============================================================================
// Orders
// =============================================================================

/// Lifecycle of an order. Checkout only ever creates `Paid` orders.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[cfg_attr(feature = "sqlx", derive(sqlx::Type))]
#[cfg_attr(feature = "sqlx", sqlx(rename_all = "lowercase"))]
#[serde(rename_all = "lowercase")]
#[ts(export)]
pub enum OrderStatus {
    #[default]
    Pending,
    Paid,
    Shipped,
    Delivered,
    Cancelled,
}

/// Postal address captured by the payment provider.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct PostalAddress {
    pub city: Option<String>,
    pub country: Option<String>,
    pub line1: Option<String>,
    pub line2: Option<String>,
    pub postal_code: Option<String>,
    pub state: Option<String>,
}

/// Buyer contact and shipping address stored with an order.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct ShippingAddress {
    pub name: Option<String>,
    pub email: Option<String>,
    pub address: PostalAddress,
}

/// A paid order.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct Order {
    pub id: String,
    /// Buyer.
    pub user_id: String,
    pub total_cents: i64,
    pub status: OrderStatus,
    pub shipping_address: Option<ShippingAddress>,
    /// Unique: at most one order per payment intent.
    pub stripe_payment_intent_id: Option<String>,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl Order {
    #[inline]
    pub fn total(&self) -> Money {
        Money::from_minor(self.total_cents)
    }
}

/// A line of an order, one per purchased product/variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, TS)]
#[ts(export)]
pub struct OrderItem {
    pub id: String,
    pub order_id: String,
    pub product_id: String,
    pub seller_id: String,
    pub variant_id: Option<String>,
    pub quantity: i64,
    /// Unit price paid (frozen).
    pub price_at_purchase_cents: i64,
    #[ts(as = "String")]
    pub created_at: DateTime<Utc>,
}

impl OrderItem {
    #[inline]
    pub fn line_total(&self) -> Money {
        Money::from_minor(self.price_at_purchase_cents) * self.quantity
    }
}
