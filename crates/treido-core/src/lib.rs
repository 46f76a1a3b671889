//! # treido-core: Pure Marketplace Rules
//!
//! Everything in this crate is a deterministic function of its inputs.
//! Storage, HTTP and the payment provider live in `treido-db` and the
//! `treido-market` app; this crate only decides what is valid.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Treido Marketplace Core                            │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                 Web storefront (EN / BG)                        │   │
//! │  │   Category browser ──► Cart drawer ──► Checkout ──► Success     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │ HTTP / JSON                            │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 treido-market (axum)                            │   │
//! │  │   /api/categories  /api/products  /api/cart  /api/checkout      │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ treido-core (THIS CRATE) ★                      │   │
//! │  │                                                                 │   │
//! │  │   ┌──────────┐ ┌──────────┐ ┌──────────┐ ┌──────────────────┐  │   │
//! │  │   │  money   │ │   cart   │ │ checkout │ │ category/locale  │  │   │
//! │  │   │  Money   │ │ CartItem │ │ Session  │ │ CategoryContext  │  │   │
//! │  │   │ (minor)  │ │ sanitize │ │  Items   │ │ display names    │  │   │
//! │  │   └──────────┘ └──────────┘ └──────────┘ └──────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • PURE FUNCTIONS           │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                 treido-db (SQLite repositories)                 │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`money`] - Integer minor-unit money, exact decimal parsing
//! - [`cart`] - Cart items, sanitizing, the in-memory cart
//! - [`checkout`] - Session items, order item drafting, stock floor rule
//! - [`category`] - Category nodes, attributes, attribute filter keys
//! - [`locale`] - Supported storefront locales
//! - [`types`] - Products, orders, feed pages
//! - [`validation`] - Input validation
//! - [`error`] - Domain error types
//!
//! ## Example Usage
//!
//! ```rust
//! use treido_core::cart::sanitize_cart_items;
//! use serde_json::json;
//!
//! let raw = json!([
//!     { "id": "p1", "title": "Lamp", "price": 10, "quantity": 150 },
//!     { "id": "p2", "title": "Desk", "price": -5, "quantity": 2 },
//! ]);
//!
//! let items = sanitize_cart_items(&raw);
//! assert_eq!(items.len(), 1);
//! assert_eq!(items[0].quantity, 99);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod cart;
pub mod category;
pub mod checkout;
pub mod error;
pub mod locale;
pub mod money;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================

pub use cart::{Cart, CartItem};
pub use category::{CategoryAttribute, CategoryContext, CategoryLite};
pub use checkout::{SessionItem, VerifyErrorCode, VerifyOutcome};
pub use error::{CoreError, CoreResult, ValidationError};
pub use locale::Locale;
pub use money::Money;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Maximum quantity of a single cart line.
///
/// Larger quantities are clamped, not rejected: a stored `150` becomes `99`.
pub const MAX_CART_QUANTITY: i64 = 99;

/// Largest integer a storefront client can represent exactly (2^53 - 1).
///
/// Quantities beyond this are treated as garbage rather than clamped.
pub const MAX_SAFE_INTEGER: i64 = 9_007_199_254_740_991;

/// Products per page in category feeds.
pub const PRODUCTS_PAGE_SIZE: u32 = 24;

/// Upper bound for a caller-supplied feed page size.
pub const MAX_PAGE_SIZE: u32 = 100;

/// Shorter search text returns no results instead of the whole catalog.
pub const MIN_SEARCH_QUERY_CHARS: usize = 2;

/// How many recent search terms are remembered.
pub const RECENT_SEARCHES_LIMIT: usize = 5;

/// How many products opened from search are remembered.
pub const RECENT_PRODUCTS_LIMIT: usize = 6;

/// Image shown when a cart line or product has no usable image.
pub const PLACEHOLDER_IMAGE: &str = "/placeholder.svg";

/// Prefix marking category attribute filters in a query string (`attr_color=red`).
pub const ATTR_PARAM_PREFIX: &str = "attr_";

/// Client-side storage keys.
///
/// These are the keys the storefront persists between visits. The cart key
/// holds a JSON array of [`CartItem`]s. `recentSearches` holds strings and
/// `recentSearchedProducts` holds product records, both newest first.
pub mod storage_keys {
    pub const CART: &str = "cart";
    pub const RECENT_SEARCHES: &str = "recentSearches";
    pub const RECENT_SEARCHED_PRODUCTS: &str = "recentSearchedProducts";
    pub const REMEMBER_ME: &str = "remember-me";
    pub const REMEMBERED_EMAIL: &str = "remembered-email";
}
