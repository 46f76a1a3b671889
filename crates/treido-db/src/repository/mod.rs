//! # Repository Module
//!
//! Database repositories for the marketplace.
//!
//! ## Repository Pattern
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Repository Layout                                    │
//! │                                                                         │
//! │  Handler / service                                                     │
//! │       │  db.carts().add_item(user, product, None, 2)                   │
//! │       ▼                                                                 │
//! │  CartRepository                                                        │
//! │  ├── add_item        (cart_add_item)                                   │
//! │  ├── set_quantity    (cart_set_quantity)                               │
//! │  ├── clear           (cart_clear)                                      │
//! │  └── list_for_user                                                     │
//! │       │  SQL                                                            │
//! │       ▼                                                                 │
//! │  SQLite Database                                                       │
//! │                                                                         │
//! │  Every cart and order query is scoped by user id.                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Available Repositories
//!
//! - [`product::ProductRepository`] - Feeds, search, seller lookup, stock
//! - [`category::CategoryRepository`] - Tree lookups, context, attributes
//! - [`cart::CartRepository`] - Server-side cart procedures
//! - [`order::OrderRepository`] - Orders keyed by payment intent
//! - [`profile::ProfileRepository`] - Buyer/seller profiles

pub mod cart;
pub mod category;
pub mod order;
pub mod product;
pub mod profile;

use uuid::Uuid;

/// Generates a new row id.
pub fn generate_id() -> String {
    Uuid::new_v4().to_string()
}

/// Decodes a JSON text column holding a list of strings.
///
/// NULL, empty and malformed values decode to an empty list.
pub(crate) fn decode_string_list(raw: Option<&str>) -> Vec<String> {
    raw.and_then(|text| serde_json::from_str::<Vec<String>>(text).ok())
        .unwrap_or_default()
}
