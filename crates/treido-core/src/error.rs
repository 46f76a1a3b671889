//! # Error Types
//!
//! Domain-specific error types for treido-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  treido-core errors (this file)                                        │
//! │  ├── CoreError        - Marketplace rule violations                    │
//! │  └── ValidationError  - Input validation failures                      │
//! │                                                                         │
//! │  treido-db errors                                                      │
//! │  └── DbError          - Database operation failures                    │
//! │                                                                         │
//! │  treido-market errors                                                  │
//! │  ├── MarketError      - Payment / catalog / storage / config           │
//! │  └── ApiError         - What the storefront sees (code + message)      │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → MarketError → ApiError → Client   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

// =============================================================================
// Core Error
// =============================================================================

/// Marketplace rule violations.
#[derive(Debug, Error)]
pub enum CoreError {
    /// Product referenced by a cart line does not exist.
    #[error("Product not found: {0}")]
    ProductNotFound(String),

    /// The buyer is also the seller of one of the cart lines.
    ///
    /// ## User Workflow
    /// ```text
    /// Seller adds own listing to cart
    ///      │
    ///      ▼
    /// Checkout ──► ensure_not_self_purchase()
    ///      │
    ///      ▼
    /// SelfPurchase { product_id } ──► "You cannot buy your own listing"
    /// ```
    #[error("Cannot purchase your own product: {product_id}")]
    SelfPurchase { product_id: String },

    /// Checkout was started with nothing to buy.
    #[error("Cart is empty")]
    EmptyCart,

    /// A cart line failed normalization (missing id, bad price or quantity).
    #[error("Invalid cart item: {reason}")]
    InvalidCartItem { reason: String },

    /// Encoding session metadata failed.
    #[error("Serialization failed: {0}")]
    Serialization(String),

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),
}

impl From<serde_json::Error> for CoreError {
    fn from(err: serde_json::Error) -> Self {
        CoreError::Serialization(err.to_string())
    }
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input validation errors.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Invalid format (bad session id, slug with a path separator).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;
