//! # Treido Market
//!
//! The network-facing half of the marketplace: HTTP API, checkout against the
//! payment provider, and the storefront-side state (cart reconciliation,
//! category browsing, device storage).
//!
//! ## Architecture
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         treido-market                                   │
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  api (axum)    │  │  checkout      │  │  payment                   ││
//! │  │                │  │                │  │                            ││
//! │  │ • catalog      │─►│ • session      │─►│ • PaymentGateway trait     ││
//! │  │ • cart         │  │ • verify/order │  │ • StripeGateway (reqwest)  ││
//! │  │ • checkout     │  │                │  │ • DisabledPayments         ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │  ┌────────────────┐  ┌────────────────┐  ┌────────────────────────────┐│
//! │  │  cart_sync     │  │  browse        │  │  storage                   ││
//! │  │                │  │                │  │                            ││
//! │  │ • CartSession  │  │ • CategoryBrow.│  │ • CartStorage trait        ││
//! │  │ • RemoteCart   │  │ • CatalogSource│  │ • memory / JSON file       ││
//! │  │ • merge on     │  │ • HttpCatalog  │  │ • RecentSearches/Products  ││
//! │  │   sign-in      │  │ • DbCatalog    │  │                            ││
//! │  └────────────────┘  └────────────────┘  └────────────────────────────┘│
//! │                                                                         │
//! │           config • error • locale • tracing setup                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod api;
pub mod browse;
pub mod cart_sync;
pub mod checkout;
pub mod config;
pub mod error;
pub mod locale;
pub mod payment;
pub mod storage;

use tracing_subscriber::EnvFilter;

// Re-exports
pub use api::{router, AppState};
pub use checkout::CheckoutService;
pub use config::MarketConfig;
pub use error::{ApiError, MarketError, MarketResult};

/// Filter used when `RUST_LOG` is unset.
pub const DEFAULT_LOG_FILTER: &str = "info,treido=debug,sqlx=warn";

/// Installs the global tracing subscriber.
///
/// Calling it twice is harmless; the second call is ignored.
pub fn init_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(DEFAULT_LOG_FILTER));

    let _ = tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_target(true)
        .try_init();
}
