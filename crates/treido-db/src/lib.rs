//! # treido-db: Database Layer for the Treido Marketplace
//!
//! SQLite storage via sqlx: catalog, server-side carts and orders.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Marketplace Data Flow                               │
//! │                                                                         │
//! │  HTTP handler / CheckoutService / CartSession                          │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                     treido-db (THIS CRATE)                      │   │
//! │  │                                                                 │   │
//! │  │   ┌───────────────┐    ┌────────────────┐   ┌──────────────┐   │   │
//! │  │   │   Database    │    │  Repositories  │   │  Migrations  │   │   │
//! │  │   │   (pool.rs)   │    │                │   │  (embedded)  │   │   │
//! │  │   │               │    │ ProductRepo    │   │              │   │   │
//! │  │   │ SqlitePool    │◄───│ CategoryRepo   │   │ 001_initial_ │   │   │
//! │  │   │               │    │ CartRepo       │   │ schema.sql   │   │   │
//! │  │   │               │    │ OrderRepo      │   │              │   │   │
//! │  │   │               │    │ ProfileRepo    │   │              │   │   │
//! │  │   └───────────────┘    └────────────────┘   └──────────────┘   │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  SQLite database file (path from [database] config)                    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Usage
//!
//! ```rust,ignore
//! use treido_db::{Database, DbConfig};
//!
//! let db = Database::new(DbConfig::new("market.db")).await?;
//! let context = db.categories().context("smartphones").await?;
//! let page = db.products().list_newest(&ProductFeedQuery::for_category("smartphones")).await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod migrations;
pub mod pool;
pub mod repository;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{DbError, DbResult};
pub use pool::{Database, DbConfig};

pub use repository::cart::CartRepository;
pub use repository::category::CategoryRepository;
pub use repository::order::{NewOrder, OrderRepository};
pub use repository::product::{ProductFeedQuery, ProductRepository};
pub use repository::profile::ProfileRepository;
