//! # Cart Reconciliation
//!
//! Keeps the shopper's cart consistent across a guest device cart and the
//! signed-in user's server cart.
//!
//! ## Auth Transitions
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    on_auth_change(user)                                 │
//! │                                                                         │
//! │  guest ──► user A        merge device cart into A's server cart,       │
//! │                          then reload A's server cart                   │
//! │                                                                         │
//! │  user A ──► user A       nothing (A is synced once per session)        │
//! │                                                                         │
//! │  user A ──► user B       clear items + device cart, then sync B        │
//! │                                                                         │
//! │  user A ──► guest        clear items + device cart                     │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Merge
//! ```text
//! device "cart" ──► sanitize ──► empty? ──► remove key, done
//!                                  │
//!                                  ▼
//!                 for each line: cart_add_item(user, line)
//!                        │ first error
//!                        └──► stop, keep device cart (nothing is lost)
//!                                  │ all ok
//!                                  ▼
//!                          remove device cart
//! ```
//!
//! The device cart is only written while shopping as a guest. Once signed in
//! the server cart is the source of truth, so a later merge cannot add the
//! same lines twice.

use std::sync::Arc;

use async_trait::async_trait;
use tracing::{debug, info, warn};
use treido_core::cart::{read_cart_value, sanitize_items, QuantityChange, StorageAction};
use treido_core::{storage_keys, Cart, CartItem, Money};
use treido_db::Database;

use crate::error::{MarketError, MarketResult};
use crate::storage::CartStorage;

// =============================================================================
// Remote Cart
// =============================================================================

/// The signed-in user's server-side cart.
#[async_trait]
pub trait RemoteCart: Send + Sync {
    /// `cart_add_item`: adds to a line, creating it if needed.
    async fn add_item(&self, user_id: &str, item: &CartItem) -> MarketResult<()>;

    /// `cart_set_quantity`: zero removes the line.
    async fn set_quantity(
        &self,
        user_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> MarketResult<()>;

    /// `cart_clear`.
    async fn clear(&self, user_id: &str) -> MarketResult<()>;

    /// Current server cart lines.
    async fn load(&self, user_id: &str) -> MarketResult<Vec<CartItem>>;
}

/// [`RemoteCart`] over the marketplace database.
#[derive(Debug, Clone)]
pub struct DbRemoteCart {
    db: Database,
}

impl DbRemoteCart {
    pub fn new(db: Database) -> Self {
        DbRemoteCart { db }
    }
}

#[async_trait]
impl RemoteCart for DbRemoteCart {
    async fn add_item(&self, user_id: &str, item: &CartItem) -> MarketResult<()> {
        self.db
            .carts()
            .add_item(user_id, &item.id, item.variant_id.as_deref(), item.quantity)
            .await?;
        Ok(())
    }

    async fn set_quantity(
        &self,
        user_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> MarketResult<()> {
        self.db
            .carts()
            .set_quantity(user_id, product_id, variant_id, quantity)
            .await?;
        Ok(())
    }

    async fn clear(&self, user_id: &str) -> MarketResult<()> {
        self.db.carts().clear(user_id).await?;
        Ok(())
    }

    async fn load(&self, user_id: &str) -> MarketResult<Vec<CartItem>> {
        Ok(self.db.carts().list_for_user(user_id).await?)
    }
}

// =============================================================================
// Cart Session
// =============================================================================

/// One shopper's cart across sign-in and sign-out.
///
/// Wrap in `tokio::sync::Mutex` when shared between tasks.
pub struct CartSession {
    cart: Cart,
    storage: Arc<dyn CartStorage>,
    remote: Arc<dyn RemoteCart>,
    user_id: Option<String>,
    synced_user: Option<String>,
    storage_loaded: bool,
    syncing: bool,
}

impl CartSession {
    pub fn new(storage: Arc<dyn CartStorage>, remote: Arc<dyn RemoteCart>) -> Self {
        CartSession {
            cart: Cart::new(),
            storage,
            remote,
            user_id: None,
            synced_user: None,
            storage_loaded: false,
            syncing: false,
        }
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn items(&self) -> &[CartItem] {
        self.cart.items()
    }

    pub fn user_id(&self) -> Option<&str> {
        self.user_id.as_deref()
    }

    pub fn total_items(&self) -> i64 {
        self.cart.total_items()
    }

    pub fn subtotal(&self) -> Money {
        self.cart.subtotal()
    }

    /// Device cart loaded and no server sync in flight.
    pub fn is_ready(&self) -> bool {
        self.storage_loaded && !self.syncing
    }

    // =========================================================================
    // Device Storage
    // =========================================================================

    /// Loads the device cart, repairing the stored value if needed.
    pub fn load_from_storage(&mut self) {
        let raw = match self.storage.get(storage_keys::CART) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart");
                None
            }
        };

        let stored = read_cart_value(raw.as_deref());
        let result = match stored.storage_action() {
            StorageAction::Keep => Ok(()),
            StorageAction::Rewrite => {
                debug!(kept = stored.items.len(), "Rewriting sanitized stored cart");
                self.write_storage(&stored.items)
            }
            StorageAction::Remove => {
                debug!("Removing unusable stored cart");
                self.storage.remove(storage_keys::CART)
            }
        };
        if let Err(e) = result {
            warn!(error = %e, "Failed to repair stored cart");
        }

        if !stored.items.is_empty() {
            self.cart.replace(stored.items);
        }
        self.storage_loaded = true;
    }

    fn write_storage(&self, items: &[CartItem]) -> MarketResult<()> {
        let encoded =
            serde_json::to_string(&sanitize_items(items)).map_err(|e| MarketError::Storage(e.to_string()))?;
        self.storage.set(storage_keys::CART, &encoded)
    }

    /// Writes the current lines to the device cart while shopping as a guest.
    fn persist(&self) {
        if self.user_id.is_some() {
            return;
        }
        if let Err(e) = self.write_storage(self.cart.items()) {
            warn!(error = %e, "Failed to persist cart");
        }
    }

    fn clear_local(&mut self) {
        self.cart.clear();
        if let Err(e) = self.storage.remove(storage_keys::CART) {
            warn!(error = %e, "Failed to clear stored cart");
        }
    }

    // =========================================================================
    // Auth Transitions
    // =========================================================================

    /// Reacts to the signed-in user changing. See the module docs.
    pub async fn on_auth_change(&mut self, user_id: Option<&str>) {
        let user_id = user_id.filter(|id| !id.is_empty());
        let previous = self.user_id.clone();

        let Some(user_id) = user_id else {
            if previous.is_some() {
                info!("Signed out, clearing cart");
                self.synced_user = None;
                self.clear_local();
            }
            self.user_id = None;
            return;
        };

        if previous.as_deref().is_some_and(|prev| prev != user_id) {
            info!(user_id = %user_id, "User switched, clearing cart");
            self.synced_user = None;
            self.clear_local();
        }

        self.user_id = Some(user_id.to_string());
        if self.synced_user.as_deref() == Some(user_id) {
            return;
        }
        self.synced_user = Some(user_id.to_string());

        self.syncing = true;
        let merged = self.merge_local_into_server(user_id).await;
        debug!(user_id = %user_id, merged, "Device cart merge finished");
        self.reload(user_id).await;
        self.syncing = false;
    }

    /// Pushes the device cart into the user's server cart.
    ///
    /// ## Returns
    /// * `true` - Nothing to merge, or every line was added (device cart removed)
    /// * `false` - A line failed; the device cart is kept for a later retry
    pub async fn merge_local_into_server(&self, user_id: &str) -> bool {
        let raw = match self.storage.get(storage_keys::CART) {
            Ok(raw) => raw,
            Err(e) => {
                warn!(error = %e, "Failed to read stored cart for merge");
                return false;
            }
        };

        let stored = read_cart_value(raw.as_deref());
        if stored.items.is_empty() {
            if stored.had_raw_value {
                if let Err(e) = self.storage.remove(storage_keys::CART) {
                    warn!(error = %e, "Failed to remove empty stored cart");
                }
            }
            return true;
        }

        if stored.was_sanitized {
            if let Err(e) = self.write_storage(&stored.items) {
                warn!(error = %e, "Failed to rewrite stored cart before merge");
            }
        }

        for item in &stored.items {
            if let Err(e) = self.remote.add_item(user_id, item).await {
                warn!(
                    user_id = %user_id,
                    product_id = %item.id,
                    error = %e,
                    "cart_add_item failed, keeping device cart"
                );
                return false;
            }
        }

        if let Err(e) = self.storage.remove(storage_keys::CART) {
            warn!(error = %e, "Failed to remove merged device cart");
        }
        info!(user_id = %user_id, lines = stored.items.len(), "Device cart merged");
        true
    }

    /// Replaces the lines with the server cart. Failures keep the current lines.
    async fn reload(&mut self, user_id: &str) {
        match self.remote.load(user_id).await {
            Ok(items) => self.cart.replace(items),
            Err(e) => warn!(user_id = %user_id, error = %e, "Failed to load server cart"),
        }
    }

    // =========================================================================
    // Cart Operations
    // =========================================================================

    /// Adds a line (or merges into an existing one).
    pub async fn add_to_cart(&mut self, item: CartItem) -> MarketResult<()> {
        let added = self.cart.add_item(item)?;
        self.persist();

        if let Some(user_id) = self.user_id.clone() {
            if let Err(e) = self.remote.add_item(&user_id, &added).await {
                warn!(user_id = %user_id, product_id = %added.id, error = %e, "cart_add_item failed");
            }
            self.reload(&user_id).await;
        }
        Ok(())
    }

    /// Sets a line's quantity; invalid or zero quantities remove it.
    pub async fn update_quantity(&mut self, product_id: &str, variant_id: Option<&str>, quantity: i64) {
        let change = self.cart.update_quantity(product_id, variant_id, quantity);
        self.persist();

        if let Some(user_id) = self.user_id.clone() {
            let server_quantity = match change {
                QuantityChange::Set(quantity) => quantity,
                QuantityChange::Removed => 0,
            };
            if let Err(e) = self
                .remote
                .set_quantity(&user_id, product_id, variant_id, server_quantity)
                .await
            {
                warn!(user_id = %user_id, product_id = %product_id, error = %e, "cart_set_quantity failed");
            }
            self.reload(&user_id).await;
        }
    }

    pub async fn remove_from_cart(&mut self, product_id: &str, variant_id: Option<&str>) {
        self.cart.remove_item(product_id, variant_id);
        self.persist();

        if let Some(user_id) = self.user_id.clone() {
            if let Err(e) = self.remote.set_quantity(&user_id, product_id, variant_id, 0).await {
                warn!(user_id = %user_id, product_id = %product_id, error = %e, "cart_set_quantity failed");
            }
            self.reload(&user_id).await;
        }
    }

    pub async fn clear_cart(&mut self) {
        self.cart.clear();
        self.persist();

        if let Some(user_id) = self.user_id.clone() {
            if let Err(e) = self.remote.clear(&user_id).await {
                warn!(user_id = %user_id, error = %e, "cart_clear failed");
            }
            self.reload(&user_id).await;
        }
    }
}
