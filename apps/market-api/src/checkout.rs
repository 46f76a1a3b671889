//! # Checkout
//!
//! Opens hosted checkout sessions and turns paid sessions into orders.
//!
//! ## Verify and Create Order
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                  verify_and_create_order(user, cs_...)                  │
//! │                                                                         │
//! │  1. session id "cs_..."?               no ─► invalidSession            │
//! │  2. signed in?                         no ─► authRequired              │
//! │  3. retrieve session (provider)     error ─► unknown                   │
//! │  4. buyer == user?                     no ─► notAuthorized             │
//! │  5. payment_status == "paid"?          no ─► paymentNotCompleted       │
//! │  6. payment_intent is an id?           no ─► missingPaymentIntent      │
//! │  7. order exists for payment intent?                                   │
//! │        other buyer ─► notAuthorized                                    │
//! │        same buyer  ─► Ok { is_existing: true }                         │
//! │  8. items_json has items?              no ─► missingItems              │
//! │  9. insert order                    error ─► re-check step 7, database │
//! │ 10. seller map + draft lines        empty ─► missingItems              │
//! │ 11. insert order items              error ─► database                  │
//! │ 12. decrement stock (floored, untracked skipped)   failures logged     │
//! │ 13. remove purchased products from server cart     failures logged     │
//! │                                                                         │
//! │  Sequential, no transaction: partial failures are logged, not undone.  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{BTreeMap, HashMap, HashSet};
use std::sync::Arc;

use serde::Serialize;
use thiserror::Error;
use tracing::{debug, error, info, instrument, warn};
use treido_core::cart::sanitize_items;
use treido_core::checkout::{
    build_order_items, draft_item_count, encode_session_items, ensure_not_self_purchase,
    parse_session_items_json, resolve_buyer_id, session_item_count, SessionItem,
};
use treido_core::validation::validate_checkout_session_id;
use treido_core::{CartItem, CoreError, Locale, Money, Order, Product, VerifyErrorCode, VerifyOutcome};
use treido_db::{Database, NewOrder};

use crate::config::PaymentSettings;
use crate::locale::build_locale_url;
use crate::payment::{CheckoutLineItem, CheckoutSession, NewCheckoutSession, PaymentGateway, SESSION_ID_PLACEHOLDER};

// =============================================================================
// Errors
// =============================================================================

/// Machine-readable reasons a checkout session could not be opened.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub enum CreateSessionErrorCode {
    AuthRequired,
    EmptyCart,
    SelfPurchase,
    ProductNotFound,
    Payment,
}

impl CreateSessionErrorCode {
    pub const fn as_str(&self) -> &'static str {
        match self {
            CreateSessionErrorCode::AuthRequired => "authRequired",
            CreateSessionErrorCode::EmptyCart => "emptyCart",
            CreateSessionErrorCode::SelfPurchase => "selfPurchase",
            CreateSessionErrorCode::ProductNotFound => "productNotFound",
            CreateSessionErrorCode::Payment => "payment",
        }
    }

    pub const fn message(&self) -> &'static str {
        match self {
            CreateSessionErrorCode::AuthRequired => "Please sign in to check out.",
            CreateSessionErrorCode::EmptyCart => "Your cart is empty.",
            CreateSessionErrorCode::SelfPurchase => "You cannot buy your own listing.",
            CreateSessionErrorCode::ProductNotFound => "A product in your cart is no longer available.",
            CreateSessionErrorCode::Payment => "Failed to start checkout. Please try again.",
        }
    }
}

/// Checkout session could not be opened.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct CreateSessionError {
    pub code: CreateSessionErrorCode,
    pub message: String,
}

impl CreateSessionError {
    pub fn new(code: CreateSessionErrorCode) -> Self {
        CreateSessionError {
            code,
            message: code.message().to_string(),
        }
    }
}

impl From<CoreError> for CreateSessionError {
    fn from(err: CoreError) -> Self {
        match err {
            CoreError::SelfPurchase { .. } => CreateSessionError::new(CreateSessionErrorCode::SelfPurchase),
            CoreError::EmptyCart => CreateSessionError::new(CreateSessionErrorCode::EmptyCart),
            CoreError::ProductNotFound(_) => CreateSessionError::new(CreateSessionErrorCode::ProductNotFound),
            other => {
                error!(error = %other, "Checkout session preparation failed");
                CreateSessionError::new(CreateSessionErrorCode::Payment)
            }
        }
    }
}

/// Paid session could not be turned into an order.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
#[error("{message}")]
pub struct VerifyError {
    pub code: VerifyErrorCode,
    pub message: String,
}

impl VerifyError {
    pub fn new(code: VerifyErrorCode) -> Self {
        VerifyError {
            code,
            message: code.message().to_string(),
        }
    }

    pub fn with_message(code: VerifyErrorCode, message: impl Into<String>) -> Self {
        VerifyError {
            code,
            message: message.into(),
        }
    }
}

// =============================================================================
// Outcomes
// =============================================================================

/// A freshly opened hosted checkout session.
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CreateSessionOutcome {
    pub session_id: String,
    /// Hosted payment page to redirect the buyer to.
    pub url: Option<String>,
}

// =============================================================================
// Checkout Service
// =============================================================================

/// Checkout over the marketplace database and a payment gateway.
#[derive(Clone)]
pub struct CheckoutService {
    db: Database,
    gateway: Arc<dyn PaymentGateway>,
    currency: String,
    app_url: String,
}

impl CheckoutService {
    pub fn new(db: Database, gateway: Arc<dyn PaymentGateway>, settings: &PaymentSettings) -> Self {
        CheckoutService {
            db,
            gateway,
            currency: settings.currency.clone(),
            app_url: settings.app_url.clone(),
        }
    }

    // =========================================================================
    // Session Creation
    // =========================================================================

    /// Opens a checkout session for the signed-in user's server cart.
    pub async fn create_session_for_cart(
        &self,
        user_id: Option<&str>,
        locale: Locale,
    ) -> Result<CreateSessionOutcome, CreateSessionError> {
        let user_id = signed_in(user_id).ok_or_else(|| CreateSessionError::new(CreateSessionErrorCode::AuthRequired))?;
        let items = self.db.carts().list_for_user(user_id).await.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to load cart for checkout");
            CreateSessionError::new(CreateSessionErrorCode::Payment)
        })?;
        self.create_session(Some(user_id), &items, locale).await
    }

    /// Opens a hosted checkout session for `items`.
    ///
    /// Line items are charged at the current catalog price (variant price
    /// when the variant has one), never at the price stored in the cart.
    #[instrument(skip(self, items), fields(lines = items.len()))]
    pub async fn create_session(
        &self,
        user_id: Option<&str>,
        items: &[CartItem],
        locale: Locale,
    ) -> Result<CreateSessionOutcome, CreateSessionError> {
        let user_id = signed_in(user_id).ok_or_else(|| CreateSessionError::new(CreateSessionErrorCode::AuthRequired))?;

        let items = sanitize_items(items);
        if items.is_empty() {
            return Err(CoreError::EmptyCart.into());
        }

        let products = self.load_products(&items).await?;
        for item in &items {
            match products.get(&item.id) {
                Some(product) if product.is_active => {}
                _ => {
                    warn!(product_id = %item.id, "Checkout with unavailable product");
                    return Err(CoreError::ProductNotFound(item.id.clone()).into());
                }
            }
        }

        ensure_not_self_purchase(
            user_id,
            products.values().map(|p| (p.id.as_str(), p.seller_id.as_str())),
        )?;

        let variant_lines: Vec<(String, String)> = items
            .iter()
            .filter_map(|item| item.variant_id.clone().map(|v| (item.id.clone(), v)))
            .collect();
        let variant_prices = self.db.products().variant_prices(&variant_lines).await.map_err(|e| {
            error!(error = %e, "Failed to load variant prices");
            CreateSessionError::new(CreateSessionErrorCode::Payment)
        })?;

        let mut line_items = Vec::with_capacity(items.len());
        let mut session_items = Vec::with_capacity(items.len());
        for item in &items {
            let Some(product) = products.get(&item.id) else {
                continue;
            };
            let unit_amount = current_price(product, item.variant_id.as_deref(), &variant_prices);
            let name = match item.variant_name.as_deref().filter(|n| !n.is_empty()) {
                Some(variant) => format!("{} ({})", product.title, variant),
                None => product.title.clone(),
            };

            line_items.push(CheckoutLineItem {
                name,
                unit_amount,
                quantity: item.quantity,
                image: product.primary_image().map(str::to_string),
            });
            session_items.push(SessionItem {
                id: item.id.clone(),
                variant_id: item.variant_id.clone(),
                qty: item.quantity,
                price: unit_amount,
            });
        }

        let mut metadata = BTreeMap::new();
        metadata.insert("items_json".to_string(), encode_session_items(&session_items)?);
        metadata.insert("user_id".to_string(), user_id.to_string());

        let request = NewCheckoutSession {
            currency: self.currency.clone(),
            line_items,
            success_url: build_locale_url(
                &self.app_url,
                "checkout/success",
                locale,
                Some(&format!("session_id={}", SESSION_ID_PLACEHOLDER)),
            ),
            cancel_url: build_locale_url(&self.app_url, "cart", locale, None),
            client_reference_id: user_id.to_string(),
            metadata,
        };

        let session = self.gateway.create_checkout_session(&request).await.map_err(|e| {
            error!(user_id = %user_id, error = %e, "Failed to create checkout session");
            CreateSessionError::new(CreateSessionErrorCode::Payment)
        })?;

        info!(user_id = %user_id, session_id = %session.id, "Checkout session opened");
        Ok(CreateSessionOutcome {
            session_id: session.id,
            url: session.url,
        })
    }

    async fn load_products(&self, items: &[CartItem]) -> Result<HashMap<String, Product>, CreateSessionError> {
        let mut seen = HashSet::new();
        let ids: Vec<String> = items
            .iter()
            .filter(|item| seen.insert(item.id.as_str()))
            .map(|item| item.id.clone())
            .collect();

        let products = self.db.products().get_many(&ids).await.map_err(|e| {
            error!(error = %e, "Failed to load products for checkout");
            CreateSessionError::new(CreateSessionErrorCode::Payment)
        })?;

        Ok(products.into_iter().map(|p| (p.id.clone(), p)).collect())
    }

    // =========================================================================
    // Verification
    // =========================================================================

    /// Verifies a paid session and creates its order exactly once.
    ///
    /// Calling this again for the same session returns the existing order
    /// with `is_existing: true`.
    #[instrument(skip(self))]
    pub async fn verify_and_create_order(
        &self,
        user_id: Option<&str>,
        session_id: &str,
    ) -> Result<VerifyOutcome, VerifyError> {
        let session_id = validate_checkout_session_id(session_id)
            .map_err(|_| VerifyError::new(VerifyErrorCode::InvalidSession))?;
        let user_id = signed_in(user_id).ok_or_else(|| VerifyError::new(VerifyErrorCode::AuthRequired))?;

        let session = self
            .gateway
            .retrieve_checkout_session(&session_id)
            .await
            .map_err(|e| {
                error!(session_id = %session_id, error = %e, "Failed to retrieve checkout session");
                VerifyError::new(VerifyErrorCode::Unknown)
            })?;

        self.materialize_order(user_id, &session).await
    }

    async fn materialize_order(&self, user_id: &str, session: &CheckoutSession) -> Result<VerifyOutcome, VerifyError> {
        let buyer = resolve_buyer_id(
            session.client_reference_id.as_deref(),
            session.metadata_value("user_id"),
        );
        if buyer != Some(user_id) {
            warn!(user_id = %user_id, session_id = %session.id, "Session belongs to another buyer");
            return Err(VerifyError::new(VerifyErrorCode::NotAuthorized));
        }

        if !session.is_paid() {
            return Err(VerifyError::new(VerifyErrorCode::PaymentNotCompleted));
        }

        let payment_intent_id = session
            .payment_intent_id()
            .ok_or_else(|| VerifyError::new(VerifyErrorCode::MissingPaymentIntent))?;

        let total = session.total();
        let items = parse_session_items_json(session.metadata_value("items_json"));
        let item_count = items.as_deref().map(session_item_count).unwrap_or(0);

        if let Some(outcome) = self.existing_order(payment_intent_id, user_id, total, item_count).await? {
            return Ok(outcome);
        }

        let items = match items {
            Some(items) if !items.is_empty() => items,
            _ => return Err(VerifyError::new(VerifyErrorCode::MissingItems)),
        };

        let new_order = NewOrder {
            user_id: user_id.to_string(),
            total,
            shipping_address: session
                .customer_details
                .as_ref()
                .filter(|details| details.address.is_some())
                .map(|details| details.to_shipping_address()),
            stripe_payment_intent_id: payment_intent_id.to_string(),
        };

        let order = match self.db.orders().insert(&new_order).await {
            Ok(order) => order,
            Err(e) => {
                if let Some(outcome) = self.existing_order(payment_intent_id, user_id, total, item_count).await? {
                    debug!(payment_intent_id = %payment_intent_id, "Order created concurrently");
                    return Ok(outcome);
                }
                error!(payment_intent_id = %payment_intent_id, user_id = %user_id, error = %e, "Order insert failed");
                return Err(VerifyError::new(VerifyErrorCode::Database));
            }
        };

        let product_ids: Vec<String> = items.iter().map(|item| item.id.clone()).collect();
        let sellers = self.db.products().seller_map(&product_ids).await.map_err(|e| {
            error!(order_id = %order.id, error = %e, "Failed to load products for order");
            VerifyError::with_message(VerifyErrorCode::Database, "Failed to load products for order.")
        })?;

        let drafts = build_order_items(&items, &sellers);
        if drafts.is_empty() {
            return Err(VerifyError::with_message(
                VerifyErrorCode::MissingItems,
                "No valid order items found.",
            ));
        }

        if let Err(e) = self.db.orders().insert_items(&order.id, &drafts).await {
            error!(order_id = %order.id, count = drafts.len(), error = %e, "Order items insert failed");
            return Err(VerifyError::with_message(
                VerifyErrorCode::Database,
                "Failed to create order items.",
            ));
        }

        for draft in &drafts {
            match self.db.products().decrement_stock(&draft.product_id, draft.quantity).await {
                Ok(Some(stock)) => debug!(product_id = %draft.product_id, stock, "Stock decremented"),
                Ok(None) => {}
                Err(e) => warn!(product_id = %draft.product_id, error = %e, "Stock decrement failed"),
            }
        }

        let purchased: Vec<String> = drafts.iter().map(|d| d.product_id.clone()).collect();
        if let Err(e) = self.db.carts().remove_products(user_id, &purchased).await {
            warn!(user_id = %user_id, error = %e, "Failed to remove purchased items from cart");
        }

        info!(order_id = %order.id, payment_intent_id = %payment_intent_id, "Order created");
        Ok(VerifyOutcome {
            order_id: order.id,
            total_amount: total,
            item_count: draft_item_count(&drafts),
            is_existing: false,
        })
    }

    /// Existing order for a payment intent, as a verification result.
    ///
    /// A lookup failure is logged and treated as "no order".
    async fn existing_order(
        &self,
        payment_intent_id: &str,
        user_id: &str,
        total: Money,
        item_count: i64,
    ) -> Result<Option<VerifyOutcome>, VerifyError> {
        let existing: Option<Order> = match self.db.orders().find_by_payment_intent(payment_intent_id).await {
            Ok(order) => order,
            Err(e) => {
                error!(payment_intent_id = %payment_intent_id, error = %e, "Existing order lookup failed");
                None
            }
        };

        match existing {
            None => Ok(None),
            Some(order) if order.user_id != user_id => Err(VerifyError::new(VerifyErrorCode::NotAuthorized)),
            Some(order) => Ok(Some(VerifyOutcome {
                order_id: order.id,
                total_amount: total,
                item_count,
                is_existing: true,
            })),
        }
    }
}

fn signed_in(user_id: Option<&str>) -> Option<&str> {
    user_id.map(str::trim).filter(|id| !id.is_empty())
}

fn current_price(product: &Product, variant_id: Option<&str>, variant_prices: &HashMap<String, Money>) -> Money {
    variant_id
        .and_then(|id| variant_prices.get(id))
        .copied()
        .unwrap_or_else(|| product.price())
}
