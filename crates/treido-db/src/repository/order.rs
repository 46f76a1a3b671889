//! # Order Repository
//!
//! Orders created from paid checkout sessions.
//!
//! ## One Order per Payment Intent
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                   Idempotent Order Creation                             │
//! │                                                                         │
//! │  find_by_payment_intent(pi)                                            │
//! │       ├── Some(order) ──► return existing                              │
//! │       └── None                                                          │
//! │            │                                                            │
//! │            ▼                                                            │
//! │       insert(NewOrder { pi, .. })                                      │
//! │            ├── Ok ──► insert_items(order_id, drafts)                   │
//! │            └── UniqueViolation (a concurrent verify won the race)      │
//! │                 └──► find_by_payment_intent(pi) again                  │
//! │                                                                         │
//! │  UNIQUE(stripe_payment_intent_id) is the final guard.                  │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::{debug, warn};
use treido_core::checkout::OrderItemDraft;
use treido_core::{Money, Order, OrderItem, OrderStatus, ShippingAddress};

use crate::error::{DbError, DbResult};
use crate::repository::generate_id;

const ORDER_COLUMNS: &str =
    "id, user_id, total_cents, status, shipping_address, stripe_payment_intent_id, created_at";

#[derive(Debug, sqlx::FromRow)]
struct OrderRow {
    id: String,
    user_id: String,
    total_cents: i64,
    status: OrderStatus,
    shipping_address: Option<String>,
    stripe_payment_intent_id: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<OrderRow> for Order {
    fn from(row: OrderRow) -> Self {
        let shipping_address = row.shipping_address.as_deref().and_then(|raw| {
            serde_json::from_str::<ShippingAddress>(raw)
                .map_err(|e| warn!(order_id = %row.id, error = %e, "Unreadable shipping address"))
                .ok()
        });

        Order {
            id: row.id,
            user_id: row.user_id,
            total_cents: row.total_cents,
            status: row.status,
            shipping_address,
            stripe_payment_intent_id: row.stripe_payment_intent_id,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct OrderItemRow {
    id: String,
    order_id: String,
    product_id: String,
    seller_id: String,
    variant_id: Option<String>,
    quantity: i64,
    price_at_purchase_cents: i64,
    created_at: DateTime<Utc>,
}

impl From<OrderItemRow> for OrderItem {
    fn from(row: OrderItemRow) -> Self {
        OrderItem {
            id: row.id,
            order_id: row.order_id,
            product_id: row.product_id,
            seller_id: row.seller_id,
            variant_id: row.variant_id,
            quantity: row.quantity,
            price_at_purchase_cents: row.price_at_purchase_cents,
            created_at: row.created_at,
        }
    }
}

/// What checkout knows when it creates an order.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NewOrder {
    pub user_id: String,
    pub total: Money,
    pub shipping_address: Option<ShippingAddress>,
    pub stripe_payment_intent_id: String,
}

/// Repository for order database operations.
#[derive(Debug, Clone)]
pub struct OrderRepository {
    pool: SqlitePool,
}

impl OrderRepository {
    /// Creates a new OrderRepository.
    pub fn new(pool: SqlitePool) -> Self {
        OrderRepository { pool }
    }

    /// Gets an order by id.
    pub async fn get(&self, id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Gets the order created for a payment intent, if any.
    pub async fn find_by_payment_intent(&self, payment_intent_id: &str) -> DbResult<Option<Order>> {
        let row = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE stripe_payment_intent_id = ?1"
        ))
        .bind(payment_intent_id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Order::from))
    }

    /// Lists a buyer's orders, newest first.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<Order>> {
        let rows = sqlx::query_as::<_, OrderRow>(&format!(
            "SELECT {ORDER_COLUMNS} FROM orders WHERE user_id = ?1 ORDER BY created_at DESC"
        ))
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(Order::from).collect())
    }

    /// Inserts a paid order.
    ///
    /// ## Returns
    /// * `Err(DbError::UniqueViolation)` - An order already exists for this payment intent
    pub async fn insert(&self, order: &NewOrder) -> DbResult<Order> {
        let id = generate_id();
        let now = Utc::now();

        debug!(
            order_id = %id,
            user_id = %order.user_id,
            payment_intent_id = %order.stripe_payment_intent_id,
            "Inserting order"
        );

        let shipping_address = order
            .shipping_address
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO orders (id, user_id, total_cents, status, shipping_address, stripe_payment_intent_id, created_at)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7)",
        )
        .bind(&id)
        .bind(&order.user_id)
        .bind(order.total.minor())
        .bind(OrderStatus::Paid)
        .bind(&shipping_address)
        .bind(&order.stripe_payment_intent_id)
        .bind(now)
        .execute(&self.pool)
        .await?;

        Ok(Order {
            id,
            user_id: order.user_id.clone(),
            total_cents: order.total.minor(),
            status: OrderStatus::Paid,
            shipping_address: order.shipping_address.clone(),
            stripe_payment_intent_id: Some(order.stripe_payment_intent_id.clone()),
            created_at: now,
        })
    }

    /// Inserts all lines of an order in one statement.
    pub async fn insert_items(&self, order_id: &str, drafts: &[OrderItemDraft]) -> DbResult<Vec<OrderItem>> {
        if drafts.is_empty() {
            return Ok(Vec::new());
        }

        let now = Utc::now();
        let items: Vec<OrderItem> = drafts
            .iter()
            .map(|draft| OrderItem {
                id: generate_id(),
                order_id: order_id.to_string(),
                product_id: draft.product_id.clone(),
                seller_id: draft.seller_id.clone(),
                variant_id: draft.variant_id.clone(),
                quantity: draft.quantity,
                price_at_purchase_cents: draft.price_at_purchase.minor(),
                created_at: now,
            })
            .collect();

        debug!(order_id = %order_id, count = items.len(), "Inserting order items");

        let mut query = QueryBuilder::<Sqlite>::new(
            "INSERT INTO order_items (
                id, order_id, product_id, seller_id, variant_id,
                quantity, price_at_purchase_cents, created_at
             ) ",
        );
        query.push_values(&items, |mut row, item| {
            row.push_bind(&item.id)
                .push_bind(&item.order_id)
                .push_bind(&item.product_id)
                .push_bind(&item.seller_id)
                .push_bind(&item.variant_id)
                .push_bind(item.quantity)
                .push_bind(item.price_at_purchase_cents)
                .push_bind(item.created_at);
        });
        query.build().execute(&self.pool).await?;

        Ok(items)
    }

    /// Lines of an order.
    pub async fn items_for_order(&self, order_id: &str) -> DbResult<Vec<OrderItem>> {
        let rows = sqlx::query_as::<_, OrderItemRow>(
            "SELECT id, order_id, product_id, seller_id, variant_id,
                    quantity, price_at_purchase_cents, created_at
             FROM order_items WHERE order_id = ?1 ORDER BY rowid",
        )
        .bind(order_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(OrderItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, seed_profile, test_db};
    use crate::Database;
    use treido_core::PostalAddress;

    async fn shop() -> Database {
        let db = test_db().await;
        seed_profile(&db, "buyer", "buyer").await;
        seed_profile(&db, "s1", "woodshop").await;
        db.products().insert(&product("p1", "s1", None, 1250)).await.unwrap();
        db
    }

    fn new_order(pi: &str) -> NewOrder {
        NewOrder {
            user_id: "buyer".into(),
            total: Money::from_minor(2500),
            shipping_address: Some(ShippingAddress {
                name: Some("Ivan".into()),
                email: Some("ivan@example.com".into()),
                address: PostalAddress {
                    city: Some("Sofia".into()),
                    country: Some("BG".into()),
                    ..Default::default()
                },
            }),
            stripe_payment_intent_id: pi.into(),
        }
    }

    #[tokio::test]
    async fn test_insert_and_find_by_payment_intent() {
        let db = shop().await;
        let orders = db.orders();

        let created = orders.insert(&new_order("pi_1")).await.unwrap();
        assert_eq!(created.status, OrderStatus::Paid);

        let found = orders.find_by_payment_intent("pi_1").await.unwrap().unwrap();
        assert_eq!(found.id, created.id);
        assert_eq!(found.total(), Money::from_minor(2500));
        assert_eq!(
            found.shipping_address.unwrap().address.city.as_deref(),
            Some("Sofia")
        );

        assert!(orders.find_by_payment_intent("pi_2").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_duplicate_payment_intent_rejected() {
        let db = shop().await;
        let orders = db.orders();
        orders.insert(&new_order("pi_1")).await.unwrap();

        let err = orders.insert(&new_order("pi_1")).await.unwrap_err();
        assert!(err.is_unique_violation());
        assert_eq!(orders.list_for_user("buyer").await.unwrap().len(), 1);
    }

    #[tokio::test]
    async fn test_insert_items() {
        let db = shop().await;
        let orders = db.orders();
        let order = orders.insert(&new_order("pi_1")).await.unwrap();

        let drafts = vec![OrderItemDraft {
            product_id: "p1".into(),
            seller_id: "s1".into(),
            variant_id: None,
            quantity: 2,
            price_at_purchase: Money::from_minor(1250),
        }];
        orders.insert_items(&order.id, &drafts).await.unwrap();

        let items = orders.items_for_order(&order.id).await.unwrap();
        assert_eq!(items.len(), 1);
        assert_eq!(items[0].line_total(), Money::from_minor(2500));
        assert!(orders.insert_items(&order.id, &[]).await.unwrap().is_empty());
    }

    #[tokio::test]
    async fn test_items_with_unknown_seller_fail() {
        let db = shop().await;
        let orders = db.orders();
        let order = orders.insert(&new_order("pi_1")).await.unwrap();

        let drafts = vec![OrderItemDraft {
            product_id: "p1".into(),
            seller_id: "nobody".into(),
            variant_id: None,
            quantity: 1,
            price_at_purchase: Money::from_minor(100),
        }];
        let err = orders.insert_items(&order.id, &drafts).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }
}
