//! # Cart Repository
//!
//! The server-held cart of a signed-in buyer. The three mutations are the
//! procedures the storefront calls by name:
//!
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     Server Cart Procedures                              │
//! │                                                                         │
//! │  cart_add_item(product, variant, qty)                                  │
//! │     ├── line exists?  quantity = min(existing + qty, 99)               │
//! │     └── otherwise     insert line with min(qty, 99)                    │
//! │                                                                         │
//! │  cart_set_quantity(product, variant, qty)                              │
//! │     ├── qty <= 0      delete line                                      │
//! │     └── otherwise     quantity = min(qty, 99)                          │
//! │                                                                         │
//! │  cart_clear()         delete every line of the user                    │
//! │                                                                         │
//! │  Lines are unique by (user, product, variant); NULL variant is a       │
//! │  value of its own here, matched with `variant_id IS ?`.                │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use chrono::Utc;
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use treido_core::cart::{normalize_image_url, normalize_quantity_i64};
use treido_core::{CartItem, Money, MAX_CART_QUANTITY};

use crate::error::{DbError, DbResult};
use crate::repository::{decode_string_list, generate_id};

/// Title shown for cart rows with no matching product.
pub const UNKNOWN_PRODUCT_TITLE: &str = "Unknown Product";

#[derive(Debug, sqlx::FromRow)]
struct CartLineRow {
    product_id: String,
    variant_id: Option<String>,
    variant_name: Option<String>,
    quantity: i64,
    title: Option<String>,
    price_cents: Option<i64>,
    images: Option<String>,
    slug: Option<String>,
    username: Option<String>,
}

impl From<CartLineRow> for CartItem {
    fn from(row: CartLineRow) -> Self {
        let images = decode_string_list(row.images.as_deref());
        CartItem {
            id: row.product_id,
            variant_id: row.variant_id,
            variant_name: row.variant_name,
            title: row.title.unwrap_or_else(|| UNKNOWN_PRODUCT_TITLE.to_string()),
            price: Money::from_minor(row.price_cents.unwrap_or(0)),
            image: normalize_image_url(images.first().map(String::as_str)),
            quantity: row.quantity,
            slug: row.slug,
            store_slug: row.username.clone(),
            username: row.username,
        }
    }
}

/// Repository for the server-side cart.
#[derive(Debug, Clone)]
pub struct CartRepository {
    pool: SqlitePool,
}

impl CartRepository {
    /// Creates a new CartRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CartRepository { pool }
    }

    /// `cart_add_item`: adds `quantity` to a line, creating it if needed.
    ///
    /// ## Returns
    /// The line's quantity after the add (capped at 99).
    pub async fn add_item(
        &self,
        user_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> DbResult<i64> {
        let quantity = normalize_quantity_i64(quantity)
            .ok_or_else(|| DbError::InvalidInput(format!("quantity must be positive, got {quantity}")))?;

        debug!(user_id = %user_id, product_id = %product_id, quantity, "cart_add_item");

        let now = Utc::now();
        let existing: Option<(String, i64)> = sqlx::query_as(
            "SELECT id, quantity FROM cart_items
             WHERE user_id = ?1 AND product_id = ?2 AND variant_id IS ?3",
        )
        .bind(user_id)
        .bind(product_id)
        .bind(variant_id)
        .fetch_optional(&self.pool)
        .await?;

        match existing {
            Some((line_id, current)) => {
                let merged = current.saturating_add(quantity).min(MAX_CART_QUANTITY);
                sqlx::query("UPDATE cart_items SET quantity = ?2, updated_at = ?3 WHERE id = ?1")
                    .bind(&line_id)
                    .bind(merged)
                    .bind(now)
                    .execute(&self.pool)
                    .await?;
                Ok(merged)
            }
            None => {
                sqlx::query(
                    "INSERT INTO cart_items (id, user_id, product_id, variant_id, quantity, created_at, updated_at)
                     VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?6)",
                )
                .bind(generate_id())
                .bind(user_id)
                .bind(product_id)
                .bind(variant_id)
                .bind(quantity)
                .bind(now)
                .execute(&self.pool)
                .await?;
                Ok(quantity)
            }
        }
    }

    /// `cart_set_quantity`: sets a line's quantity; zero or less deletes it.
    ///
    /// ## Returns
    /// `true` if a line was updated or deleted.
    pub async fn set_quantity(
        &self,
        user_id: &str,
        product_id: &str,
        variant_id: Option<&str>,
        quantity: i64,
    ) -> DbResult<bool> {
        debug!(user_id = %user_id, product_id = %product_id, quantity, "cart_set_quantity");

        let result = match normalize_quantity_i64(quantity) {
            Some(quantity) => {
                sqlx::query(
                    "UPDATE cart_items SET quantity = ?4, updated_at = ?5
                     WHERE user_id = ?1 AND product_id = ?2 AND variant_id IS ?3",
                )
                .bind(user_id)
                .bind(product_id)
                .bind(variant_id)
                .bind(quantity)
                .bind(Utc::now())
                .execute(&self.pool)
                .await?
            }
            None => {
                sqlx::query(
                    "DELETE FROM cart_items
                     WHERE user_id = ?1 AND product_id = ?2 AND variant_id IS ?3",
                )
                .bind(user_id)
                .bind(product_id)
                .bind(variant_id)
                .execute(&self.pool)
                .await?
            }
        };

        Ok(result.rows_affected() > 0)
    }

    /// `cart_clear`: removes every line of the user.
    pub async fn clear(&self, user_id: &str) -> DbResult<u64> {
        debug!(user_id = %user_id, "cart_clear");

        let result = sqlx::query("DELETE FROM cart_items WHERE user_id = ?1")
            .bind(user_id)
            .execute(&self.pool)
            .await?;

        Ok(result.rows_affected())
    }

    /// Removes every line (any variant) for the given products.
    pub async fn remove_products(&self, user_id: &str, product_ids: &[String]) -> DbResult<u64> {
        if product_ids.is_empty() {
            return Ok(0);
        }

        let mut query = QueryBuilder::<Sqlite>::new("DELETE FROM cart_items WHERE user_id = ");
        query.push_bind(user_id);
        query.push(" AND product_id IN (");
        let mut separated = query.separated(", ");
        for id in product_ids {
            separated.push_bind(id.as_str());
        }
        query.push(")");

        let result = query.build().execute(&self.pool).await?;
        debug!(user_id = %user_id, removed = result.rows_affected(), "Removed purchased cart lines");
        Ok(result.rows_affected())
    }

    /// Lists the user's cart as storefront cart lines.
    ///
    /// Lines with no matching product row get the title
    /// [`UNKNOWN_PRODUCT_TITLE`]. A variant's own price wins over the
    /// product price. The seller username fills both `username` and
    /// `storeSlug`.
    pub async fn list_for_user(&self, user_id: &str) -> DbResult<Vec<CartItem>> {
        let rows = sqlx::query_as::<_, CartLineRow>(
            "SELECT ci.product_id, ci.variant_id, pv.name AS variant_name, ci.quantity,
                    p.title, COALESCE(pv.price_cents, p.price_cents) AS price_cents,
                    p.images, p.slug, pr.username
             FROM cart_items ci
             LEFT JOIN products p ON p.id = ci.product_id
             LEFT JOIN product_variants pv ON pv.id = ci.variant_id
             LEFT JOIN profiles pr ON pr.id = p.seller_id
             WHERE ci.user_id = ?1
             ORDER BY ci.created_at, ci.id",
        )
        .bind(user_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(rows.into_iter().map(CartItem::from).collect())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, seed_profile, test_db};
    use crate::Database;

    async fn shop() -> Database {
        let db = test_db().await;
        seed_profile(&db, "buyer", "buyer").await;
        seed_profile(&db, "s1", "woodshop").await;
        db.products().insert(&product("p1", "s1", None, 1250)).await.unwrap();
        db.products().insert(&product("p2", "s1", None, 300)).await.unwrap();
        db.products()
            .insert_variant("v1", "p1", "Large", Some(1500), 5)
            .await
            .unwrap();
        db
    }

    #[tokio::test]
    async fn test_add_item_merges_and_caps() {
        let db = shop().await;
        let carts = db.carts();

        assert_eq!(carts.add_item("buyer", "p1", None, 2).await.unwrap(), 2);
        assert_eq!(carts.add_item("buyer", "p1", None, 3).await.unwrap(), 5);
        assert_eq!(carts.add_item("buyer", "p1", None, 150).await.unwrap(), 99);

        // the variant line is separate
        assert_eq!(carts.add_item("buyer", "p1", Some("v1"), 1).await.unwrap(), 1);

        let lines = carts.list_for_user("buyer").await.unwrap();
        assert_eq!(lines.len(), 2);
    }

    #[tokio::test]
    async fn test_add_item_rejects_non_positive() {
        let db = shop().await;
        let err = db.carts().add_item("buyer", "p1", None, 0).await.unwrap_err();
        assert!(matches!(err, DbError::InvalidInput(_)));
    }

    #[tokio::test]
    async fn test_add_unknown_product_is_foreign_key_violation() {
        let db = shop().await;
        let err = db.carts().add_item("buyer", "ghost", None, 1).await.unwrap_err();
        assert!(matches!(err, DbError::ForeignKeyViolation { .. }));
    }

    #[tokio::test]
    async fn test_set_quantity_zero_deletes() {
        let db = shop().await;
        let carts = db.carts();
        carts.add_item("buyer", "p1", None, 2).await.unwrap();

        assert!(carts.set_quantity("buyer", "p1", None, 7).await.unwrap());
        assert_eq!(carts.list_for_user("buyer").await.unwrap()[0].quantity, 7);

        assert!(carts.set_quantity("buyer", "p1", None, 0).await.unwrap());
        assert!(carts.list_for_user("buyer").await.unwrap().is_empty());

        assert!(!carts.set_quantity("buyer", "p1", None, 0).await.unwrap());
    }

    #[tokio::test]
    async fn test_list_maps_product_details() {
        let db = shop().await;
        let carts = db.carts();
        carts.add_item("buyer", "p1", Some("v1"), 1).await.unwrap();
        carts.add_item("buyer", "p2", None, 2).await.unwrap();

        let lines = carts.list_for_user("buyer").await.unwrap();
        let variant_line = lines.iter().find(|l| l.variant_id.is_some()).unwrap();
        assert_eq!(variant_line.variant_name.as_deref(), Some("Large"));
        assert_eq!(variant_line.price, Money::from_minor(1500));
        assert_eq!(variant_line.username.as_deref(), Some("woodshop"));
        assert_eq!(variant_line.store_slug.as_deref(), Some("woodshop"));
        assert_eq!(variant_line.image, "https://cdn.test/p1.jpg");

        let plain = lines.iter().find(|l| l.id == "p2").unwrap();
        assert_eq!(plain.price, Money::from_minor(300));
        assert_eq!(plain.title, "Product p2");
    }

    #[tokio::test]
    async fn test_clear_and_remove_products_are_scoped_by_user() {
        let db = shop().await;
        seed_profile(&db, "other", "other").await;
        let carts = db.carts();
        carts.add_item("buyer", "p1", None, 1).await.unwrap();
        carts.add_item("buyer", "p2", None, 1).await.unwrap();
        carts.add_item("other", "p1", None, 1).await.unwrap();

        assert_eq!(carts.remove_products("buyer", &["p1".to_string()]).await.unwrap(), 1);
        assert_eq!(carts.list_for_user("other").await.unwrap().len(), 1);

        assert_eq!(carts.clear("buyer").await.unwrap(), 1);
        assert!(carts.list_for_user("buyer").await.unwrap().is_empty());
        assert_eq!(carts.list_for_user("other").await.unwrap().len(), 1);
    }
}
