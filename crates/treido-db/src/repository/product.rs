//! # Product Repository
//!
//! Database operations for products.
//!
//! ## Key Operations
//! - Newest-first category feeds with attribute filters
//! - Title search
//! - Seller lookup for checkout
//! - Floored stock decrement
//!
//! ## Category Feed
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │           GET /api/products/newest?category=smartphones&attr_brand=x    │
//! │                                                                         │
//! │  slug "smartphones"                                                    │
//! │       │  descendant_ids()  (recursive CTE)                             │
//! │       ▼                                                                 │
//! │  { smartphones, android, ios }                                         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  products WHERE category_id IN (...)                                   │
//! │           AND EXISTS product_attributes(brand IN ('x'))                │
//! │           ORDER BY created_at DESC                                     │
//! │           LIMIT limit + 1 OFFSET (page - 1) * limit                    │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ProductPage { products: first `limit`, has_more: got limit + 1 }      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::HashMap;

use chrono::{DateTime, Utc};
use sqlx::{QueryBuilder, Sqlite, SqlitePool};
use tracing::debug;
use treido_core::cart::normalize_image_url;
use treido_core::category::attr_param_key;
use treido_core::{Money, Product, ProductCard, ProductPage, PRODUCTS_PAGE_SIZE};

use crate::error::{DbError, DbResult};
use crate::repository::{category::CategoryRepository, decode_string_list};

const PRODUCT_COLUMNS: &str = "id, seller_id, category_id, title, slug, price_cents, images, \
                               track_inventory, stock, is_active, created_at";

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: String,
    seller_id: String,
    category_id: Option<String>,
    title: String,
    slug: Option<String>,
    price_cents: i64,
    images: Option<String>,
    track_inventory: bool,
    stock: i64,
    is_active: bool,
    created_at: DateTime<Utc>,
}

impl From<ProductRow> for Product {
    fn from(row: ProductRow) -> Self {
        Product {
            id: row.id,
            seller_id: row.seller_id,
            category_id: row.category_id,
            title: row.title,
            slug: row.slug,
            price_cents: row.price_cents,
            images: decode_string_list(row.images.as_deref()),
            track_inventory: row.track_inventory,
            stock: row.stock,
            is_active: row.is_active,
            created_at: row.created_at,
        }
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CardRow {
    id: String,
    title: String,
    price_cents: i64,
    images: Option<String>,
    slug: Option<String>,
    store_slug: Option<String>,
    category_slug: Option<String>,
    created_at: DateTime<Utc>,
}

impl From<CardRow> for ProductCard {
    fn from(row: CardRow) -> Self {
        let images = decode_string_list(row.images.as_deref());
        ProductCard {
            id: row.id,
            title: row.title,
            price: Money::from_minor(row.price_cents),
            image: normalize_image_url(images.first().map(String::as_str)),
            slug: row.slug,
            store_slug: row.store_slug,
            category_slug: row.category_slug,
            created_at: row.created_at,
        }
    }
}

const CARD_SELECT: &str = "SELECT p.id, p.title, p.price_cents, p.images, p.slug, \
                           pr.username AS store_slug, c.slug AS category_slug, p.created_at \
                           FROM products p \
                           JOIN profiles pr ON pr.id = p.seller_id \
                           LEFT JOIN categories c ON c.id = p.category_id \
                           WHERE p.is_active = 1";

// =============================================================================
// Feed Query
// =============================================================================

/// Parameters of a newest-first product feed.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProductFeedQuery {
    /// Restrict to this category and its descendants.
    pub category_slug: Option<String>,
    /// `attr_<key>` filters as `(key, value)`; comma-separated values match any.
    pub attributes: Vec<(String, String)>,
    /// 1-based.
    pub page: u32,
    pub limit: u32,
}

impl Default for ProductFeedQuery {
    fn default() -> Self {
        ProductFeedQuery {
            category_slug: None,
            attributes: Vec::new(),
            page: 1,
            limit: PRODUCTS_PAGE_SIZE,
        }
    }
}

impl ProductFeedQuery {
    /// First page of a category feed.
    pub fn for_category(slug: impl Into<String>) -> Self {
        ProductFeedQuery {
            category_slug: Some(slug.into()),
            ..Default::default()
        }
    }

    pub fn page(mut self, page: u32) -> Self {
        self.page = page.max(1);
        self
    }

    pub fn limit(mut self, limit: u32) -> Self {
        self.limit = limit.max(1);
        self
    }

    /// Adds attribute filters from raw query pairs, keeping only `attr_*` keys.
    pub fn with_attr_params<'a, I>(mut self, params: I) -> Self
    where
        I: IntoIterator<Item = (&'a str, &'a str)>,
    {
        for (key, value) in params {
            if let Some(attr) = attr_param_key(key) {
                if !value.trim().is_empty() {
                    self.attributes.push((attr.to_string(), value.to_string()));
                }
            }
        }
        self
    }

    fn offset(&self) -> i64 {
        i64::from(self.page.saturating_sub(1)) * i64::from(self.limit)
    }
}

fn push_attribute_filters(query: &mut QueryBuilder<'_, Sqlite>, attributes: &[(String, String)]) {
    for (key, raw_values) in attributes {
        let values: Vec<String> = raw_values
            .split(',')
            .map(str::trim)
            .filter(|v| !v.is_empty())
            .map(str::to_string)
            .collect();
        if values.is_empty() {
            continue;
        }

        query.push(
            " AND EXISTS (SELECT 1 FROM product_attributes pa \
             WHERE pa.product_id = p.id AND pa.attribute_key = ",
        );
        query.push_bind(key.clone());
        query.push(" AND pa.value IN (");
        let mut separated = query.separated(", ");
        for value in values {
            separated.push_bind(value);
        }
        query.push("))");
    }
}

fn into_page(rows: Vec<CardRow>, limit: u32) -> ProductPage {
    let limit = limit as usize;
    let has_more = rows.len() > limit;
    let products = rows
        .into_iter()
        .take(limit)
        .map(ProductCard::from)
        .collect();
    ProductPage { products, has_more }
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for product database operations.
///
/// ## Usage
/// ```rust,ignore
/// let repo = db.products();
/// let page = repo.list_newest(&ProductFeedQuery::for_category("phones").page(2)).await?;
/// let sellers = repo.seller_map(&ids).await?;
/// ```
#[derive(Debug, Clone)]
pub struct ProductRepository {
    pool: SqlitePool,
}

impl ProductRepository {
    /// Creates a new ProductRepository.
    pub fn new(pool: SqlitePool) -> Self {
        ProductRepository { pool }
    }

    /// Gets a product by its ID.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<Product>> {
        let row = sqlx::query_as::<_, ProductRow>(&format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(row.map(Product::from))
    }

    /// Gets several products at once. Unknown ids are absent from the result.
    pub async fn get_many(&self, ids: &[String]) -> DbResult<Vec<Product>> {
        if ids.is_empty() {
            return Ok(Vec::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(format!(
            "SELECT {PRODUCT_COLUMNS} FROM products WHERE id IN ("
        ));
        let mut separated = query.separated(", ");
        for id in ids {
            separated.push_bind(id.as_str());
        }
        query.push(")");

        let rows: Vec<ProductRow> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows.into_iter().map(Product::from).collect())
    }

    /// Maps product id → seller id for the given products.
    pub async fn seller_map(&self, ids: &[String]) -> DbResult<HashMap<String, String>> {
        let products = self.get_many(ids).await?;
        Ok(products
            .into_iter()
            .map(|product| (product.id, product.seller_id))
            .collect())
    }

    /// Newest-first feed, optionally scoped to a category subtree.
    ///
    /// An unknown category slug yields an empty page.
    pub async fn list_newest(&self, feed: &ProductFeedQuery) -> DbResult<ProductPage> {
        debug!(
            category = ?feed.category_slug,
            page = feed.page,
            limit = feed.limit,
            filters = feed.attributes.len(),
            "Listing newest products"
        );

        let category_ids = match feed.category_slug.as_deref() {
            Some(slug) => {
                let categories = CategoryRepository::new(self.pool.clone());
                match categories.get_by_slug(slug).await? {
                    Some(category) => Some(categories.descendant_ids(&category.id).await?),
                    None => return Ok(ProductPage::default()),
                }
            }
            None => None,
        };

        let mut query = QueryBuilder::<Sqlite>::new(CARD_SELECT);

        if let Some(ids) = &category_ids {
            query.push(" AND p.category_id IN (");
            let mut separated = query.separated(", ");
            for id in ids {
                separated.push_bind(id.clone());
            }
            query.push(")");
        }

        push_attribute_filters(&mut query, &feed.attributes);

        query.push(" ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        query.push_bind(i64::from(feed.limit) + 1);
        query.push(" OFFSET ");
        query.push_bind(feed.offset());

        let rows: Vec<CardRow> = query.build_query_as().fetch_all(&self.pool).await?;
        let page = into_page(rows, feed.limit);

        debug!(count = page.products.len(), has_more = page.has_more, "Feed page loaded");
        Ok(page)
    }

    /// Title search, newest first. An empty query returns the newest feed.
    pub async fn search(&self, query: &str, page: u32, limit: u32) -> DbResult<ProductPage> {
        let query = query.trim();
        debug!(query = %query, page, limit, "Searching products");

        let feed = ProductFeedQuery::default().page(page).limit(limit);
        if query.is_empty() {
            return self.list_newest(&feed).await;
        }

        let escaped = query
            .replace('\\', "\\\\")
            .replace('%', "\\%")
            .replace('_', "\\_");

        let mut builder = QueryBuilder::<Sqlite>::new(CARD_SELECT);
        builder.push(" AND p.title LIKE ");
        builder.push_bind(format!("%{escaped}%"));
        builder.push(" ESCAPE '\\' ORDER BY p.created_at DESC, p.id DESC LIMIT ");
        builder.push_bind(i64::from(feed.limit) + 1);
        builder.push(" OFFSET ");
        builder.push_bind(feed.offset());

        let rows: Vec<CardRow> = builder.build_query_as().fetch_all(&self.pool).await?;
        Ok(into_page(rows, feed.limit))
    }

    /// Inserts a new product (id generated beforehand).
    pub async fn insert(&self, product: &Product) -> DbResult<()> {
        debug!(id = %product.id, seller_id = %product.seller_id, "Inserting product");

        let images = serde_json::to_string(&product.images)
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO products (
                id, seller_id, category_id, title, slug, price_cents, images,
                track_inventory, stock, is_active, created_at
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&product.id)
        .bind(&product.seller_id)
        .bind(&product.category_id)
        .bind(&product.title)
        .bind(&product.slug)
        .bind(product.price_cents)
        .bind(images)
        .bind(product.track_inventory)
        .bind(product.stock)
        .bind(product.is_active)
        .bind(product.created_at)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Sets (or replaces) one attribute value of a product.
    pub async fn set_attribute(&self, product_id: &str, key: &str, value: &str) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO product_attributes (product_id, attribute_key, value)
             VALUES (?1, ?2, ?3)
             ON CONFLICT(product_id, attribute_key) DO UPDATE SET value = excluded.value",
        )
        .bind(product_id)
        .bind(key)
        .bind(value)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Adds a purchasable variant. `price_cents` None means "product price".
    pub async fn insert_variant(
        &self,
        id: &str,
        product_id: &str,
        name: &str,
        price_cents: Option<i64>,
        stock: i64,
    ) -> DbResult<()> {
        sqlx::query(
            "INSERT INTO product_variants (id, product_id, name, price_cents, stock)
             VALUES (?1, ?2, ?3, ?4, ?5)",
        )
        .bind(id)
        .bind(product_id)
        .bind(name)
        .bind(price_cents)
        .bind(stock)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Variant price overrides for the given `(product_id, variant_id)` pairs.
    ///
    /// Variants that belong to another product or have no own price are absent.
    pub async fn variant_prices(&self, lines: &[(String, String)]) -> DbResult<HashMap<String, Money>> {
        if lines.is_empty() {
            return Ok(HashMap::new());
        }

        let mut query = QueryBuilder::<Sqlite>::new(
            "SELECT id, product_id, price_cents FROM product_variants WHERE price_cents IS NOT NULL AND id IN (",
        );
        let mut separated = query.separated(", ");
        for (_, variant_id) in lines {
            separated.push_bind(variant_id.as_str());
        }
        query.push(")");

        let rows: Vec<(String, String, i64)> = query.build_query_as().fetch_all(&self.pool).await?;
        Ok(rows
            .into_iter()
            .filter(|(id, product_id, _)| {
                lines.iter().any(|(p, v)| p == product_id && v == id)
            })
            .map(|(id, _, price_cents)| (id, Money::from_minor(price_cents)))
            .collect())
    }

    /// Decrements stock after a sale, floored at zero.
    ///
    /// One `UPDATE`, so concurrent orders for the same product never lose a
    /// decrement.
    ///
    /// ## Returns
    /// * `Ok(Some(stock))` - New stock level
    /// * `Ok(None)` - Inventory not tracked for this product; nothing changed
    /// * `Err(DbError::NotFound)` - Unknown product
    pub async fn decrement_stock(&self, id: &str, quantity: i64) -> DbResult<Option<i64>> {
        let stock: Option<i64> = sqlx::query_scalar(
            r#"
            UPDATE products SET stock = MAX(stock - ?2, 0)
            WHERE id = ?1 AND track_inventory = 1
            RETURNING stock
            "#,
        )
        .bind(id)
        .bind(quantity.max(0))
        .fetch_optional(&self.pool)
        .await?;

        if let Some(stock) = stock {
            debug!(id = %id, quantity, stock, "Stock decremented");
            return Ok(Some(stock));
        }

        if self.get_by_id(id).await?.is_none() {
            return Err(DbError::not_found("Product", id));
        }
        debug!(id = %id, "Inventory not tracked, skipping stock update");
        Ok(None)
    }

    /// Counts active products (for diagnostics and the seed binary).
    pub async fn count(&self) -> DbResult<i64> {
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM products WHERE is_active = 1")
            .fetch_one(&self.pool)
            .await?;

        Ok(count)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{product, seed_category, seed_profile, test_db};
    use crate::Database;
    use chrono::Duration;

    async fn catalog() -> Database {
        let db = test_db().await;
        seed_profile(&db, "s1", "shop-one").await;
        seed_category(&db, "c-el", "electronics", None).await;
        seed_category(&db, "c-ph", "phones", Some("c-el")).await;
        seed_category(&db, "c-bk", "books", None).await;

        let base = Utc::now();
        let items = [
            ("p1", Some("c-ph"), 0),
            ("p2", Some("c-el"), 1),
            ("p3", Some("c-bk"), 2),
            ("p4", Some("c-ph"), 3),
        ];
        for (id, category, age) in items {
            let mut p = product(id, "s1", category, 1000);
            p.created_at = base - Duration::minutes(age);
            db.products().insert(&p).await.unwrap();
        }
        db
    }

    #[tokio::test]
    async fn test_newest_feed_includes_descendants() {
        let db = catalog().await;

        let page = db
            .products()
            .list_newest(&ProductFeedQuery::for_category("electronics"))
            .await
            .unwrap();

        let ids: Vec<&str> = page.products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p2", "p4"]);
        assert!(!page.has_more);
        assert_eq!(page.products[0].store_slug.as_deref(), Some("shop-one"));
        assert_eq!(page.products[0].category_slug.as_deref(), Some("phones"));
    }

    #[tokio::test]
    async fn test_feed_pagination_has_more() {
        let db = catalog().await;
        let repo = db.products();

        let first = repo
            .list_newest(&ProductFeedQuery::default().limit(3))
            .await
            .unwrap();
        assert_eq!(first.products.len(), 3);
        assert!(first.has_more);

        let second = repo
            .list_newest(&ProductFeedQuery::default().limit(3).page(2))
            .await
            .unwrap();
        assert_eq!(second.products.len(), 1);
        assert_eq!(second.products[0].id, "p4");
        assert!(!second.has_more);
    }

    #[tokio::test]
    async fn test_unknown_category_is_empty() {
        let db = catalog().await;
        let page = db
            .products()
            .list_newest(&ProductFeedQuery::for_category("missing"))
            .await
            .unwrap();
        assert!(page.products.is_empty());
        assert!(!page.has_more);
    }

    #[tokio::test]
    async fn test_attribute_filters() {
        let db = catalog().await;
        let repo = db.products();
        repo.set_attribute("p1", "brand", "samsung").await.unwrap();
        repo.set_attribute("p4", "brand", "apple").await.unwrap();
        repo.set_attribute("p2", "brand", "sony").await.unwrap();

        let feed = ProductFeedQuery::for_category("electronics")
            .with_attr_params([("attr_brand", "samsung, apple"), ("sort", "newest")]);
        let page = repo.list_newest(&feed).await.unwrap();

        let ids: Vec<&str> = page.products.iter().map(|p| p.id.as_str()).collect();
        assert_eq!(ids, vec!["p1", "p4"]);
    }

    #[tokio::test]
    async fn test_search_escapes_wildcards() {
        let db = catalog().await;
        let repo = db.products();

        let page = repo.search("product p3", 1, 24).await.unwrap();
        assert_eq!(page.products.len(), 1);

        let none = repo.search("%", 1, 24).await.unwrap();
        assert!(none.products.is_empty());

        let all = repo.search("  ", 1, 24).await.unwrap();
        assert_eq!(all.products.len(), 4);
    }

    #[tokio::test]
    async fn test_seller_map_skips_unknown() {
        let db = catalog().await;
        let map = db
            .products()
            .seller_map(&["p1".to_string(), "ghost".to_string()])
            .await
            .unwrap();
        assert_eq!(map.len(), 1);
        assert_eq!(map["p1"], "s1");
    }

    #[tokio::test]
    async fn test_variant_prices_match_product() {
        let db = catalog().await;
        let repo = db.products();
        repo.insert_variant("v1", "p1", "Blue", Some(1500), 3).await.unwrap();
        repo.insert_variant("v2", "p1", "Red", None, 3).await.unwrap();

        let prices = repo
            .variant_prices(&[
                ("p1".to_string(), "v1".to_string()),
                ("p1".to_string(), "v2".to_string()),
                ("p2".to_string(), "v1".to_string()),
            ])
            .await
            .unwrap();
        assert_eq!(prices.len(), 1);
        assert_eq!(prices["v1"], Money::from_minor(1500));
    }

    #[tokio::test]
    async fn test_decrement_stock_floors_and_skips_untracked() {
        let db = catalog().await;
        let repo = db.products();

        assert_eq!(repo.decrement_stock("p1", 3).await.unwrap(), Some(7));
        assert_eq!(repo.decrement_stock("p1", 50).await.unwrap(), Some(0));
        assert_eq!(repo.get_by_id("p1").await.unwrap().unwrap().stock, 0);

        let mut untracked = product("p9", "s1", None, 500);
        untracked.track_inventory = false;
        repo.insert(&untracked).await.unwrap();
        assert_eq!(repo.decrement_stock("p9", 3).await.unwrap(), None);
        assert_eq!(repo.get_by_id("p9").await.unwrap().unwrap().stock, 10);

        assert!(matches!(
            repo.decrement_stock("ghost", 1).await,
            Err(DbError::NotFound { .. })
        ));
    }

    #[tokio::test]
    async fn test_concurrent_decrements_are_not_lost() {
        let db = catalog().await;
        let repo = db.products();

        let (a, b) = tokio::join!(repo.decrement_stock("p1", 2), repo.decrement_stock("p1", 3));
        a.unwrap();
        b.unwrap();
        assert_eq!(repo.get_by_id("p1").await.unwrap().unwrap().stock, 5);
    }

    #[tokio::test]
    async fn test_card_image_falls_back_to_placeholder() {
        let db = catalog().await;
        let mut bare = product("p5", "s1", None, 100);
        bare.images.clear();
        db.products().insert(&bare).await.unwrap();

        let page = db.products().search("Product p5", 1, 24).await.unwrap();
        assert_eq!(page.products[0].image, treido_core::PLACEHOLDER_IMAGE);
    }
}
