//! # Category Repository
//!
//! Category tree lookups and the per-node context the browser asks for.
//!
//! ## Attribute Inheritance
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Attributes for "android-phones"                            │
//! │                                                                         │
//! │  depth 0  android-phones   ── os_version                               │
//! │  depth 1  smartphones      ── storage, screen_size                      │
//! │  depth 2  electronics      ── brand, warranty                           │
//! │  ...      (up to 6 ancestors)                                          │
//! │  global   category_id NULL ── condition                                 │
//! │                                                                         │
//! │  Same attribute_key on several levels: the nearest one wins.           │
//! │  Result is ordered by sort_order, then name.                           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use std::collections::{HashMap, HashSet};

use sqlx::SqlitePool;
use tracing::debug;
use treido_core::category::{normalize_attribute_key, AttributeType};
use treido_core::{CategoryAttribute, CategoryContext, CategoryLite};

use crate::error::{DbError, DbResult};
use crate::repository::decode_string_list;

/// How many ancestors contribute inherited attributes.
pub const MAX_ATTRIBUTE_DEPTH: usize = 6;

const CATEGORY_COLUMNS: &str = "id, name, name_bg, slug, parent_id, icon, image_url";

#[derive(Debug, sqlx::FromRow)]
struct AttributeRow {
    id: String,
    category_id: Option<String>,
    name: String,
    name_bg: Option<String>,
    attribute_type: String,
    attribute_key: Option<String>,
    options: Option<String>,
    options_bg: Option<String>,
    is_filterable: bool,
    is_required: bool,
    sort_order: i64,
}

impl From<AttributeRow> for CategoryAttribute {
    fn from(row: AttributeRow) -> Self {
        let attribute_key = row
            .attribute_key
            .filter(|key| !key.trim().is_empty())
            .unwrap_or_else(|| normalize_attribute_key(&row.name));
        let options = row.options.as_deref().map(|raw| decode_string_list(Some(raw)));
        let options_bg = row.options_bg.as_deref().map(|raw| decode_string_list(Some(raw)));

        CategoryAttribute {
            id: row.id,
            category_id: row.category_id,
            name: row.name,
            name_bg: row.name_bg,
            attribute_type: AttributeType::parse(&row.attribute_type),
            attribute_key,
            options,
            options_bg,
            is_filterable: row.is_filterable,
            is_required: row.is_required,
            sort_order: row.sort_order,
        }
    }
}

/// Repository for category database operations.
#[derive(Debug, Clone)]
pub struct CategoryRepository {
    pool: SqlitePool,
}

impl CategoryRepository {
    /// Creates a new CategoryRepository.
    pub fn new(pool: SqlitePool) -> Self {
        CategoryRepository { pool }
    }

    /// Gets a category by slug.
    pub async fn get_by_slug(&self, slug: &str) -> DbResult<Option<CategoryLite>> {
        let category = sqlx::query_as::<_, CategoryLite>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE slug = ?1"
        ))
        .bind(slug)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Gets a category by id.
    pub async fn get_by_id(&self, id: &str) -> DbResult<Option<CategoryLite>> {
        let category = sqlx::query_as::<_, CategoryLite>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories WHERE id = ?1"
        ))
        .bind(id)
        .fetch_optional(&self.pool)
        .await?;

        Ok(category)
    }

    /// Lists top-level categories.
    pub async fn list_roots(&self) -> DbResult<Vec<CategoryLite>> {
        let categories = sqlx::query_as::<_, CategoryLite>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
             WHERE parent_id IS NULL
             ORDER BY display_order, name"
        ))
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Lists the direct children of a category.
    pub async fn children(&self, parent_id: &str) -> DbResult<Vec<CategoryLite>> {
        let categories = sqlx::query_as::<_, CategoryLite>(&format!(
            "SELECT {CATEGORY_COLUMNS} FROM categories
             WHERE parent_id = ?1
             ORDER BY display_order, name"
        ))
        .bind(parent_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(categories)
    }

    /// Builds the context for one node: parent, siblings, children, attributes.
    ///
    /// Siblings of a root category are the other roots.
    ///
    /// ## Returns
    /// * `Ok(None)` - No category with this slug
    pub async fn context(&self, slug: &str) -> DbResult<Option<CategoryContext>> {
        debug!(slug = %slug, "Loading category context");

        let Some(current) = self.get_by_slug(slug).await? else {
            return Ok(None);
        };

        let (parent, siblings) = match current.parent_id.as_deref() {
            Some(parent_id) => (
                self.get_by_id(parent_id).await?,
                self.children(parent_id).await?,
            ),
            None => (None, self.list_roots().await?),
        };
        let siblings = siblings
            .into_iter()
            .filter(|sibling| sibling.id != current.id)
            .collect();

        let children = self.children(&current.id).await?;
        let attributes = self.attributes_for(&current.id).await?;

        Ok(Some(CategoryContext {
            current,
            parent,
            siblings,
            children,
            attributes,
        }))
    }

    /// Ids of a category and its ancestors, nearest first.
    async fn ancestor_chain(&self, category_id: &str) -> DbResult<Vec<String>> {
        let mut chain = vec![category_id.to_string()];
        let mut cursor = category_id.to_string();

        while chain.len() <= MAX_ATTRIBUTE_DEPTH {
            let parent: Option<Option<String>> =
                sqlx::query_scalar("SELECT parent_id FROM categories WHERE id = ?1")
                    .bind(&cursor)
                    .fetch_optional(&self.pool)
                    .await?;

            match parent.flatten() {
                // A cycle in bad data would otherwise loop until the depth cap.
                Some(parent_id) if !chain.contains(&parent_id) => {
                    chain.push(parent_id.clone());
                    cursor = parent_id;
                }
                _ => break,
            }
        }

        Ok(chain)
    }

    /// Attributes of a category, inherited from its ancestors and globals.
    pub async fn attributes_for(&self, category_id: &str) -> DbResult<Vec<CategoryAttribute>> {
        let chain = self.ancestor_chain(category_id).await?;
        let depth: HashMap<&str, usize> = chain
            .iter()
            .enumerate()
            .map(|(depth, id)| (id.as_str(), depth))
            .collect();

        let mut query = sqlx::QueryBuilder::<sqlx::Sqlite>::new(
            "SELECT id, category_id, name, name_bg, attribute_type, attribute_key,
                    options, options_bg, is_filterable, is_required, sort_order
             FROM category_attributes
             WHERE category_id IS NULL OR category_id IN (",
        );
        let mut ids = query.separated(", ");
        for id in &chain {
            ids.push_bind(id.as_str());
        }
        query.push(")");

        let rows: Vec<AttributeRow> = query.build_query_as().fetch_all(&self.pool).await?;

        let mut attributes: Vec<CategoryAttribute> =
            rows.into_iter().map(CategoryAttribute::from).collect();

        // Nearest owner first so `seen` keeps the most specific definition.
        attributes.sort_by_key(|attr| {
            attr.category_id
                .as_deref()
                .and_then(|id| depth.get(id).copied())
                .unwrap_or(usize::MAX)
        });
        let mut seen = HashSet::new();
        attributes.retain(|attr| seen.insert(attr.attribute_key.clone()));

        attributes.sort_by(|a, b| a.sort_order.cmp(&b.sort_order).then_with(|| a.name.cmp(&b.name)));
        Ok(attributes)
    }

    /// Inserts a category.
    pub async fn insert(&self, category: &CategoryLite, display_order: i64) -> DbResult<()> {
        debug!(slug = %category.slug, "Inserting category");

        sqlx::query(
            "INSERT INTO categories (id, name, name_bg, slug, parent_id, icon, image_url, display_order)
             VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8)",
        )
        .bind(&category.id)
        .bind(&category.name)
        .bind(&category.name_bg)
        .bind(&category.slug)
        .bind(&category.parent_id)
        .bind(&category.icon)
        .bind(&category.image_url)
        .bind(display_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Inserts a category attribute.
    pub async fn insert_attribute(&self, attribute: &CategoryAttribute) -> DbResult<()> {
        debug!(key = %attribute.attribute_key, "Inserting category attribute");

        let options = attribute
            .options
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?;
        let options_bg = attribute
            .options_bg
            .as_ref()
            .map(serde_json::to_string)
            .transpose()
            .map_err(|e| DbError::Internal(e.to_string()))?;

        sqlx::query(
            "INSERT INTO category_attributes (
                id, category_id, name, name_bg, attribute_type, attribute_key,
                options, options_bg, is_filterable, is_required, sort_order
             ) VALUES (?1, ?2, ?3, ?4, ?5, ?6, ?7, ?8, ?9, ?10, ?11)",
        )
        .bind(&attribute.id)
        .bind(&attribute.category_id)
        .bind(&attribute.name)
        .bind(&attribute.name_bg)
        .bind(attribute.attribute_type.as_str())
        .bind(&attribute.attribute_key)
        .bind(options)
        .bind(options_bg)
        .bind(attribute.is_filterable)
        .bind(attribute.is_required)
        .bind(attribute.sort_order)
        .execute(&self.pool)
        .await?;

        Ok(())
    }

    /// Ids of a category and all its descendants.
    pub async fn descendant_ids(&self, category_id: &str) -> DbResult<Vec<String>> {
        let ids = sqlx::query_scalar::<_, String>(
            "WITH RECURSIVE tree(id) AS (
                SELECT id FROM categories WHERE id = ?1
                UNION
                SELECT c.id FROM categories c JOIN tree t ON c.parent_id = t.id
             )
             SELECT id FROM tree",
        )
        .bind(category_id)
        .fetch_all(&self.pool)
        .await?;

        Ok(ids)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::repository::test_support::{seed_category, test_db};
    use crate::Database;

    fn attribute(id: &str, category_id: Option<&str>, name: &str, sort_order: i64) -> CategoryAttribute {
        CategoryAttribute {
            id: id.to_string(),
            category_id: category_id.map(str::to_string),
            name: name.to_string(),
            name_bg: None,
            attribute_type: AttributeType::Select,
            attribute_key: normalize_attribute_key(name),
            options: Some(vec!["a".into(), "b".into()]),
            options_bg: None,
            is_filterable: true,
            is_required: false,
            sort_order,
        }
    }

    async fn tree() -> Database {
        let db = test_db().await;
        seed_category(&db, "c-el", "electronics", None).await;
        seed_category(&db, "c-fa", "fashion", None).await;
        seed_category(&db, "c-ph", "smartphones", Some("c-el")).await;
        seed_category(&db, "c-lp", "laptops", Some("c-el")).await;
        seed_category(&db, "c-an", "android", Some("c-ph")).await;
        db
    }

    #[tokio::test]
    async fn test_context_neighbourhood() {
        let db = tree().await;

        let ctx = db.categories().context("smartphones").await.unwrap().unwrap();
        assert_eq!(ctx.current.slug, "smartphones");
        assert_eq!(ctx.parent.as_ref().map(|p| p.slug.as_str()), Some("electronics"));
        assert_eq!(
            ctx.siblings.iter().map(|c| c.slug.as_str()).collect::<Vec<_>>(),
            vec!["laptops"]
        );
        assert_eq!(ctx.children.len(), 1);
        assert_eq!(ctx.children[0].slug, "android");
    }

    #[tokio::test]
    async fn test_root_context_siblings_are_roots() {
        let db = tree().await;

        let ctx = db.categories().context("electronics").await.unwrap().unwrap();
        assert!(ctx.parent.is_none());
        assert_eq!(ctx.siblings.len(), 1);
        assert_eq!(ctx.siblings[0].slug, "fashion");
    }

    #[tokio::test]
    async fn test_unknown_slug_has_no_context() {
        let db = tree().await;
        assert!(db.categories().context("nope").await.unwrap().is_none());
    }

    #[tokio::test]
    async fn test_attribute_inheritance_nearest_wins() {
        let db = tree().await;
        let repo = db.categories();

        repo.insert_attribute(&attribute("a1", Some("c-el"), "Brand", 1)).await.unwrap();
        repo.insert_attribute(&attribute("a2", Some("c-ph"), "Storage", 2)).await.unwrap();
        repo.insert_attribute(&attribute("a3", None, "Condition", 0)).await.unwrap();
        let mut override_brand = attribute("a4", Some("c-an"), "Brand", 1);
        override_brand.options = Some(vec!["Samsung".into()]);
        repo.insert_attribute(&override_brand).await.unwrap();
        repo.insert_attribute(&attribute("a5", Some("c-fa"), "Size", 0)).await.unwrap();

        let attrs = repo.attributes_for("c-an").await.unwrap();
        let keys: Vec<&str> = attrs.iter().map(|a| a.attribute_key.as_str()).collect();
        assert_eq!(keys, vec!["condition", "brand", "storage"]);
        assert_eq!(attrs[1].id, "a4");
    }

    #[tokio::test]
    async fn test_attribute_key_falls_back_to_name() {
        let db = tree().await;
        sqlx::query(
            "INSERT INTO category_attributes (id, category_id, name, attribute_type, attribute_key)
             VALUES ('x1', 'c-ph', 'Screen Size', 'slider', NULL)",
        )
        .execute(db.pool())
        .await
        .unwrap();

        let attrs = db.categories().attributes_for("c-ph").await.unwrap();
        assert_eq!(attrs[0].attribute_key, "screen_size");
        assert_eq!(attrs[0].attribute_type, AttributeType::Text);
        assert_eq!(attrs[0].options, None);
    }

    #[tokio::test]
    async fn test_descendant_ids() {
        let db = tree().await;
        let mut ids = db.categories().descendant_ids("c-el").await.unwrap();
        ids.sort();
        assert_eq!(ids, vec!["c-an", "c-el", "c-lp", "c-ph"]);
    }
}
