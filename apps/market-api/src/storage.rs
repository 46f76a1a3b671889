//! # Client Storage
//!
//! Key/value storage for state that lives on the shopper's device: the guest
//! cart and recent searches. Values are JSON text, the same shape the web
//! storefront keeps in `localStorage`.
//!
//! ## Keys
//! ```text
//! ┌──────────────────────────┬─────────────────────────────────────────────┐
//! │ cart                     │ [CartItem, ...]                             │
//! │ recentSearches           │ ["oak chair", "lamp", ...]  newest first    │
//! │ recentSearchedProducts   │ [{id,title,price,image,slug,searchedAt}]    │
//! │ remember-me              │ "true"                                      │
//! │ remembered-email         │ "ivan@example.com"                          │
//! └──────────────────────────┴─────────────────────────────────────────────┘
//! ```

use std::collections::BTreeMap;
use std::path::PathBuf;
use std::sync::{Arc, Mutex};

use chrono::Utc;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tracing::warn;
use treido_core::money::{major_units, Money};
use treido_core::{storage_keys, ProductCard, RECENT_PRODUCTS_LIMIT, RECENT_SEARCHES_LIMIT};

use crate::error::{MarketError, MarketResult};

// =============================================================================
// Storage Trait
// =============================================================================

/// String key/value store.
pub trait CartStorage: Send + Sync {
    fn get(&self, key: &str) -> MarketResult<Option<String>>;
    fn set(&self, key: &str, value: &str) -> MarketResult<()>;
    fn remove(&self, key: &str) -> MarketResult<()>;
}

// =============================================================================
// Memory Backend
// =============================================================================

/// In-process storage. Used by tests and short-lived sessions.
#[derive(Debug, Default)]
pub struct MemoryStorage {
    values: Mutex<BTreeMap<String, String>>,
}

impl MemoryStorage {
    pub fn new() -> Self {
        Self::default()
    }

    fn lock(&self) -> MarketResult<std::sync::MutexGuard<'_, BTreeMap<String, String>>> {
        self.values
            .lock()
            .map_err(|_| MarketError::Storage("memory storage lock poisoned".into()))
    }
}

impl CartStorage for MemoryStorage {
    fn get(&self, key: &str) -> MarketResult<Option<String>> {
        Ok(self.lock()?.get(key).cloned())
    }

    fn set(&self, key: &str, value: &str) -> MarketResult<()> {
        self.lock()?.insert(key.to_string(), value.to_string());
        Ok(())
    }

    fn remove(&self, key: &str) -> MarketResult<()> {
        self.lock()?.remove(key);
        Ok(())
    }
}

// =============================================================================
// JSON File Backend
// =============================================================================

/// Storage persisted as one JSON object in a file.
///
/// The whole file is read and rewritten on every call. A missing file is an
/// empty store; an unreadable one is an error.
#[derive(Debug)]
pub struct JsonFileStorage {
    path: PathBuf,
    write_lock: Mutex<()>,
}

impl JsonFileStorage {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        JsonFileStorage {
            path: path.into(),
            write_lock: Mutex::new(()),
        }
    }

    /// `storage.json` in the platform data directory.
    pub fn default_path() -> Option<PathBuf> {
        directories::ProjectDirs::from("bg", "treido", "market")
            .map(|dirs| dirs.data_dir().join("storage.json"))
    }

    fn read_all(&self) -> MarketResult<BTreeMap<String, String>> {
        if !self.path.exists() {
            return Ok(BTreeMap::new());
        }
        let contents = std::fs::read_to_string(&self.path)
            .map_err(|e| MarketError::Storage(format!("{}: {}", self.path.display(), e)))?;
        if contents.trim().is_empty() {
            return Ok(BTreeMap::new());
        }
        serde_json::from_str(&contents)
            .map_err(|e| MarketError::Storage(format!("{}: {}", self.path.display(), e)))
    }

    fn write_all(&self, values: &BTreeMap<String, String>) -> MarketResult<()> {
        if let Some(parent) = self.path.parent() {
            std::fs::create_dir_all(parent).map_err(|e| MarketError::Storage(e.to_string()))?;
        }
        let contents = serde_json::to_string_pretty(values).map_err(|e| MarketError::Storage(e.to_string()))?;
        std::fs::write(&self.path, contents).map_err(|e| MarketError::Storage(e.to_string()))
    }

    fn update(&self, f: impl FnOnce(&mut BTreeMap<String, String>)) -> MarketResult<()> {
        let _guard = self
            .write_lock
            .lock()
            .map_err(|_| MarketError::Storage("file storage lock poisoned".into()))?;
        let mut values = self.read_all()?;
        f(&mut values);
        self.write_all(&values)
    }
}

impl CartStorage for JsonFileStorage {
    fn get(&self, key: &str) -> MarketResult<Option<String>> {
        Ok(self.read_all()?.remove(key))
    }

    fn set(&self, key: &str, value: &str) -> MarketResult<()> {
        self.update(|values| {
            values.insert(key.to_string(), value.to_string());
        })
    }

    fn remove(&self, key: &str) -> MarketResult<()> {
        self.update(|values| {
            values.remove(key);
        })
    }
}

// =============================================================================
// Recent Searches
// =============================================================================

/// Raw text under `key`. Read errors are logged and read as absent.
fn read_key(storage: &dyn CartStorage, key: &str) -> Option<String> {
    match storage.get(key) {
        Ok(raw) => raw,
        Err(e) => {
            warn!(key, error = %e, "Failed to read device storage");
            None
        }
    }
}

fn write_json<T: Serialize>(storage: &dyn CartStorage, key: &str, value: &T) -> MarketResult<()> {
    let encoded = serde_json::to_string(value).map_err(|e| MarketError::Storage(e.to_string()))?;
    storage.set(key, &encoded)
}

/// Search terms (`recentSearches`): newest first, de-duplicated, at most five.
#[derive(Clone)]
pub struct RecentSearches {
    storage: Arc<dyn CartStorage>,
    key: &'static str,
}

impl RecentSearches {
    pub fn terms(storage: Arc<dyn CartStorage>) -> Self {
        RecentSearches {
            storage,
            key: storage_keys::RECENT_SEARCHES,
        }
    }

    /// Stored entries. Unreadable values read as empty.
    pub fn list(&self) -> Vec<String> {
        let Some(raw) = read_key(self.storage.as_ref(), self.key) else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<String>>(&raw) {
            Ok(mut entries) => {
                entries.truncate(RECENT_SEARCHES_LIMIT);
                entries
            }
            Err(e) => {
                warn!(key = self.key, error = %e, "Failed to parse recent searches");
                Vec::new()
            }
        }
    }

    /// Moves `entry` to the front. Blank entries are ignored.
    pub fn record(&self, entry: &str) -> MarketResult<Vec<String>> {
        if entry.trim().is_empty() {
            return Ok(self.list());
        }

        let mut updated = vec![entry.to_string()];
        updated.extend(self.list().into_iter().filter(|existing| existing != entry));
        updated.truncate(RECENT_SEARCHES_LIMIT);

        write_json(self.storage.as_ref(), self.key, &updated)?;
        Ok(updated)
    }

    pub fn clear(&self) -> MarketResult<()> {
        self.storage.remove(self.key)
    }
}

/// A product opened from search, as kept under `recentSearchedProducts`.
///
/// ```json
/// { "id": "p1", "title": "Oak chair", "price": 19.99, "image": null,
///   "slug": "oak-chair", "searchedAt": 1718000000000 }
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RecentProduct {
    pub id: String,
    #[serde(default)]
    pub title: String,
    #[serde(with = "major_units")]
    pub price: Money,
    #[serde(default)]
    pub image: Option<String>,
    #[serde(default)]
    pub slug: Option<String>,
    /// Unix time in milliseconds.
    #[serde(default)]
    pub searched_at: i64,
}

impl From<&ProductCard> for RecentProduct {
    fn from(card: &ProductCard) -> Self {
        RecentProduct {
            id: card.id.clone(),
            title: card.title.clone(),
            price: card.price,
            image: Some(card.image.clone()).filter(|image| !image.is_empty()),
            slug: card.slug.clone(),
            searched_at: 0,
        }
    }
}

/// Products opened from search: newest first, unique by id, at most six.
#[derive(Clone)]
pub struct RecentProducts {
    storage: Arc<dyn CartStorage>,
}

impl RecentProducts {
    pub fn new(storage: Arc<dyn CartStorage>) -> Self {
        RecentProducts { storage }
    }

    /// Stored products. Entries that do not parse are skipped.
    pub fn list(&self) -> Vec<RecentProduct> {
        let key = storage_keys::RECENT_SEARCHED_PRODUCTS;
        let Some(raw) = read_key(self.storage.as_ref(), key) else {
            return Vec::new();
        };

        match serde_json::from_str::<Vec<Value>>(&raw) {
            Ok(entries) => entries
                .into_iter()
                .filter_map(|entry| serde_json::from_value::<RecentProduct>(entry).ok())
                .take(RECENT_PRODUCTS_LIMIT)
                .collect(),
            Err(e) => {
                warn!(key, error = %e, "Failed to parse recent products");
                Vec::new()
            }
        }
    }

    /// Moves `product` to the front, stamped with the current time.
    pub fn record(&self, mut product: RecentProduct) -> MarketResult<Vec<RecentProduct>> {
        if product.id.is_empty() {
            return Ok(self.list());
        }
        product.searched_at = Utc::now().timestamp_millis();

        let mut updated = self.list();
        updated.retain(|existing| existing.id != product.id);
        updated.insert(0, product);
        updated.truncate(RECENT_PRODUCTS_LIMIT);

        write_json(self.storage.as_ref(), storage_keys::RECENT_SEARCHED_PRODUCTS, &updated)?;
        Ok(updated)
    }

    pub fn clear(&self) -> MarketResult<()> {
        self.storage.remove(storage_keys::RECENT_SEARCHED_PRODUCTS)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_memory_storage() {
        let storage = MemoryStorage::new();
        assert_eq!(storage.get("cart").unwrap(), None);
        storage.set("cart", "[]").unwrap();
        assert_eq!(storage.get("cart").unwrap().as_deref(), Some("[]"));
        storage.remove("cart").unwrap();
        assert_eq!(storage.get("cart").unwrap(), None);
    }

    #[test]
    fn test_json_file_storage_persists() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("device").join("storage.json");

        let storage = JsonFileStorage::new(&path);
        assert_eq!(storage.get("cart").unwrap(), None);
        storage.set("cart", r#"[{"id":"p1"}]"#).unwrap();
        storage.set("remember-me", "true").unwrap();

        let reopened = JsonFileStorage::new(&path);
        assert_eq!(reopened.get("cart").unwrap().as_deref(), Some(r#"[{"id":"p1"}]"#));
        reopened.remove("cart").unwrap();
        assert_eq!(storage.get("cart").unwrap(), None);
        assert_eq!(storage.get("remember-me").unwrap().as_deref(), Some("true"));
    }

    #[test]
    fn test_json_file_storage_rejects_garbage() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("storage.json");
        std::fs::write(&path, "not json").unwrap();

        let storage = JsonFileStorage::new(&path);
        assert!(matches!(storage.get("cart"), Err(MarketError::Storage(_))));
    }

    #[test]
    fn test_recent_searches_order_dedupe_and_cap() {
        let storage: Arc<dyn CartStorage> = Arc::new(MemoryStorage::new());
        let recent = RecentSearches::terms(storage.clone());

        for term in ["a", "b", "c", "d", "e", "f"] {
            recent.record(term).unwrap();
        }
        assert_eq!(recent.list(), vec!["f", "e", "d", "c", "b"]);

        let updated = recent.record("c").unwrap();
        assert_eq!(updated, vec!["c", "f", "e", "d", "b"]);

        recent.record("   ").unwrap();
        assert_eq!(recent.list().len(), 5);

        // separate key
        assert!(RecentProducts::new(storage).list().is_empty());
    }

    #[test]
    fn test_recent_products_read_storefront_records() {
        let storage: Arc<dyn CartStorage> = Arc::new(MemoryStorage::new());
        storage
            .set(
                "recentSearchedProducts",
                r#"[{"id":"1","title":"Product 1","price":10,"image":null,"slug":"p1","searchedAt":1000},
                    {"id":"2","title":"Product 2","price":20.5,"image":"/img.jpg","slug":"p2","searchedAt":2000},
                    {"title":"no id"}]"#,
            )
            .unwrap();

        let recent = RecentProducts::new(storage.clone());
        let listed = recent.list();
        assert_eq!(listed.len(), 2);
        assert_eq!(listed[1].price, Money::from_minor(2050));
        assert_eq!(listed[1].image.as_deref(), Some("/img.jpg"));

        let updated = recent
            .record(RecentProduct {
                id: "1".into(),
                title: "Product 1".into(),
                price: Money::from_minor(1000),
                image: None,
                slug: Some("p1".into()),
                searched_at: 0,
            })
            .unwrap();
        assert_eq!(updated.iter().map(|p| p.id.as_str()).collect::<Vec<_>>(), vec!["1", "2"]);
        assert!(updated[0].searched_at > 1000);

        let stored: Value = serde_json::from_str(&storage.get("recentSearchedProducts").unwrap().unwrap()).unwrap();
        assert_eq!(stored[0]["price"], 10.0);
        assert_eq!(stored[1]["searchedAt"], 2000);
    }

    #[test]
    fn test_recent_products_cap_and_clear() {
        let storage: Arc<dyn CartStorage> = Arc::new(MemoryStorage::new());
        let recent = RecentProducts::new(storage);

        for i in 0..7 {
            let card = ProductCard {
                id: format!("p{i}"),
                title: format!("Product {i}"),
                price: Money::from_minor(100),
                image: "/placeholder.svg".into(),
                slug: None,
                store_slug: None,
                category_slug: None,
                created_at: Utc::now(),
            };
            recent.record(RecentProduct::from(&card)).unwrap();
        }
        let listed = recent.list();
        assert_eq!(listed.len(), 6);
        assert_eq!(listed[0].id, "p6");
        assert_eq!(listed[5].id, "p1");

        recent.clear().unwrap();
        assert!(recent.list().is_empty());
    }

    #[test]
    fn test_recent_searches_corrupt_value() {
        let storage: Arc<dyn CartStorage> = Arc::new(MemoryStorage::new());
        storage.set("recentSearches", "{oops").unwrap();

        let recent = RecentSearches::terms(storage);
        assert!(recent.list().is_empty());
        assert_eq!(recent.record("lamp").unwrap(), vec!["lamp"]);
        recent.clear().unwrap();
        assert!(recent.list().is_empty());
    }
}
