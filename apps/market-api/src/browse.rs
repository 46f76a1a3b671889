//! # Category Browsing
//!
//! Client-side state for the category page: the current category, its
//! context (parent, siblings, children, filterable attributes) and the
//! product feed, with two independent caches in front of the catalog.
//!
//! ## Caches
//! ```text
//! ┌──────────────────────────┬──────────────────────────────────────────────┐
//! │ context cache            │ slug ──► CategoryContext                     │
//! │ product cache            │ "slug|query|page|limit" ──► ProductPage      │
//! └──────────────────────────┴──────────────────────────────────────────────┘
//! ```
//!
//! Entries live as long as the browser; there is no expiry or size bound.
//!
//! ## Failure Policy
//! ```text
//! context fetch fails   ──► logged, title falls back to the slug, previous
//!                           parent/children kept, products still load
//! product fetch fails   ──► returned to the caller, current products kept
//! prefetch fails        ──► logged at debug, nothing cached
//! ```
//!
//! Every navigation ends by prefetching the contexts of the new category's
//! children, so drilling down is served from the cache.
//!
//! ## History
//! Category changes push `/{locale}/categories/{parent}/{slug}` (or
//! `/{locale}/categories/{slug}` for roots). Filter changes replace the
//! current entry. Back/forward navigation goes through [`CategoryBrowser::handle_location`]
//! and adds no entry.

use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use percent_encoding::{percent_decode_str, utf8_percent_encode, AsciiSet, NON_ALPHANUMERIC};
use tracing::{debug, instrument, warn};
use treido_core::category::without_attr_params;
use treido_core::locale::strip_locale_prefix;
use treido_core::{CategoryContext, Locale, ProductCard, ProductPage, PRODUCTS_PAGE_SIZE};
use treido_db::{Database, ProductFeedQuery};
use url::Url;

use crate::error::{MarketError, MarketResult};

/// Characters left as-is in a path segment.
const PATH_SEGMENT: &AsciiSet = &NON_ALPHANUMERIC.remove(b'-').remove(b'_').remove(b'.').remove(b'~');

/// Query keys owned by the feed request itself.
const RESERVED_PARAMS: [&str; 3] = ["category", "page", "limit"];

// =============================================================================
// Catalog Source
// =============================================================================

/// Where category contexts and product pages come from.
#[async_trait]
pub trait CatalogSource: Send + Sync {
    /// Context of a category. `None` for an unknown slug.
    async fn fetch_context(&self, slug: &str) -> MarketResult<Option<CategoryContext>>;

    /// One page of a category's newest-first feed. `params` are the page's
    /// query pairs (`attr_*` filters and anything else).
    async fn fetch_products(
        &self,
        slug: &str,
        params: &[(String, String)],
        page: u32,
        limit: u32,
    ) -> MarketResult<ProductPage>;
}

/// [`CatalogSource`] over the marketplace HTTP API.
#[derive(Debug, Clone)]
pub struct HttpCatalog {
    base_url: Url,
    client: reqwest::Client,
}

impl HttpCatalog {
    pub fn new(base_url: &str) -> MarketResult<Self> {
        let base_url = Url::parse(base_url).map_err(|e| MarketError::Config(format!("catalog URL: {}", e)))?;
        Ok(HttpCatalog {
            base_url,
            client: reqwest::Client::new(),
        })
    }

    fn endpoint(&self, segments: &[&str]) -> MarketResult<Url> {
        let mut url = self.base_url.clone();
        url.path_segments_mut()
            .map_err(|_| MarketError::Config(format!("catalog URL cannot be a base: {}", self.base_url)))?
            .pop_if_empty()
            .extend(segments);
        Ok(url)
    }

    /// `GET {base}/api/categories/{slug}/context`.
    pub fn context_url(&self, slug: &str) -> MarketResult<Url> {
        self.endpoint(&["api", "categories", slug, "context"])
    }

    /// `GET {base}/api/products/newest?...&category=&page=&limit=`.
    pub fn products_url(&self, slug: &str, params: &[(String, String)], page: u32, limit: u32) -> MarketResult<Url> {
        let mut url = self.endpoint(&["api", "products", "newest"])?;
        {
            let mut query = url.query_pairs_mut();
            for (key, value) in params.iter().filter(|(k, _)| !RESERVED_PARAMS.contains(&k.as_str())) {
                query.append_pair(key, value);
            }
            query
                .append_pair("category", slug)
                .append_pair("page", &page.to_string())
                .append_pair("limit", &limit.to_string());
        }
        Ok(url)
    }

    async fn get(&self, url: Url) -> MarketResult<reqwest::Response> {
        self.client
            .get(url.clone())
            .send()
            .await
            .map_err(|e| MarketError::Catalog(format!("{}: {}", url, e)))
    }
}

#[async_trait]
impl CatalogSource for HttpCatalog {
    #[instrument(skip(self))]
    async fn fetch_context(&self, slug: &str) -> MarketResult<Option<CategoryContext>> {
        let response = self.get(self.context_url(slug)?).await?;
        if response.status() == reqwest::StatusCode::NOT_FOUND {
            return Ok(None);
        }
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Catalog(format!("context {}: {} {}", slug, status, body)));
        }

        response
            .json::<CategoryContext>()
            .await
            .map(Some)
            .map_err(|e| MarketError::Catalog(format!("context {}: {}", slug, e)))
    }

    #[instrument(skip(self, params))]
    async fn fetch_products(
        &self,
        slug: &str,
        params: &[(String, String)],
        page: u32,
        limit: u32,
    ) -> MarketResult<ProductPage> {
        let response = self.get(self.products_url(slug, params, page, limit)?).await?;
        if !response.status().is_success() {
            let status = response.status();
            let body = response.text().await.unwrap_or_default();
            return Err(MarketError::Catalog(format!("products {}: {} {}", slug, status, body)));
        }

        response
            .json::<ProductPage>()
            .await
            .map_err(|e| MarketError::Catalog(format!("products {}: {}", slug, e)))
    }
}

/// [`CatalogSource`] reading the database directly.
#[derive(Debug, Clone)]
pub struct DbCatalog {
    db: Database,
}

impl DbCatalog {
    pub fn new(db: Database) -> Self {
        DbCatalog { db }
    }
}

#[async_trait]
impl CatalogSource for DbCatalog {
    async fn fetch_context(&self, slug: &str) -> MarketResult<Option<CategoryContext>> {
        Ok(self.db.categories().context(slug).await?)
    }

    async fn fetch_products(
        &self,
        slug: &str,
        params: &[(String, String)],
        page: u32,
        limit: u32,
    ) -> MarketResult<ProductPage> {
        let feed = ProductFeedQuery::for_category(slug)
            .page(page)
            .limit(limit)
            .with_attr_params(params.iter().map(|(k, v)| (k.as_str(), v.as_str())));
        Ok(self.db.products().list_newest(&feed).await?)
    }
}

// =============================================================================
// Browser State
// =============================================================================

/// How a navigation touched the history stack.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum HistoryMode {
    Push,
    Replace,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HistoryEntry {
    pub mode: HistoryMode,
    pub url: String,
}

/// Category page state plus its caches.
///
/// Wrap in `tokio::sync::Mutex` when shared between tasks.
pub struct CategoryBrowser {
    source: Arc<dyn CatalogSource>,
    locale: Locale,
    page_size: u32,

    slug: Option<String>,
    params: Vec<(String, String)>,
    title: String,
    context: Option<CategoryContext>,
    products: Vec<ProductCard>,
    page: u32,
    has_more: bool,
    loading: bool,
    history: Vec<HistoryEntry>,

    context_cache: HashMap<String, CategoryContext>,
    product_cache: HashMap<String, ProductPage>,
}

impl CategoryBrowser {
    pub fn new(source: Arc<dyn CatalogSource>, locale: Locale) -> Self {
        CategoryBrowser {
            source,
            locale,
            page_size: PRODUCTS_PAGE_SIZE,
            slug: None,
            params: Vec::new(),
            title: String::new(),
            context: None,
            products: Vec::new(),
            page: 0,
            has_more: false,
            loading: false,
            history: Vec::new(),
            context_cache: HashMap::new(),
            product_cache: HashMap::new(),
        }
    }

    pub fn with_page_size(mut self, page_size: u32) -> Self {
        self.page_size = page_size.max(1);
        self
    }

    // =========================================================================
    // Accessors
    // =========================================================================

    pub fn slug(&self) -> Option<&str> {
        self.slug.as_deref()
    }

    pub fn title(&self) -> &str {
        &self.title
    }

    pub fn context(&self) -> Option<&CategoryContext> {
        self.context.as_ref()
    }

    pub fn products(&self) -> &[ProductCard] {
        &self.products
    }

    pub fn params(&self) -> &[(String, String)] {
        &self.params
    }

    pub fn page(&self) -> u32 {
        self.page
    }

    pub fn has_more(&self) -> bool {
        self.has_more
    }

    pub fn is_loading(&self) -> bool {
        self.loading
    }

    pub fn history(&self) -> &[HistoryEntry] {
        &self.history
    }

    pub fn is_context_cached(&self, slug: &str) -> bool {
        self.context_cache.contains_key(slug)
    }

    // =========================================================================
    // Navigation
    // =========================================================================

    /// Opens a category. Blank or unchanged slugs are ignored.
    pub async fn set_category(&mut self, slug: &str, clear_attr_filters: bool) -> MarketResult<()> {
        let slug = slug.trim();
        if slug.is_empty() || self.slug.as_deref() == Some(slug) {
            return Ok(());
        }
        self.navigate(slug, clear_attr_filters, Some(HistoryMode::Push)).await
    }

    /// Replaces the query parameters and reloads the first page.
    pub async fn set_filters(&mut self, params: Vec<(String, String)>) -> MarketResult<()> {
        self.params = params;
        if self.slug.is_none() {
            return Ok(());
        }
        self.record_history(HistoryMode::Replace);
        self.load_page(1).await
    }

    /// Moves to the parent category, dropping attribute filters.
    ///
    /// ## Returns
    /// `false` when the current category has no known parent.
    pub async fn go_back(&mut self) -> MarketResult<bool> {
        let Some(parent) = self
            .context
            .as_ref()
            .and_then(|ctx| ctx.parent.as_ref())
            .map(|parent| parent.slug.clone())
        else {
            return Ok(false);
        };
        self.navigate(&parent, true, Some(HistoryMode::Push)).await?;
        Ok(true)
    }

    /// Appends the next page. Skipped while loading or at the end.
    pub async fn load_more(&mut self) -> MarketResult<()> {
        if self.loading || !self.has_more || self.slug.is_none() {
            return Ok(());
        }
        self.load_page(self.page + 1).await
    }

    /// Applies a location reached by back/forward navigation.
    ///
    /// Paths outside `/categories/...` are ignored.
    pub async fn handle_location(&mut self, path: &str, query: &str) -> MarketResult<()> {
        let Some(slug) = slug_from_path(path) else {
            return Ok(());
        };

        let params: Vec<(String, String)> = url::form_urlencoded::parse(query.trim_start_matches('?').as_bytes())
            .into_owned()
            .collect();

        if self.slug.as_deref() == Some(slug.as_str()) && self.params == params {
            return Ok(());
        }
        self.params = params;
        self.navigate(&slug, false, None).await
    }

    async fn navigate(&mut self, slug: &str, clear_attr_filters: bool, history: Option<HistoryMode>) -> MarketResult<()> {
        if clear_attr_filters {
            self.params = without_attr_params(&self.params);
        }

        match self.context_for(slug).await {
            Ok(context) => {
                self.title = match &context {
                    Some(ctx) => ctx.current.display_name(self.locale).to_string(),
                    None => slug.to_string(),
                };
                self.context = context;
            }
            Err(e) => {
                warn!(slug = %slug, error = %e, "Failed to load category context");
                self.title = slug.to_string();
            }
        }
        self.slug = Some(slug.to_string());
        self.page = 0;
        self.has_more = false;

        if let Some(mode) = history {
            self.record_history(mode);
        }
        debug!(slug = %slug, locale = %self.locale, "Category opened");

        let loaded = self.load_page(1).await;
        self.prefetch_children().await;
        loaded
    }

    /// Cached context, fetching on a miss.
    async fn context_for(&mut self, slug: &str) -> MarketResult<Option<CategoryContext>> {
        if let Some(ctx) = self.context_cache.get(slug) {
            return Ok(Some(ctx.clone()));
        }

        let fetched = self.source.fetch_context(slug).await?;
        if let Some(ctx) = &fetched {
            self.context_cache.insert(slug.to_string(), ctx.clone());
        }
        Ok(fetched)
    }

    async fn load_page(&mut self, page: u32) -> MarketResult<()> {
        let Some(slug) = self.slug.clone() else {
            return Ok(());
        };

        let key = product_cache_key(&slug, &self.params, page, self.page_size);
        let result = match self.product_cache.get(&key) {
            Some(cached) => cached.clone(),
            None => {
                self.loading = true;
                let fetched = self
                    .source
                    .fetch_products(&slug, &self.params, page, self.page_size)
                    .await;
                self.loading = false;
                let fetched = fetched?;
                self.product_cache.insert(key, fetched.clone());
                fetched
            }
        };

        if page <= 1 {
            self.products = result.products;
        } else {
            self.products.extend(result.products);
        }
        self.page = page;
        self.has_more = result.has_more;
        Ok(())
    }

    // =========================================================================
    // Prefetch
    // =========================================================================

    /// Warms the context cache for one category.
    pub async fn prefetch_category(&mut self, slug: &str) {
        if slug.is_empty() || self.context_cache.contains_key(slug) {
            return;
        }
        match self.source.fetch_context(slug).await {
            Ok(Some(ctx)) => {
                self.context_cache.insert(slug.to_string(), ctx);
            }
            Ok(None) => {}
            Err(e) => debug!(slug = %slug, error = %e, "Prefetch failed"),
        }
    }

    /// Warms the context cache for every child of the current category.
    ///
    /// Runs after each navigation; callers only need it after a cache reset.
    pub async fn prefetch_children(&mut self) {
        let children: Vec<String> = match &self.context {
            Some(ctx) => ctx.children.iter().map(|child| child.slug.clone()).collect(),
            None => return,
        };
        for slug in children {
            self.prefetch_category(&slug).await;
        }
    }

    // =========================================================================
    // URLs
    // =========================================================================

    /// Path plus query of the current category page.
    pub fn current_url(&self) -> Option<String> {
        let slug = self.slug.as_deref()?;
        let parent = self
            .context
            .as_ref()
            .and_then(|ctx| ctx.parent.as_ref())
            .map(|parent| parent.slug.as_str());

        let mut url = category_path(self.locale, parent, slug);
        if !self.params.is_empty() {
            let query = url::form_urlencoded::Serializer::new(String::new())
                .extend_pairs(&self.params)
                .finish();
            url.push('?');
            url.push_str(&query);
        }
        Some(url)
    }

    fn record_history(&mut self, mode: HistoryMode) {
        if let Some(url) = self.current_url() {
            self.history.push(HistoryEntry { mode, url });
        }
    }
}

// =============================================================================
// Helpers
// =============================================================================

/// `slug|query|page|limit`.
pub fn product_cache_key(slug: &str, params: &[(String, String)], page: u32, limit: u32) -> String {
    let query = url::form_urlencoded::Serializer::new(String::new())
        .extend_pairs(params)
        .finish();
    format!("{}|{}|{}|{}", slug, query, page, limit)
}

/// `/{locale}/categories/{parent}/{slug}` or `/{locale}/categories/{slug}`.
pub fn category_path(locale: Locale, parent: Option<&str>, slug: &str) -> String {
    let slug = utf8_percent_encode(slug, PATH_SEGMENT);
    match parent {
        Some(parent) => format!(
            "/{}/categories/{}/{}",
            locale,
            utf8_percent_encode(parent, PATH_SEGMENT),
            slug
        ),
        None => format!("/{}/categories/{}", locale, slug),
    }
}

/// Category slug addressed by a (possibly locale-prefixed) path.
fn slug_from_path(path: &str) -> Option<String> {
    let path = strip_locale_prefix(path);
    let segments: Vec<&str> = path.trim_matches('/').split('/').collect();
    let raw = match segments.as_slice() {
        ["categories", slug] | ["categories", _, slug] if !slug.is_empty() => *slug,
        _ => return None,
    };
    percent_decode_str(raw).decode_utf8().ok().map(|slug| slug.into_owned())
}
