//! Catalog routes: categories and product feeds.

use std::sync::Arc;

use axum::extract::{Path, Query, State};
use axum::Json;
use tracing::debug;
use treido_core::validation::{validate_search_query, validate_slug};
use treido_core::{CategoryContext, CategoryLite, ProductPage, MAX_PAGE_SIZE};
use treido_db::ProductFeedQuery;

use super::AppState;
use crate::error::ApiError;

type QueryPairs = Vec<(String, String)>;

fn param<'a>(pairs: &'a QueryPairs, key: &str) -> Option<&'a str> {
    pairs
        .iter()
        .find(|(k, _)| k == key)
        .map(|(_, v)| v.trim())
        .filter(|v| !v.is_empty())
}

/// `page` (1-based) and `limit` (capped) from the query.
fn paging(state: &AppState, pairs: &QueryPairs) -> Result<(u32, u32), ApiError> {
    let page = match param(pairs, "page") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ApiError::validation(format!("invalid page: {}", raw)))?
            .max(1),
        None => 1,
    };
    let limit = match param(pairs, "limit") {
        Some(raw) => raw
            .parse::<u32>()
            .map_err(|_| ApiError::validation(format!("invalid limit: {}", raw)))?
            .clamp(1, MAX_PAGE_SIZE),
        None => state.config.catalog.page_size,
    };
    Ok((page, limit))
}

/// `GET /api/categories`
pub async fn list_categories(State(state): State<Arc<AppState>>) -> Result<Json<Vec<CategoryLite>>, ApiError> {
    Ok(Json(state.db.categories().list_roots().await?))
}

/// `GET /api/categories/{slug}/context`
pub async fn category_context(
    State(state): State<Arc<AppState>>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryContext>, ApiError> {
    validate_slug(&slug)?;
    debug!(slug = %slug, "category context");
    state
        .db
        .categories()
        .context(&slug)
        .await?
        .map(Json)
        .ok_or_else(|| ApiError::not_found("Category", &slug))
}

/// `GET /api/products/newest?category=&page=&limit=&attr_*=`
///
/// Without `category` the feed spans the whole catalog.
pub async fn newest_products(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<ProductPage>, ApiError> {
    let (page, limit) = paging(&state, &pairs)?;
    let mut feed = match param(&pairs, "category") {
        Some(slug) => {
            validate_slug(slug)?;
            ProductFeedQuery::for_category(slug)
        }
        None => ProductFeedQuery::default(),
    };
    feed = feed
        .page(page)
        .limit(limit)
        .with_attr_params(pairs.iter().map(|(k, v)| (k.as_str(), v.as_str())));

    Ok(Json(state.db.products().list_newest(&feed).await?))
}

/// `GET /api/products/search?q=&page=&limit=`
pub async fn search_products(
    State(state): State<Arc<AppState>>,
    Query(pairs): Query<QueryPairs>,
) -> Result<Json<ProductPage>, ApiError> {
    let (page, limit) = paging(&state, &pairs)?;
    let Some(query) = validate_search_query(param(&pairs, "q").unwrap_or_default())? else {
        return Ok(Json(ProductPage::default()));
    };
    Ok(Json(state.db.products().search(&query, page, limit).await?))
}

#[cfg(test)]
mod tests {
    use crate::api::test_support::{send, state};
    use axum::http::StatusCode;
    use treido_core::CategoryLite;

    #[tokio::test]
    async fn test_categories_and_context() {
        let state = state().await;
        let category = |id: &str, slug: &str, parent: Option<&str>| CategoryLite {
            id: id.into(),
            name: slug.into(),
            name_bg: None,
            slug: slug.into(),
            parent_id: parent.map(Into::into),
            icon: None,
            image_url: None,
        };
        state.db.categories().insert(&category("c1", "furniture", None), 0).await.unwrap();
        state.db.categories().insert(&category("c2", "chairs", Some("c1")), 0).await.unwrap();

        let (status, body) = send(&state, "GET", "/api/categories", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body.as_array().unwrap().len(), 1);

        let (status, body) = send(&state, "GET", "/api/categories/chairs/context", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["parent"]["slug"], "furniture");

        let (status, body) = send(&state, "GET", "/api/categories/sofas/context", None, None).await;
        assert_eq!(status, StatusCode::NOT_FOUND);
        assert_eq!(body["code"], "NOT_FOUND");
    }

    #[tokio::test]
    async fn test_newest_and_search() {
        let state = state().await;

        let (status, body) = send(&state, "GET", "/api/products/newest?limit=10", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["products"][0]["id"], "p1");
        assert_eq!(body["products"][0]["price"], 19.99);
        assert_eq!(body["hasMore"], false);

        let (status, body) = send(&state, "GET", "/api/products/newest?category=unknown", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["products"].as_array().unwrap().is_empty());

        let (status, _) = send(&state, "GET", "/api/products/newest?page=abc", None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);

        let (status, body) = send(&state, "GET", "/api/products/search?q=oak", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert_eq!(body["products"].as_array().unwrap().len(), 1);

        let (_, body) = send(&state, "GET", "/api/products/search", None, None).await;
        assert!(body["products"].as_array().unwrap().is_empty());

        // one character is too short to search
        let (status, body) = send(&state, "GET", "/api/products/search?q=o", None, None).await;
        assert_eq!(status, StatusCode::OK);
        assert!(body["products"].as_array().unwrap().is_empty());

        let long = "x".repeat(101);
        let (status, _) = send(&state, "GET", &format!("/api/products/search?q={long}"), None, None).await;
        assert_eq!(status, StatusCode::BAD_REQUEST);
    }
}
