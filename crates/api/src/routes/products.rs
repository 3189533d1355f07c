//! Product route handlers.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use rust_decimal::Decimal;
use serde::Deserialize;

use lumina_core::{CategoryId, ProductId};

use crate::db::catalog::{ProductFilter, ProductSort, SortOrder};
use crate::db::{CatalogRepository, ReviewRepository};
use crate::error::{AppError, Result};
use crate::middleware::OptionalUser;
use crate::response::ApiResponse;
use crate::routes::Pagination;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 20;
const FEATURED_LIMIT: i64 = 10;
const SEARCH_LIMIT: i64 = 50;
const SIMILAR_LIMIT: i64 = 6;
const REVIEWS_PER_PAGE: i64 = 10;

/// Listing filters. Paging comes from a separate [`Pagination`] extractor.
#[derive(Debug, Default, Deserialize)]
pub struct ProductQuery {
    pub category_id: Option<CategoryId>,
    pub search: Option<String>,
    pub min_price: Option<Decimal>,
    pub max_price: Option<Decimal>,
    #[serde(default)]
    pub sort_by: ProductSort,
    #[serde(default)]
    pub sort_order: SortOrder,
}

impl From<ProductQuery> for ProductFilter {
    fn from(query: ProductQuery) -> Self {
        Self {
            category_id: query.category_id,
            search: query.search,
            min_price: query.min_price,
            max_price: query.max_price,
            sort: query.sort_by,
            order: query.sort_order,
        }
    }
}

#[derive(Debug, Deserialize)]
pub struct SearchQuery {
    pub q: Option<String>,
}

/// `?rating=` on the reviews listing. Paging comes from [`Pagination`].
#[derive(Debug, Default, Deserialize)]
pub struct ReviewQuery {
    pub rating: Option<i16>,
}

/// Purchasable products.
///
/// GET /api/products
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(
    State(state): State<AppState>,
    Query(query): Query<ProductQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let products = CatalogRepository::new(state.pool())
        .list_products(&query.into(), limit, offset)
        .await?;

    Ok(ApiResponse::data(products))
}

/// GET /api/products/featured
///
/// # Errors
///
/// 500 on database failure.
pub async fn featured(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let products = CatalogRepository::new(state.pool())
        .featured(FEATURED_LIMIT)
        .await?;
    Ok(ApiResponse::data(products))
}

/// GET /api/products/search?q=
///
/// # Errors
///
/// 400 when `q` is missing or blank.
pub async fn search(
    State(state): State<AppState>,
    Query(query): Query<SearchQuery>,
) -> Result<impl IntoResponse> {
    let term = query
        .q
        .as_deref()
        .map(str::trim)
        .filter(|q| !q.is_empty())
        .ok_or_else(|| AppError::BadRequest("Search query is required".to_owned()))?;

    let products = CatalogRepository::new(state.pool())
        .search(term, SEARCH_LIMIT)
        .await?;

    Ok(ApiResponse::data(products))
}

/// Product with category and active variants. Signed-in callers get the
/// view added to their recently viewed list.
///
/// GET /api/products/{id}
///
/// # Errors
///
/// 404 if the product is missing or inactive.
pub async fn show(
    State(state): State<AppState>,
    OptionalUser(viewer): OptionalUser,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let catalog = CatalogRepository::new(state.pool());
    let detail = catalog.get_detail(id).await?.ok_or_else(product_not_found)?;

    if let Some(viewer) = viewer
        && let Err(e) = catalog.record_view(viewer.user.id, id).await
    {
        tracing::warn!(error = %e, product_id = %id, "failed to record product view");
    }

    Ok(ApiResponse::data(detail))
}

/// GET /api/products/{id}/reviews?rating=&page=
///
/// # Errors
///
/// 404 if the product doesn't exist.
pub async fn reviews(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
    Query(query): Query<ReviewQuery>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    CatalogRepository::new(state.pool())
        .get_product(id)
        .await?
        .ok_or_else(product_not_found)?;

    let (limit, offset) = pagination.limit_offset(REVIEWS_PER_PAGE);
    let reviews = ReviewRepository::new(state.pool())
        .list_for_product(id, query.rating, limit, offset)
        .await?;

    Ok(ApiResponse::data(reviews))
}

/// GET /api/products/{id}/variants
///
/// # Errors
///
/// 404 if the product is missing or inactive.
pub async fn variants(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let catalog = CatalogRepository::new(state.pool());
    catalog
        .get_product(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(product_not_found)?;

    Ok(ApiResponse::data(catalog.active_variants(id).await?))
}

/// GET /api/products/{id}/similar
///
/// # Errors
///
/// 404 if the product is missing or inactive.
pub async fn similar(
    State(state): State<AppState>,
    Path(id): Path<ProductId>,
) -> Result<impl IntoResponse> {
    let catalog = CatalogRepository::new(state.pool());
    let product = catalog
        .get_product(id)
        .await?
        .filter(|p| p.is_active)
        .ok_or_else(product_not_found)?;

    Ok(ApiResponse::data(
        catalog.similar(&product, SIMILAR_LIMIT).await?,
    ))
}

fn product_not_found() -> AppError {
    AppError::NotFound("Product not found".to_owned())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use axum::http::Uri;
    use rust_decimal_macros::dec;

    use super::*;

    fn parse(uri: &str) -> ProductQuery {
        let uri: Uri = uri.parse().unwrap();
        Query::<ProductQuery>::try_from_uri(&uri).unwrap().0
    }

    #[test]
    fn test_query_defaults() {
        let query = parse("/api/products");
        assert_eq!(query.sort_by, ProductSort::Newest);
        assert_eq!(query.sort_order, SortOrder::Desc);
        assert!(query.category_id.is_none());
    }

    #[test]
    fn test_query_parses_filters() {
        let query = parse(
            "/api/products?category_id=3&min_price=9.50&max_price=40&sort_by=price&sort_order=asc&page=2",
        );
        assert_eq!(query.category_id, Some(CategoryId::new(3)));
        assert_eq!(query.min_price, Some(dec!(9.50)));
        assert_eq!(query.max_price, Some(dec!(40)));
        assert_eq!(query.sort_by, ProductSort::Price);
        assert_eq!(query.sort_order, SortOrder::Asc);
    }

    #[test]
    fn test_review_query_rating_filter() {
        let uri: Uri = "/api/products/4/reviews?rating=5&page=2".parse().unwrap();
        let query = Query::<ReviewQuery>::try_from_uri(&uri).unwrap().0;
        assert_eq!(query.rating, Some(5));

        let uri: Uri = "/api/products/4/reviews".parse().unwrap();
        assert!(Query::<ReviewQuery>::try_from_uri(&uri).unwrap().0.rating.is_none());

        let uri: Uri = "/api/products/4/reviews?rating=great".parse().unwrap();
        assert!(Query::<ReviewQuery>::try_from_uri(&uri).is_err());
    }

    #[test]
    fn test_unknown_sort_is_rejected() {
        let uri: Uri = "/api/products?sort_by=popularity".parse().unwrap();
        assert!(Query::<ProductQuery>::try_from_uri(&uri).is_err());
    }
}
