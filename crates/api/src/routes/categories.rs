//! Category route handlers.

use axum::{
    extract::{Path, Query, State},
    response::IntoResponse,
};
use serde::Serialize;

use lumina_core::CategoryId;

use crate::db::CatalogRepository;
use crate::db::catalog::ProductFilter;
use crate::error::{AppError, Result};
use crate::models::{Category, Product};
use crate::response::ApiResponse;
use crate::routes::Pagination;
use crate::state::AppState;

const DEFAULT_PER_PAGE: i64 = 20;

#[derive(Debug, Serialize)]
pub struct CategoryProducts {
    pub category: Category,
    pub products: Vec<Product>,
}

/// GET /api/categories
///
/// # Errors
///
/// 500 on database failure.
pub async fn index(State(state): State<AppState>) -> Result<impl IntoResponse> {
    let categories = CatalogRepository::new(state.pool()).list_categories().await?;
    Ok(ApiResponse::data(categories))
}

/// Purchasable products in one category, newest first.
///
/// GET /api/categories/{id}/products
///
/// # Errors
///
/// 404 if the category is missing or inactive.
pub async fn products(
    State(state): State<AppState>,
    Path(id): Path<CategoryId>,
    Query(pagination): Query<Pagination>,
) -> Result<impl IntoResponse> {
    let catalog = CatalogRepository::new(state.pool());
    let category = catalog
        .get_category(id)
        .await?
        .ok_or_else(|| AppError::NotFound("Category not found".to_owned()))?;

    let (limit, offset) = pagination.limit_offset(DEFAULT_PER_PAGE);
    let filter = ProductFilter {
        category_id: Some(category.id),
        ..ProductFilter::default()
    };
    let products = catalog.list_products(&filter, limit, offset).await?;

    Ok(ApiResponse::data(CategoryProducts { category, products }))
}
