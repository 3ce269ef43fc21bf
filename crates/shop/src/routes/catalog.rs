//! Catalog route handlers: products and categories.

use axum::{
    Json,
    extract::{Path, Query, State},
};

use crate::db::CatalogRepository;
use crate::error::{AppError, Result};
use crate::models::ProductFilter;
use crate::routes::payloads::{CategoryView, ProductView};
use crate::state::AppState;

/// List products.
///
/// GET /api/products
pub async fn list_products(
    State(state): State<AppState>,
    Query(filter): Query<ProductFilter>,
) -> Result<Json<Vec<ProductView>>> {
    let products = CatalogRepository::new(state.pool())
        .list_products(&filter)
        .await?;

    Ok(Json(
        products
            .iter()
            .map(|p| ProductView::new(&state, p))
            .collect(),
    ))
}

/// Product detail.
///
/// GET /api/products/{slug}
pub async fn show_product(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<ProductView>> {
    let product = CatalogRepository::new(state.pool())
        .get_product_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("product {slug}")))?;

    Ok(Json(ProductView::new(&state, &product)))
}

/// List categories.
///
/// GET /api/categories
pub async fn list_categories(State(state): State<AppState>) -> Result<Json<Vec<CategoryView>>> {
    let categories = CatalogRepository::new(state.pool()).list_categories().await?;
    Ok(Json(categories.iter().map(CategoryView::new).collect()))
}

/// Category detail with its products.
///
/// GET /api/categories/{slug}
pub async fn show_category(
    State(state): State<AppState>,
    Path(slug): Path<String>,
) -> Result<Json<CategoryView>> {
    let catalog = CatalogRepository::new(state.pool());
    let category = catalog
        .get_category_by_slug(&slug)
        .await?
        .ok_or_else(|| AppError::NotFound(format!("category {slug}")))?;

    let filter = ProductFilter {
        category: Some(category.slug.clone()),
        ..ProductFilter::default()
    };
    let products = catalog.list_products(&filter).await?;

    Ok(Json(
        CategoryView::new(&category).with_products(&state, &products),
    ))
}
