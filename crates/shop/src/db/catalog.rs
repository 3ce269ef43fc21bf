//! Catalog repository: products, categories and discounts.

use std::str::FromStr;

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::PgPool;

use shoppingify_core::{
    CategoryId, CurrencyCode, Discount, DiscountId, Price, ProductId, slugify,
};

use super::{RepositoryError, is_unique_violation};
use crate::models::catalog::{Category, Product, ProductFilter};

/// Discount-aware unit price, matching `shoppingify_core::current_price`.
/// Postgres `ROUND(numeric)` rounds half away from zero.
const CURRENT_PRICE_SQL: &str =
    "ROUND(p.price * (1 - COALESCE(CASE WHEN d.active THEN d.percent END, 0) / 100), 2)";

const PRODUCT_SELECT: &str = r"
    SELECT p.id, p.name, p.slug, p.description_html, p.price, p.price_currency,
           p.created_at, p.updated_at,
           c.id AS category_id, c.name AS category_name, c.slug AS category_slug,
           d.name AS discount_name, d.percent AS discount_percent, d.active AS discount_active,
           ARRAY(
               SELECT f.file FROM product_files f
               WHERE f.product_id = p.id
               ORDER BY f.position, f.id
           ) AS files
    FROM products p
    LEFT JOIN categories c ON c.id = p.category_id
    LEFT JOIN discounts d ON d.id = p.discount_id
";

// =============================================================================
// Internal Row Types
// =============================================================================

#[derive(Debug, sqlx::FromRow)]
struct ProductRow {
    id: i32,
    name: String,
    slug: String,
    description_html: String,
    price: Decimal,
    price_currency: String,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    category_id: Option<i32>,
    category_name: Option<String>,
    category_slug: Option<String>,
    discount_name: Option<String>,
    discount_percent: Option<Decimal>,
    discount_active: Option<bool>,
    files: Vec<String>,
}

impl TryFrom<ProductRow> for Product {
    type Error = RepositoryError;

    fn try_from(row: ProductRow) -> Result<Self, Self::Error> {
        let currency = CurrencyCode::from_str(&row.price_currency)
            .map_err(RepositoryError::DataCorruption)?;

        let category = match (row.category_id, row.category_name, row.category_slug) {
            (Some(id), Some(name), Some(slug)) => Some(Category {
                id: CategoryId::new(id),
                name,
                slug,
            }),
            _ => None,
        };

        let discount = match (row.discount_name, row.discount_percent, row.discount_active) {
            (Some(name), Some(percent), Some(active)) => Some(Discount {
                name,
                percent,
                active,
            }),
            _ => None,
        };

        Ok(Self {
            id: ProductId::new(row.id),
            name: row.name,
            slug: row.slug,
            description_html: row.description_html,
            price: Price::new(row.price, currency),
            discount,
            category,
            files: row.files,
            created_at: row.created_at,
            updated_at: row.updated_at,
        })
    }
}

#[derive(Debug, sqlx::FromRow)]
struct CategoryRow {
    id: i32,
    name: String,
    slug: String,
}

impl From<CategoryRow> for Category {
    fn from(row: CategoryRow) -> Self {
        Self {
            id: CategoryId::new(row.id),
            name: row.name,
            slug: row.slug,
        }
    }
}

/// Escape `%`, `_` and `\` for a `LIKE` pattern.
fn like_pattern(term: &str) -> String {
    let mut escaped = String::with_capacity(term.len() + 2);
    escaped.push('%');
    for c in term.chars() {
        if matches!(c, '%' | '_' | '\\') {
            escaped.push('\\');
        }
        escaped.push(c);
    }
    escaped.push('%');
    escaped
}

/// Product fields for seeding and management tools.
#[derive(Debug, Clone)]
pub struct NewProduct {
    pub name: String,
    pub description_html: String,
    pub price: Price,
    pub category_id: Option<CategoryId>,
    pub discount_id: Option<DiscountId>,
    pub files: Vec<String>,
}

// =============================================================================
// Repository
// =============================================================================

/// Repository for catalog reads and seeding writes.
pub struct CatalogRepository<'a> {
    pool: &'a PgPool,
}

impl<'a> CatalogRepository<'a> {
    #[must_use]
    pub const fn new(pool: &'a PgPool) -> Self {
        Self { pool }
    }

    /// List products matching `filter`, ordered by id.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_products(
        &self,
        filter: &ProductFilter,
    ) -> Result<Vec<Product>, RepositoryError> {
        let sql = format!(
            r"
            {PRODUCT_SELECT}
            WHERE ($1::text IS NULL OR c.slug = $1)
              AND ($2::text IS NULL OR p.name ILIKE $2 OR p.description_html ILIKE $2)
              AND ($3::numeric IS NULL OR {CURRENT_PRICE_SQL} >= $3)
              AND ($4::numeric IS NULL OR {CURRENT_PRICE_SQL} <= $4)
              AND ($5::numeric IS NULL OR (d.active AND d.percent >= $5))
              AND ($6::numeric IS NULL OR (d.active AND d.percent <= $6))
            ORDER BY p.id
            "
        );

        let rows = sqlx::query_as::<_, ProductRow>(&sql)
            .bind(filter.category.as_deref())
            .bind(filter.search_term().map(like_pattern))
            .bind(filter.current_price_min)
            .bind(filter.current_price_max)
            .bind(filter.discount_min)
            .bind(filter.discount_max)
            .fetch_all(self.pool)
            .await?;

        rows.into_iter().map(Product::try_from).collect()
    }

    /// Every product, for building the search index.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn all_products(&self) -> Result<Vec<Product>, RepositoryError> {
        self.list_products(&ProductFilter::default()).await
    }

    /// Get a product by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_product_by_slug(&self, slug: &str) -> Result<Option<Product>, RepositoryError> {
        let row = sqlx::query_as::<_, ProductRow>(&format!("{PRODUCT_SELECT} WHERE p.slug = $1"))
            .bind(slug)
            .fetch_optional(self.pool)
            .await?;

        row.map(Product::try_from).transpose()
    }

    /// Get products by id, in the order of `ids`. Unknown ids are skipped.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_products_by_ids(
        &self,
        ids: &[ProductId],
    ) -> Result<Vec<Product>, RepositoryError> {
        let raw: Vec<i32> = ids.iter().map(ProductId::as_i32).collect();
        let rows = sqlx::query_as::<_, ProductRow>(&format!(
            "{PRODUCT_SELECT} WHERE p.id = ANY($1)"
        ))
        .bind(&raw)
        .fetch_all(self.pool)
        .await?;

        let mut products = rows
            .into_iter()
            .map(Product::try_from)
            .collect::<Result<Vec<_>, _>>()?;
        products.sort_by_key(|p| ids.iter().position(|id| *id == p.id));
        Ok(products)
    }

    /// List all categories by name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn list_categories(&self) -> Result<Vec<Category>, RepositoryError> {
        let rows = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug FROM categories ORDER BY name, id",
        )
        .fetch_all(self.pool)
        .await?;

        Ok(rows.into_iter().map(Category::from).collect())
    }

    /// Get a category by slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn get_category_by_slug(
        &self,
        slug: &str,
    ) -> Result<Option<Category>, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            "SELECT id, name, slug FROM categories WHERE slug = $1",
        )
        .bind(slug)
        .fetch_optional(self.pool)
        .await?;

        Ok(row.map(Category::from))
    }

    // =========================================================================
    // Seeding
    // =========================================================================

    /// Insert a category or return the existing one with the same slug.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Database` if the query fails.
    pub async fn upsert_category(&self, name: &str) -> Result<Category, RepositoryError> {
        let row = sqlx::query_as::<_, CategoryRow>(
            r"
            INSERT INTO categories (name, slug)
            VALUES ($1, $2)
            ON CONFLICT (slug) DO UPDATE SET name = EXCLUDED.name, updated_at = NOW()
            RETURNING id, name, slug
            ",
        )
        .bind(name)
        .bind(slugify(name))
        .fetch_one(self.pool)
        .await?;

        Ok(row.into())
    }

    /// Create a discount.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if the percent is out of range.
    pub async fn create_discount(&self, discount: &Discount) -> Result<DiscountId, RepositoryError> {
        Discount::validate_percent(discount.percent).map_err(RepositoryError::Conflict)?;

        let id: i32 = sqlx::query_scalar(
            "INSERT INTO discounts (name, percent, active) VALUES ($1, $2, $3) RETURNING id",
        )
        .bind(&discount.name)
        .bind(discount.percent)
        .bind(discount.active)
        .fetch_one(self.pool)
        .await?;

        Ok(DiscountId::new(id))
    }

    /// Create a product with its image references.
    ///
    /// The slug is derived from the name.
    ///
    /// # Errors
    ///
    /// Returns `RepositoryError::Conflict` if a product with the same slug exists.
    pub async fn create_product(&self, product: &NewProduct) -> Result<ProductId, RepositoryError> {
        let mut tx = self.pool.begin().await?;

        let id: i32 = sqlx::query_scalar(
            r"
            INSERT INTO products
                (name, slug, description_html, price, price_currency, category_id, discount_id)
            VALUES ($1, $2, $3, $4, $5, $6, $7)
            RETURNING id
            ",
        )
        .bind(&product.name)
        .bind(slugify(&product.name))
        .bind(&product.description_html)
        .bind(product.price.amount)
        .bind(product.price.currency_code.as_str())
        .bind(product.category_id)
        .bind(product.discount_id)
        .fetch_one(&mut *tx)
        .await
        .map_err(|e| {
            if is_unique_violation(&e) {
                return RepositoryError::Conflict(format!(
                    "product slug already exists: {}",
                    slugify(&product.name)
                ));
            }
            RepositoryError::Database(e)
        })?;

        for (position, file) in (0_i32..).zip(&product.files) {
            sqlx::query("INSERT INTO product_files (product_id, file, position) VALUES ($1, $2, $3)")
                .bind(id)
                .bind(file)
                .bind(position)
                .execute(&mut *tx)
                .await?;
        }

        tx.commit().await?;
        Ok(ProductId::new(id))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_like_pattern_escapes_wildcards() {
        assert_eq!(like_pattern("shoe"), "%shoe%");
        assert_eq!(like_pattern("50%_off"), "%50\\%\\_off%");
        assert_eq!(like_pattern("a\\b"), "%a\\\\b%");
    }
}
