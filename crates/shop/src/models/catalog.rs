//! Catalog domain types.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::Deserialize;

use shoppingify_core::{CategoryId, Discount, Price, ProductId, current_price};

/// A product category.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Category {
    pub id: CategoryId,
    pub name: String,
    pub slug: String,
}

/// A product with its category, discount and image references.
#[derive(Debug, Clone)]
pub struct Product {
    pub id: ProductId,
    pub name: String,
    pub slug: String,
    pub description_html: String,
    pub price: Price,
    pub discount: Option<Discount>,
    pub category: Option<Category>,
    /// Stored image references (Cloudinary public ids or absolute URLs).
    pub files: Vec<String>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Product {
    /// Unit price with the active discount applied.
    #[must_use]
    pub fn current_price(&self) -> Decimal {
        current_price(self.price.amount, self.discount.as_ref())
    }
}

/// Query filters for `GET /api/products`.
#[derive(Debug, Clone, Default, Deserialize)]
pub struct ProductFilter {
    /// Category slug.
    pub category: Option<String>,
    /// Case-insensitive match on name or description.
    pub search: Option<String>,
    pub current_price_min: Option<Decimal>,
    pub current_price_max: Option<Decimal>,
    /// Only products with an active discount of at least this percent.
    pub discount_min: Option<Decimal>,
    /// Only products with an active discount of at most this percent.
    pub discount_max: Option<Decimal>,
}

impl ProductFilter {
    /// Search text with surrounding whitespace removed, `None` when blank.
    #[must_use]
    pub fn search_term(&self) -> Option<&str> {
        self.search.as_deref().map(str::trim).filter(|s| !s.is_empty())
    }
}

/// Public URL for a stored image reference.
///
/// Absolute URLs pass through unchanged. Anything else is treated as a
/// Cloudinary public id when a cloud name is configured.
#[must_use]
pub fn media_url(cloud_name: Option<&str>, file: &str) -> String {
    if file.starts_with("http://") || file.starts_with("https://") {
        return file.to_owned();
    }
    match cloud_name {
        Some(cloud) => format!(
            "https://res.cloudinary.com/{cloud}/image/upload/{}",
            file.trim_start_matches('/')
        ),
        None => format!("/media/{}", file.trim_start_matches('/')),
    }
}

#[cfg(test)]
mod tests {
    use rust_decimal::dec;
    use shoppingify_core::CurrencyCode;

    use super::*;

    #[test]
    fn test_media_url() {
        assert_eq!(
            media_url(Some("demo"), "products/shoe.jpg"),
            "https://res.cloudinary.com/demo/image/upload/products/shoe.jpg"
        );
        assert_eq!(
            media_url(Some("demo"), "https://cdn.dummyjson.com/a.png"),
            "https://cdn.dummyjson.com/a.png"
        );
        assert_eq!(media_url(None, "/products/shoe.jpg"), "/media/products/shoe.jpg");
    }

    #[test]
    fn test_product_current_price() {
        let product = Product {
            id: ProductId::new(1),
            name: "Lamp".to_owned(),
            slug: "lamp".to_owned(),
            description_html: String::new(),
            price: Price::new(dec!(40.00), CurrencyCode::USD),
            discount: Some(Discount {
                name: "Spring".to_owned(),
                percent: dec!(12.5),
                active: true,
            }),
            category: None,
            files: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        };
        assert_eq!(product.current_price(), dec!(35.00));
    }

    #[test]
    fn test_blank_search_is_ignored() {
        let filter = ProductFilter {
            search: Some("   ".to_owned()),
            ..ProductFilter::default()
        };
        assert_eq!(filter.search_term(), None);
    }
}
