//! Catalog seeding from dummyjson-shaped product listings.
//!
//! # Usage
//!
//! ```bash
//! shoppingify-cli seed products --file products.json
//! shoppingify-cli seed products --from-dummyjson --limit 50
//! ```
//!
//! Categories are upserted by slug and discounts are shared between products
//! with the same percentage. Products whose slug already exists are skipped,
//! so seeding twice is safe.

use std::collections::HashMap;
use std::path::Path;

use rust_decimal::Decimal;
use serde::Deserialize;
use thiserror::Error;

use shoppingify_core::{CurrencyCode, Discount, DiscountId, Price};
use shoppingify_shop::db::catalog::NewProduct;
use shoppingify_shop::db::{CatalogRepository, RepositoryError};

use super::{CommandError, connect};

const DUMMYJSON_URL: &str = "https://dummyjson.com/products";

/// Where products come from.
#[derive(Debug, Clone)]
pub enum Source {
    File(String),
    DummyJson { limit: u32 },
}

/// Errors that can occur while seeding.
#[derive(Debug, Error)]
pub enum SeedError {
    #[error(transparent)]
    Connect(#[from] CommandError),

    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        source: std::io::Error,
    },

    #[error("Failed to fetch products: {0}")]
    Fetch(#[from] reqwest::Error),

    #[error("Invalid product listing: {0}")]
    Parse(#[from] serde_json::Error),

    #[error("Invalid price for {title}: {price}")]
    Price { title: String, price: f64 },

    #[error("Database error: {0}")]
    Repository(#[from] RepositoryError),
}

/// Listing envelope.
#[derive(Debug, Deserialize)]
struct Listing {
    products: Vec<SeedProduct>,
}

/// One product as dummyjson serves it.
#[derive(Debug, Deserialize)]
#[serde(rename_all = "camelCase")]
struct SeedProduct {
    title: String,
    #[serde(default)]
    description: String,
    category: Option<String>,
    #[serde(default)]
    images: Vec<String>,
    price: f64,
    #[serde(default)]
    discount_percentage: Option<f64>,
}

impl SeedProduct {
    fn price(&self) -> Result<Price, SeedError> {
        let amount = Decimal::try_from(self.price)
            .ok()
            .filter(|amount| !amount.is_sign_negative())
            .ok_or_else(|| SeedError::Price {
                title: self.title.clone(),
                price: self.price,
            })?;
        Ok(Price::new(amount.round_dp(2), CurrencyCode::USD))
    }

    /// Discount percentage rounded to two places, dropped when zero or
    /// outside the range a discount can hold.
    fn discount_percent(&self) -> Option<Decimal> {
        let percent = Decimal::try_from(self.discount_percentage?).ok()?.round_dp(2);
        Discount::validate_percent(percent).ok()?;
        (!percent.is_zero()).then_some(percent)
    }

    /// Category display name with the first letter capitalized.
    fn category_name(&self) -> Option<String> {
        let raw = self.category.as_deref()?.trim().replace('-', " ");
        let mut chars = raw.chars();
        let first = chars.next()?;
        Some(first.to_uppercase().chain(chars).collect())
    }

    fn description_html(&self) -> String {
        if self.description.trim().is_empty() {
            return String::new();
        }
        format!("<p>{}</p>", escape_html(self.description.trim()))
    }
}

fn escape_html(text: &str) -> String {
    let mut out = String::with_capacity(text.len());
    for c in text.chars() {
        match c {
            '&' => out.push_str("&amp;"),
            '<' => out.push_str("&lt;"),
            '>' => out.push_str("&gt;"),
            '"' => out.push_str("&quot;"),
            '\'' => out.push_str("&#39;"),
            _ => out.push(c),
        }
    }
    out
}

fn discount_name(percent: Decimal) -> String {
    format!("{} %", percent.normalize())
}

async fn load(source: &Source) -> Result<Listing, SeedError> {
    match source {
        Source::File(path) => {
            let raw = tokio::fs::read_to_string(Path::new(path))
                .await
                .map_err(|source| SeedError::Read {
                    path: path.clone(),
                    source,
                })?;
            Ok(serde_json::from_str(&raw)?)
        }
        Source::DummyJson { limit } => {
            tracing::info!(limit, "Fetching products from dummyjson.com");
            let listing = reqwest::Client::new()
                .get(DUMMYJSON_URL)
                .query(&[("limit", limit)])
                .send()
                .await?
                .error_for_status()?
                .json()
                .await?;
            Ok(listing)
        }
    }
}

/// Import products from `source`.
///
/// # Errors
///
/// Returns an error if the listing cannot be loaded or a database write
/// fails for any reason other than a duplicate product.
pub async fn products(source: Source) -> Result<(), SeedError> {
    let listing = load(&source).await?;
    let pool = connect().await?;
    let catalog = CatalogRepository::new(&pool);

    let mut discounts: HashMap<Decimal, DiscountId> = HashMap::new();
    let mut created = 0_usize;
    let mut skipped = 0_usize;

    for product in &listing.products {
        let category_id = match product.category_name() {
            Some(name) => Some(catalog.upsert_category(&name).await?.id),
            None => None,
        };

        let discount_id = match product.discount_percent() {
            Some(percent) => {
                if let Some(id) = discounts.get(&percent) {
                    Some(*id)
                } else {
                    let id = catalog
                        .create_discount(&Discount {
                            name: discount_name(percent),
                            percent,
                            active: true,
                        })
                        .await?;
                    discounts.insert(percent, id);
                    Some(id)
                }
            }
            None => None,
        };

        let new_product = NewProduct {
            name: product.title.trim().to_owned(),
            description_html: product.description_html(),
            price: product.price()?,
            category_id,
            discount_id,
            files: product.images.clone(),
        };

        match catalog.create_product(&new_product).await {
            Ok(id) => {
                tracing::debug!(%id, name = %new_product.name, "Product created");
                created += 1;
            }
            Err(RepositoryError::Conflict(msg)) => {
                tracing::warn!(name = %new_product.name, "Skipping: {msg}");
                skipped += 1;
            }
            Err(e) => return Err(e.into()),
        }
    }

    tracing::info!(
        created,
        skipped,
        discounts = discounts.len(),
        "Catalog seeding complete"
    );
    Ok(())
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use rust_decimal::dec;

    use super::*;

    const SAMPLE: &str = r#"{
        "products": [
            {
                "id": 1,
                "title": "Essence Mascara Lash Princess",
                "description": "Volumizing <and> lengthening",
                "category": "beauty",
                "price": 9.99,
                "discountPercentage": 7.17,
                "images": ["https://cdn.dummyjson.com/1.png"]
            },
            {
                "id": 2,
                "title": "Desk Lamp",
                "category": "home-decoration",
                "price": 19.5
            }
        ],
        "total": 194,
        "skip": 0,
        "limit": 2
    }"#;

    fn sample() -> Vec<SeedProduct> {
        serde_json::from_str::<Listing>(SAMPLE).unwrap().products
    }

    #[test]
    fn test_parses_dummyjson_listing() {
        let products = sample();
        assert_eq!(products.len(), 2);
        assert_eq!(products[0].images.len(), 1);
        assert!(products[1].images.is_empty());
        assert!(products[1].discount_percentage.is_none());
    }

    #[test]
    fn test_price_is_rounded_usd() {
        let products = sample();
        let price = products[0].price().unwrap();
        assert_eq!(price.amount, dec!(9.99));
        assert_eq!(price.currency_code, CurrencyCode::USD);
        assert_eq!(products[1].price().unwrap().amount, dec!(19.50));
    }

    #[test]
    fn test_negative_price_is_rejected() {
        let mut product = sample().remove(1);
        product.price = -1.0;
        assert!(matches!(product.price(), Err(SeedError::Price { .. })));
    }

    #[test]
    fn test_discount_percent() {
        let mut products = sample();
        assert_eq!(products[0].discount_percent(), Some(dec!(7.17)));
        assert_eq!(products[1].discount_percent(), None);

        products[1].discount_percentage = Some(0.0);
        assert_eq!(products[1].discount_percent(), None);
        products[1].discount_percentage = Some(150.0);
        assert_eq!(products[1].discount_percent(), None);
    }

    #[test]
    fn test_discount_name() {
        assert_eq!(discount_name(dec!(7.17)), "7.17 %");
        assert_eq!(discount_name(dec!(10.00)), "10 %");
    }

    #[test]
    fn test_category_name_is_capitalized() {
        let products = sample();
        assert_eq!(products[0].category_name().as_deref(), Some("Beauty"));
        assert_eq!(
            products[1].category_name().as_deref(),
            Some("Home decoration")
        );
    }

    #[test]
    fn test_description_is_escaped() {
        let products = sample();
        assert_eq!(
            products[0].description_html(),
            "<p>Volumizing &lt;and&gt; lengthening</p>"
        );
        assert_eq!(products[1].description_html(), "");
    }
}
