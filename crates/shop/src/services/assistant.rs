//! AI shopping assistant.
//!
//! Answers a shopper's question with Claude, grounded on the products the
//! search index ranks highest for it.

use std::fmt;

use askama::Template;
use sqlx::PgPool;
use tracing::{debug, instrument};

use crate::claude::{ClaudeClient, ClaudeError};
use crate::db::RepositoryError;
use crate::db::catalog::CatalogRepository;
use crate::models::catalog::Product;
use crate::search::{SearchError, SearchIndex};

/// Products handed to the model as context.
pub const CONTEXT_PRODUCTS: usize = 5;

/// Reply used when no Claude API key is configured.
pub const UNAVAILABLE_REPLY: &str =
    "Our shopping assistant is not available right now. A member of our team will reply soon.";

/// Assistant failures.
#[derive(Debug, thiserror::Error)]
pub enum AssistantError {
    #[error("search failed: {0}")]
    Search(#[from] SearchError),

    #[error("catalog lookup failed: {0}")]
    Catalog(#[from] RepositoryError),

    #[error("{0}")]
    Claude(#[from] ClaudeError),
}

#[derive(Template)]
#[template(path = "assistant/system_prompt.txt")]
struct SystemPromptTemplate;

#[derive(Template)]
#[template(path = "assistant/user_prompt.txt")]
struct UserPromptTemplate<'a> {
    question: &'a str,
    products: Vec<ProductBrief<'a>>,
}

fn render_system_prompt() -> String {
    SystemPromptTemplate
        .render()
        .unwrap_or_else(|_| String::from("You are a helpful shopping assistant."))
}

fn render_user_prompt(question: &str, products: &[Product]) -> String {
    let template = UserPromptTemplate {
        question,
        products: products.iter().map(ProductBrief).collect(),
    };
    template.render().unwrap_or_else(|_| {
        let info: Vec<String> = template.products.iter().map(ToString::to_string).collect();
        format!(
            "Question: {question}\nRelevant products:\n{}\nPlease provide a helpful response to the customer's question.",
            info.join("\n")
        )
    })
}

/// Product facts the model sees.
struct ProductBrief<'a>(&'a Product);

impl fmt::Display for ProductBrief<'_> {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let product = self.0;
        let currency = product.price.currency_code;

        writeln!(f, "Product: {}", product.name)?;
        writeln!(f, "Price: {} {currency}", product.price.amount)?;
        writeln!(f, "Current price: {} {currency}", product.current_price())?;
        match &product.category {
            Some(category) => writeln!(f, "Category: {}", category.name)?,
            None => writeln!(f, "Category: Uncategorized")?,
        }
        match product.discount.as_ref().filter(|d| d.applies()) {
            Some(discount) => write!(f, "Discount: {} ({}% off)", discount.name, discount.percent),
            None => write!(f, "Discount: None"),
        }
    }
}

/// Shopping assistant.
pub struct Assistant<'a> {
    pool: &'a PgPool,
    search: &'a SearchIndex,
    claude: Option<&'a ClaudeClient>,
}

impl<'a> Assistant<'a> {
    #[must_use]
    pub const fn new(
        pool: &'a PgPool,
        search: &'a SearchIndex,
        claude: Option<&'a ClaudeClient>,
    ) -> Self {
        Self {
            pool,
            search,
            claude,
        }
    }

    /// Products most relevant to `question`, best first.
    ///
    /// # Errors
    ///
    /// Returns an error if the search or the catalog lookup fails.
    pub async fn relevant_products(&self, question: &str) -> Result<Vec<Product>, AssistantError> {
        let ids: Vec<_> = self
            .search
            .search(question, CONTEXT_PRODUCTS)?
            .into_iter()
            .map(|hit| hit.product_id)
            .collect();

        if ids.is_empty() {
            return Ok(Vec::new());
        }
        Ok(CatalogRepository::new(self.pool)
            .get_products_by_ids(&ids)
            .await?)
    }

    /// Answer a shopper's question.
    ///
    /// # Errors
    ///
    /// Returns `AssistantError::Claude` if the model call fails.
    #[instrument(skip(self, question))]
    pub async fn answer(&self, question: &str) -> Result<String, AssistantError> {
        let Some(claude) = self.claude else {
            return Ok(UNAVAILABLE_REPLY.to_owned());
        };

        let products = self.relevant_products(question).await?;
        debug!(products = products.len(), "Assistant context assembled");

        let answer = claude
            .complete(render_system_prompt(), render_user_prompt(question, &products))
            .await?;
        Ok(answer)
    }
}

#[cfg(test)]
mod tests {
    use chrono::Utc;
    use rust_decimal::dec;
    use shoppingify_core::{CategoryId, CurrencyCode, Discount, Price, ProductId};

    use super::*;
    use crate::models::catalog::Category;

    fn phone(discount: Option<Discount>) -> Product {
        Product {
            id: ProductId::new(7),
            name: "Galaxy Phone".to_owned(),
            slug: "galaxy-phone".to_owned(),
            description_html: "<p>Phone</p>".to_owned(),
            price: Price::new(dec!(200.00), CurrencyCode::USD),
            discount,
            category: Some(Category {
                id: CategoryId::new(1),
                name: "Mobiles".to_owned(),
                slug: "mobiles".to_owned(),
            }),
            files: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    #[test]
    fn test_system_prompt_renders() {
        let prompt = render_system_prompt();
        assert!(prompt.starts_with("You are a helpful shopping assistant for an e-commerce store."));
        assert!(prompt.contains("mention specific products and their prices"));
    }

    #[test]
    fn test_product_brief_lists_prices_and_discount() {
        let product = phone(Some(Discount {
            name: "Launch".to_owned(),
            percent: dec!(10.00),
            active: true,
        }));
        let brief = ProductBrief(&product).to_string();
        assert!(brief.contains("Product: Galaxy Phone"));
        assert!(brief.contains("Price: 200.00 USD"));
        assert!(brief.contains("Current price: 180.00 USD"));
        assert!(brief.contains("Category: Mobiles"));
        assert!(brief.contains("Discount: Launch (10.00% off)"));
    }

    #[test]
    fn test_inactive_discount_is_not_mentioned() {
        let product = phone(Some(Discount {
            name: "Expired".to_owned(),
            percent: dec!(50.00),
            active: false,
        }));
        let brief = ProductBrief(&product).to_string();
        assert!(brief.contains("Current price: 200.00 USD"));
        assert!(brief.ends_with("Discount: None"));
    }

    #[test]
    fn test_user_prompt_layout() {
        let prompt = render_user_prompt("Any cheap phones?", &[phone(None)]);
        assert!(prompt.starts_with("Question: Any cheap phones?\nRelevant products:\n"));
        assert!(prompt.contains("Product: Galaxy Phone"));
        assert!(prompt.trim_end().ends_with("Please provide a helpful response to the customer's question."));

        let empty = render_user_prompt("Any boats?", &[]);
        assert!(empty.contains("No matching products found."));
    }
}
