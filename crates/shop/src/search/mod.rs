//! Product search using Tantivy.
//!
//! The index lives in memory and covers product name, description text,
//! category and slug. It starts empty; [`RebuildScheduler`] builds it in the
//! background and swaps each new build in atomically.

mod indexer;
mod scheduler;

use std::sync::{Arc, RwLock};

use tantivy::collector::TopDocs;
use tantivy::query::{BooleanQuery, FuzzyTermQuery, Occur, Query, TermQuery};
use tantivy::schema::{
    Field, INDEXED, IndexRecordOption, STORED, Schema, TextFieldIndexing, TextOptions, Value,
};
use tantivy::tokenizer::TokenStream;
use tantivy::{Index, IndexReader, ReloadPolicy, Term};
use tracing::instrument;

use shoppingify_core::ProductId;

use crate::db::RepositoryError;

pub use indexer::{build_index, rebuild, strip_html};
pub use scheduler::{LastRebuild, REBUILD_CHANNEL, RebuildScheduler};

/// Name of the stemming analyzer registered on every index.
pub(crate) const TOKENIZER: &str = "en_stem";

/// Terms shorter than this are matched exactly, never fuzzily.
const FUZZY_MIN_LEN: usize = 3;

/// A product matched by a search.
#[derive(Debug, Clone, PartialEq)]
pub struct SearchHit {
    pub product_id: ProductId,
    pub slug: String,
    pub score: f32,
}

/// Schema fields for the search index.
#[derive(Debug, Clone, Copy)]
pub struct SearchFields {
    // Stored
    pub id: Field,
    pub slug: Field,
    // Indexed only
    pub name_text: Field,
    pub description_text: Field,
    pub category_text: Field,
    pub slug_text: Field,
}

/// Inner index state (once built).
struct ReadyIndex {
    index: Index,
    reader: IndexReader,
    fields: SearchFields,
}

/// The search index.
///
/// Starts empty and is populated asynchronously by a background task.
#[derive(Clone)]
pub struct SearchIndex {
    inner: Arc<RwLock<Option<ReadyIndex>>>,
}

impl Default for SearchIndex {
    fn default() -> Self {
        Self::new()
    }
}

impl SearchIndex {
    /// Create a new empty search index.
    #[must_use]
    pub fn new() -> Self {
        Self {
            inner: Arc::new(RwLock::new(None)),
        }
    }

    /// Check if the index is ready.
    #[must_use]
    pub fn is_ready(&self) -> bool {
        self.inner
            .read()
            .map(|guard| guard.is_some())
            .unwrap_or(false)
    }

    /// Number of indexed products, 0 while not ready.
    #[must_use]
    pub fn num_docs(&self) -> u64 {
        self.inner
            .read()
            .ok()
            .and_then(|guard| guard.as_ref().map(|r| r.reader.searcher().num_docs()))
            .unwrap_or(0)
    }

    /// Swap in a freshly built index.
    pub(crate) fn set_ready(&self, index: Index, fields: SearchFields) -> Result<(), SearchError> {
        let reader = index
            .reader_builder()
            .reload_policy(ReloadPolicy::Manual)
            .try_into()
            .map_err(|e| SearchError::Index(format!("Failed to create reader: {e}")))?;

        let ready = ReadyIndex {
            index,
            reader,
            fields,
        };

        *self
            .inner
            .write()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))? = Some(ready);

        Ok(())
    }

    /// Build the schema for the search index.
    pub(crate) fn build_schema() -> (Schema, SearchFields) {
        let mut schema_builder = Schema::builder();

        let id = schema_builder.add_i64_field("id", INDEXED | STORED);
        let slug = schema_builder.add_text_field("slug", STORED);

        let text_indexing = TextFieldIndexing::default()
            .set_tokenizer(TOKENIZER)
            .set_index_option(IndexRecordOption::WithFreqsAndPositions);
        let text_options = TextOptions::default().set_indexing_options(text_indexing);

        let name_text = schema_builder.add_text_field("name_text", text_options.clone());
        let description_text =
            schema_builder.add_text_field("description_text", text_options.clone());
        let category_text = schema_builder.add_text_field("category_text", text_options.clone());
        let slug_text = schema_builder.add_text_field("slug_text", text_options);

        let schema = schema_builder.build();
        let fields = SearchFields {
            id,
            slug,
            name_text,
            description_text,
            category_text,
            slug_text,
        };

        (schema, fields)
    }

    /// Products best matching `query_str`, most relevant first.
    ///
    /// Returns no hits while the index is not ready or the query is blank.
    ///
    /// # Errors
    ///
    /// Returns an error if the index lock is poisoned or the search fails.
    #[instrument(skip(self))]
    // The read guard must outlive `ready`, which borrows from it.
    #[allow(clippy::significant_drop_tightening)]
    pub fn search(&self, query_str: &str, limit: usize) -> Result<Vec<SearchHit>, SearchError> {
        let guard = self
            .inner
            .read()
            .map_err(|_| SearchError::Index("Lock poisoned".to_string()))?;

        let Some(ready) = guard.as_ref() else {
            return Ok(Vec::new());
        };

        let terms = analyze(&ready.index, ready.fields.name_text, query_str)?;
        if terms.is_empty() || limit == 0 {
            return Ok(Vec::new());
        }

        let query = build_query(&ready.fields, &terms);
        let searcher = ready.reader.searcher();
        let top_docs = searcher
            .search(&query, &TopDocs::with_limit(limit))
            .map_err(|e| SearchError::Query(format!("Search failed: {e}")))?;

        let mut hits = Vec::with_capacity(top_docs.len());
        for (score, address) in top_docs {
            let doc = searcher
                .doc::<tantivy::TantivyDocument>(address)
                .map_err(|e| SearchError::Query(format!("Failed to retrieve doc: {e}")))?;

            let id = doc
                .get_first(ready.fields.id)
                .and_then(|v| v.as_i64())
                .and_then(|v| i32::try_from(v).ok())
                .ok_or_else(|| SearchError::Index("Document without id".to_string()))?;
            let slug = doc
                .get_first(ready.fields.slug)
                .and_then(|v| v.as_str())
                .unwrap_or_default()
                .to_owned();

            hits.push(SearchHit {
                product_id: ProductId::new(id),
                slug,
                score,
            });
        }

        Ok(hits)
    }
}

/// Run `text` through the analyzer of `field`, yielding index terms.
fn analyze(index: &Index, field: Field, text: &str) -> Result<Vec<String>, SearchError> {
    let mut analyzer = index
        .tokenizer_for_field(field)
        .map_err(|e| SearchError::Index(format!("Missing analyzer: {e}")))?;

    let mut terms: Vec<String> = Vec::new();
    let mut stream = analyzer.token_stream(text);
    stream.process(&mut |token| {
        if !terms.contains(&token.text) {
            terms.push(token.text.clone());
        }
    });
    Ok(terms)
}

/// Any-term match across the text fields. Name and description tolerate
/// one typo on longer terms.
fn build_query(fields: &SearchFields, terms: &[String]) -> BooleanQuery {
    let mut subqueries: Vec<(Occur, Box<dyn Query>)> = Vec::new();

    for term in terms {
        let name_term = Term::from_field_text(fields.name_text, term);
        subqueries.push((
            Occur::Should,
            Box::new(TermQuery::new(name_term.clone(), IndexRecordOption::WithFreqs)),
        ));

        let desc_term = Term::from_field_text(fields.description_text, term);
        subqueries.push((
            Occur::Should,
            Box::new(TermQuery::new(desc_term.clone(), IndexRecordOption::WithFreqs)),
        ));

        if term.chars().count() >= FUZZY_MIN_LEN {
            subqueries.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new(name_term, 1, true)),
            ));
            subqueries.push((
                Occur::Should,
                Box::new(FuzzyTermQuery::new(desc_term, 1, true)),
            ));
        }

        for field in [fields.category_text, fields.slug_text] {
            subqueries.push((
                Occur::Should,
                Box::new(TermQuery::new(
                    Term::from_field_text(field, term),
                    IndexRecordOption::Basic,
                )),
            ));
        }
    }

    BooleanQuery::new(subqueries)
}

/// Search errors.
#[derive(Debug, thiserror::Error)]
pub enum SearchError {
    #[error("Index error: {0}")]
    Index(String),
    #[error("Query error: {0}")]
    Query(String),
    #[error("Build error: {0}")]
    Build(String),
    #[error("Catalog error: {0}")]
    Catalog(#[from] RepositoryError),
}

#[cfg(test)]
#[allow(clippy::unwrap_used)]
mod tests {
    use chrono::Utc;
    use rust_decimal::dec;
    use shoppingify_core::{CategoryId, CurrencyCode, Price};

    use super::*;
    use crate::models::catalog::{Category, Product};

    fn product(id: i32, name: &str, description: &str, category: &str) -> Product {
        Product {
            id: ProductId::new(id),
            name: name.to_owned(),
            slug: shoppingify_core::slugify(name),
            description_html: description.to_owned(),
            price: Price::new(dec!(10.00), CurrencyCode::USD),
            discount: None,
            category: Some(Category {
                id: CategoryId::new(1),
                name: category.to_owned(),
                slug: shoppingify_core::slugify(category),
            }),
            files: vec![],
            created_at: Utc::now(),
            updated_at: Utc::now(),
        }
    }

    fn ready_index() -> SearchIndex {
        let products = vec![
            product(1, "Galaxy Phone", "<p>A <b>smartphone</b> with a big screen</p>", "Mobiles"),
            product(2, "Running Shoes", "<p>Light shoes for jogging</p>", "Footwear"),
            product(3, "Desk Lamp", "<p>Warm light for reading</p>", "Home"),
        ];
        let index = SearchIndex::new();
        let (built, fields) = build_index(&products).unwrap();
        index.set_ready(built, fields).unwrap();
        index
    }

    #[test]
    fn test_empty_index_returns_nothing() {
        let index = SearchIndex::new();
        assert!(!index.is_ready());
        assert!(index.search("phone", 5).unwrap().is_empty());
    }

    #[test]
    fn test_search_by_name() {
        let index = ready_index();
        assert!(index.is_ready());
        assert_eq!(index.num_docs(), 3);

        let hits = index.search("phone", 5).unwrap();
        assert_eq!(hits.first().map(|h| h.product_id), Some(ProductId::new(1)));
        assert_eq!(hits.first().map(|h| h.slug.as_str()), Some("galaxy-phone"));
    }

    #[test]
    fn test_search_matches_stemmed_description_and_category() {
        let index = ready_index();

        let hits = index.search("smartphones", 5).unwrap();
        assert_eq!(hits.first().map(|h| h.product_id), Some(ProductId::new(1)));

        let hits = index.search("footwear", 5).unwrap();
        assert_eq!(hits.first().map(|h| h.product_id), Some(ProductId::new(2)));
    }

    #[test]
    fn test_search_tolerates_typo() {
        let index = ready_index();
        let hits = index.search("lamq", 5).unwrap();
        assert_eq!(hits.first().map(|h| h.product_id), Some(ProductId::new(3)));
    }

    #[test]
    fn test_search_respects_limit_and_blank_query() {
        let index = ready_index();
        assert_eq!(index.search("light", 1).unwrap().len(), 1);
        assert!(index.search("   ", 5).unwrap().is_empty());
    }
}
