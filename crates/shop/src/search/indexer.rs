//! Search index builder.
//!
//! Builds a fresh in-memory index from the catalog and swaps it into the
//! shared [`SearchIndex`].

use sqlx::PgPool;
use tantivy::tokenizer::{
    Language, LowerCaser, RemoveLongFilter, SimpleTokenizer, Stemmer, TextAnalyzer,
};
use tantivy::{Index, IndexWriter};
use tracing::{info, instrument, warn};

use crate::db::catalog::CatalogRepository;
use crate::models::catalog::Product;

use super::{SearchError, SearchFields, SearchIndex, TOKENIZER};

/// Writer heap budget.
const WRITER_MEMORY_BYTES: usize = 50_000_000;

/// Load every product and swap a freshly built index in.
///
/// Returns the number of indexed products.
///
/// # Errors
///
/// Returns `SearchError::Catalog` if products cannot be loaded and
/// `SearchError::Build` if indexing fails. The previous index keeps serving
/// in either case.
#[instrument(skip_all)]
pub async fn rebuild(pool: &PgPool, search_index: &SearchIndex) -> Result<u64, SearchError> {
    let products = CatalogRepository::new(pool).all_products().await?;
    info!(count = products.len(), "Building search index");

    let (index, fields) = tokio::task::spawn_blocking(move || build_index(&products))
        .await
        .map_err(|e| SearchError::Build(format!("Index task failed: {e}")))??;

    search_index.set_ready(index, fields)?;
    let docs = search_index.num_docs();
    info!(docs, "Search index is now ready and serving requests");
    Ok(docs)
}

/// Build an in-memory index over `products`.
///
/// # Errors
///
/// Returns `SearchError::Build` if the writer cannot be created or the
/// commit fails.
pub fn build_index(products: &[Product]) -> Result<(Index, SearchFields), SearchError> {
    let (schema, fields) = SearchIndex::build_schema();
    let index = Index::create_in_ram(schema);

    index.tokenizers().register(
        TOKENIZER,
        TextAnalyzer::builder(SimpleTokenizer::default())
            .filter(RemoveLongFilter::limit(40))
            .filter(LowerCaser)
            .filter(Stemmer::new(Language::English))
            .build(),
    );

    let mut writer: IndexWriter = index
        .writer(WRITER_MEMORY_BYTES)
        .map_err(|e| SearchError::Build(format!("Failed to create writer: {e}")))?;

    for product in products {
        let category = product
            .category
            .as_ref()
            .map_or(String::new(), |c| c.name.clone());

        let doc = tantivy::doc!(
            fields.id => i64::from(product.id.as_i32()),
            fields.slug => product.slug.clone(),
            fields.name_text => product.name.clone(),
            fields.description_text => strip_html(&product.description_html),
            fields.category_text => category,
            fields.slug_text => product.slug.replace('-', " ")
        );

        if let Err(e) = writer.add_document(doc) {
            warn!(error = %e, slug = %product.slug, "Failed to index product");
        }
    }

    writer
        .commit()
        .map_err(|e| SearchError::Build(format!("Failed to commit index: {e}")))?;

    Ok((index, fields))
}

/// Strip tags from an HTML fragment and decode common entities.
#[must_use]
pub fn strip_html(html: &str) -> String {
    let mut result = String::with_capacity(html.len());
    let mut in_tag = false;

    for c in html.chars() {
        match c {
            '<' => {
                in_tag = true;
                result.push(' ');
            }
            '>' => in_tag = false,
            _ if !in_tag => result.push(c),
            _ => {}
        }
    }

    let decoded = result
        .replace("&nbsp;", " ")
        .replace("&lt;", "<")
        .replace("&gt;", ">")
        .replace("&quot;", "\"")
        .replace("&#39;", "'")
        .replace("&amp;", "&");

    decoded.split_whitespace().collect::<Vec<_>>().join(" ")
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_strip_html() {
        assert_eq!(
            strip_html("<p>Fast&nbsp;<b>charging</b></p><p>5G &amp; Wi-Fi</p>"),
            "Fast charging 5G & Wi-Fi"
        );
        assert_eq!(strip_html("plain text"), "plain text");
        assert_eq!(strip_html(""), "");
    }

    #[test]
    fn test_strip_html_decodes_amp_last() {
        assert_eq!(strip_html("&amp;lt;"), "&lt;");
    }
}
