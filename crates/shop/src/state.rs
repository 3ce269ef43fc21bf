//! Application state shared across handlers.

use std::sync::Arc;

use sqlx::PgPool;

use crate::claude::{ClaudeClient, ClaudeError};
use crate::config::ShopConfig;
use crate::search::{RebuildScheduler, SearchIndex};
use crate::services::chat::ChatHub;
use crate::services::payments::{PaymentError, StripeClient};

/// Error building the application state.
#[derive(Debug, thiserror::Error)]
pub enum StateError {
    #[error("stripe client: {0}")]
    Stripe(#[from] PaymentError),
    #[error("claude client: {0}")]
    Claude(#[from] ClaudeError),
}

/// Application state shared across all handlers.
///
/// Cheaply cloneable via `Arc`.
#[derive(Clone)]
pub struct AppState {
    inner: Arc<AppStateInner>,
}

struct AppStateInner {
    config: ShopConfig,
    pool: PgPool,
    search: SearchIndex,
    rebuilds: RebuildScheduler,
    chat_hub: ChatHub,
    stripe: Option<StripeClient>,
    claude: Option<ClaudeClient>,
}

impl AppState {
    /// Create a new application state.
    ///
    /// Stripe and Claude clients are only built when configured.
    ///
    /// # Errors
    ///
    /// Returns an error if a configured client cannot be built.
    pub fn new(config: ShopConfig, pool: PgPool) -> Result<Self, StateError> {
        let stripe = config.stripe.as_ref().map(StripeClient::new).transpose()?;
        let claude = config.claude.as_ref().map(ClaudeClient::new).transpose()?;
        let search = SearchIndex::new();
        let rebuilds = RebuildScheduler::new(pool.clone(), search.clone(), &config.search);

        Ok(Self {
            inner: Arc::new(AppStateInner {
                config,
                pool,
                search,
                rebuilds,
                chat_hub: ChatHub::new(),
                stripe,
                claude,
            }),
        })
    }

    #[must_use]
    pub fn config(&self) -> &ShopConfig {
        &self.inner.config
    }

    #[must_use]
    pub fn pool(&self) -> &PgPool {
        &self.inner.pool
    }

    /// Product search index.
    #[must_use]
    pub fn search(&self) -> &SearchIndex {
        &self.inner.search
    }

    /// Background index rebuild scheduler.
    #[must_use]
    pub fn rebuilds(&self) -> &RebuildScheduler {
        &self.inner.rebuilds
    }

    /// Live chat rooms.
    #[must_use]
    pub fn chat_hub(&self) -> &ChatHub {
        &self.inner.chat_hub
    }

    /// Stripe client, when `STRIPE_SECRET_KEY` is set.
    #[must_use]
    pub fn stripe(&self) -> Option<&StripeClient> {
        self.inner.stripe.as_ref()
    }

    /// Claude client, when `ANTHROPIC_API_KEY` is set.
    #[must_use]
    pub fn claude(&self) -> Option<&ClaudeClient> {
        self.inner.claude.as_ref()
    }

    /// Public URL for a stored product image reference.
    #[must_use]
    pub fn media_url(&self, file: &str) -> String {
        crate::models::catalog::media_url(self.inner.config.cloudinary_cloud_name.as_deref(), file)
    }
}
