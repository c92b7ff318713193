//! External catalog providers
//!
//! One client per metadata source (Hardcover for books, TMDB for movies
//! and TV, IGDB for games), all behind the `CatalogProvider` trait.
//! Searches fan out to the relevant providers concurrently; a failed
//! provider contributes zero results rather than failing the search.

pub mod hardcover;
pub mod igdb;
pub mod tmdb;

use async_trait::async_trait;
use medley_common::types::MediaType;
use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

/// One hit from an external catalog search
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ExternalSearchResult {
    pub external_id: String,
    pub external_source: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    /// `YYYY-MM-DD`, as the providers report it
    pub release_date: Option<String>,
    /// Type-specific fields (author, series name, series position, genres)
    pub extra: serde_json::Value,
}

/// Series description fetched from a provider at add-to-library time
#[derive(Debug, Clone, Default)]
pub struct SeriesInfo {
    pub description: Option<String>,
    pub is_complete: bool,
}

/// Provider failure. Search degrades per provider: an error here becomes
/// an empty contribution, never a failed search.
#[derive(Debug, Error)]
pub enum ProviderError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("API error: {0}")]
    Api(String),

    #[error("Parse error: {0}")]
    Parse(String),

    #[error("Provider not configured: {0}")]
    NotConfigured(String),
}

/// A metadata source the search composes over
#[async_trait]
pub trait CatalogProvider: Send + Sync {
    /// Provider name for logging
    fn name(&self) -> &'static str;

    /// Whether this provider serves the given media type
    fn handles(&self, media_type: MediaType) -> bool;

    /// Search the provider. `filter` narrows multi-type providers (TMDB
    /// serves both movies and TV); None means every type the provider
    /// handles.
    async fn search(
        &self,
        query: &str,
        filter: Option<MediaType>,
    ) -> Result<Vec<ExternalSearchResult>, ProviderError>;
}

/// The configured provider clients. Providers with missing credentials are
/// simply absent; searches then have fewer sources. Typed fields (rather
/// than a flat trait-object list) let the add-to-library flow reach the
/// TMDB collection and Hardcover series lookups directly.
#[derive(Default, Clone)]
pub struct ProviderSet {
    pub hardcover: Option<std::sync::Arc<hardcover::HardcoverClient>>,
    pub tmdb: Option<std::sync::Arc<tmdb::TmdbClient>>,
    pub igdb: Option<std::sync::Arc<igdb::IgdbClient>>,
}

impl ProviderSet {
    pub fn all(&self) -> Vec<&dyn CatalogProvider> {
        let mut providers: Vec<&dyn CatalogProvider> = Vec::new();
        if let Some(p) = &self.hardcover {
            providers.push(p.as_ref());
        }
        if let Some(p) = &self.tmdb {
            providers.push(p.as_ref());
        }
        if let Some(p) = &self.igdb {
            providers.push(p.as_ref());
        }
        providers
    }
}

/// Fan a search out to every provider matching the type filter and merge
/// the results. Failed providers are logged and skipped.
pub async fn search_all(
    providers: &ProviderSet,
    query: &str,
    filter: Option<MediaType>,
) -> Vec<ExternalSearchResult> {
    let selected: Vec<&dyn CatalogProvider> = providers
        .all()
        .into_iter()
        .filter(|p| match filter {
            Some(media_type) => p.handles(media_type),
            None => true,
        })
        .collect();

    let searches = selected.iter().map(|p| p.search(query, filter));
    let outcomes = futures::future::join_all(searches).await;

    let mut results = Vec::new();
    for (provider, outcome) in selected.iter().zip(outcomes) {
        match outcome {
            Ok(hits) => results.extend(hits),
            Err(e) => {
                warn!(provider = provider.name(), error = %e, "Catalog provider search failed");
            }
        }
    }
    results
}
