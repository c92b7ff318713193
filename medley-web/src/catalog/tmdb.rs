//! TMDB client (movies and TV)
//!
//! Queries The Movie Database search endpoints, and the movie details
//! endpoint for collection (franchise) lookup at add-to-library time;
//! `belongs_to_collection` is only present on details, not on search.
//!
//! API reference: https://developer.themoviedb.org/reference

use async_trait::async_trait;
use medley_common::types::MediaType;
use reqwest::Client;
use serde::Deserialize;
use std::time::Duration;
use tracing::debug;

use super::{CatalogProvider, ExternalSearchResult, ProviderError};

/// TMDB API base URL
const TMDB_API_URL: &str = "https://api.themoviedb.org/3";

/// Image base for poster paths
const TMDB_IMAGE_URL: &str = "https://image.tmdb.org/t/p/w500";

/// Default timeout for TMDB API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Cap per search, matching what the UI shows
const MAX_RESULTS: usize = 10;

pub struct TmdbClient {
    http_client: Client,
    api_key: String,
}

impl TmdbClient {
    pub fn new(api_key: String) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_key,
        }
    }

    async fn get_json<T: serde::de::DeserializeOwned>(
        &self,
        path: &str,
        query: &[(&str, &str)],
    ) -> Result<T, ProviderError> {
        let url = format!("{}{}", TMDB_API_URL, path);
        let response = self
            .http_client
            .get(&url)
            .query(&[("api_key", self.api_key.as_str()), ("language", "en-US")])
            .query(query)
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("TMDB request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "TMDB returned {}",
                response.status()
            )));
        }

        response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse TMDB response: {}", e)))
    }

    async fn search_movies(&self, query: &str) -> Result<Vec<ExternalSearchResult>, ProviderError> {
        let data: TmdbResponse<TmdbMovie> = self
            .get_json("/search/movie", &[("query", query), ("page", "1")])
            .await?;

        Ok(data
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|movie| ExternalSearchResult {
                external_id: movie.id.to_string(),
                external_source: "tmdb".to_string(),
                media_type: MediaType::Movie,
                title: movie.title,
                description: movie.overview.filter(|s| !s.is_empty()),
                cover_image_url: movie
                    .poster_path
                    .map(|p| format!("{}{}", TMDB_IMAGE_URL, p)),
                release_date: movie.release_date.filter(|s| !s.is_empty()),
                extra: serde_json::json!({}),
            })
            .collect())
    }

    async fn search_tv(&self, query: &str) -> Result<Vec<ExternalSearchResult>, ProviderError> {
        let data: TmdbResponse<TmdbTvShow> = self
            .get_json("/search/tv", &[("query", query), ("page", "1")])
            .await?;

        Ok(data
            .results
            .into_iter()
            .take(MAX_RESULTS)
            .map(|show| ExternalSearchResult {
                external_id: show.id.to_string(),
                external_source: "tmdb".to_string(),
                media_type: MediaType::TvShow,
                title: show.name,
                description: show.overview.filter(|s| !s.is_empty()),
                cover_image_url: show
                    .poster_path
                    .map(|p| format!("{}{}", TMDB_IMAGE_URL, p)),
                release_date: show.first_air_date.filter(|s| !s.is_empty()),
                extra: serde_json::json!({}),
            })
            .collect())
    }

    /// Collection (franchise) name of a movie, from the details endpoint
    pub async fn movie_collection(&self, external_id: &str) -> Result<Option<String>, ProviderError> {
        debug!(movie_id = external_id, "Fetching TMDB movie collection");
        let details: TmdbMovieDetails = self
            .get_json(&format!("/movie/{}", external_id), &[])
            .await?;

        Ok(details
            .belongs_to_collection
            .map(|c| strip_collection_suffix(&c.name)))
    }
}

/// TMDB names collections "X Collection"; the series entity stores just X
fn strip_collection_suffix(name: &str) -> String {
    name.strip_suffix(" Collection").unwrap_or(name).to_string()
}

#[async_trait]
impl CatalogProvider for TmdbClient {
    fn name(&self) -> &'static str {
        "TMDB"
    }

    fn handles(&self, media_type: MediaType) -> bool {
        matches!(media_type, MediaType::Movie | MediaType::TvShow)
    }

    async fn search(
        &self,
        query: &str,
        filter: Option<MediaType>,
    ) -> Result<Vec<ExternalSearchResult>, ProviderError> {
        match filter {
            Some(MediaType::Movie) => self.search_movies(query).await,
            Some(MediaType::TvShow) => self.search_tv(query).await,
            None => {
                let (movies, shows) =
                    tokio::join!(self.search_movies(query), self.search_tv(query));
                let mut results = movies?;
                results.extend(shows?);
                Ok(results)
            }
            Some(_) => Ok(Vec::new()),
        }
    }
}

// ============================================================================
// TMDB API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TmdbResponse<T> {
    results: Vec<T>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovie {
    id: u64,
    title: String,
    overview: Option<String>,
    poster_path: Option<String>,
    release_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbTvShow {
    id: u64,
    name: String,
    overview: Option<String>,
    poster_path: Option<String>,
    first_air_date: Option<String>,
}

#[derive(Debug, Deserialize)]
struct TmdbMovieDetails {
    belongs_to_collection: Option<TmdbCollection>,
}

#[derive(Debug, Deserialize)]
struct TmdbCollection {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_handles_movies_and_tv_only() {
        let client = TmdbClient::new("key".to_string());
        assert!(client.handles(MediaType::Movie));
        assert!(client.handles(MediaType::TvShow));
        assert!(!client.handles(MediaType::Book));
        assert!(!client.handles(MediaType::VideoGame));
    }

    #[test]
    fn test_strip_collection_suffix() {
        assert_eq!(strip_collection_suffix("Dune Collection"), "Dune");
        assert_eq!(strip_collection_suffix("Star Wars"), "Star Wars");
    }

    #[tokio::test]
    async fn test_search_with_foreign_filter_is_empty() {
        let client = TmdbClient::new("key".to_string());
        let results = client.search("dune", Some(MediaType::Book)).await.unwrap();
        assert!(results.is_empty());
    }
}
