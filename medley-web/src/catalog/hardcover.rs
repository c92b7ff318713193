//! Hardcover client (books)
//!
//! Queries the Hardcover GraphQL API. Search is two-step: a keyword search
//! returning an opaque Typesense blob, then a structured books() query to
//! resolve cover images. Also exposes a series-info lookup used when a
//! book's series is first materialized at add-to-library time.

use async_trait::async_trait;
use medley_common::types::MediaType;
use reqwest::Client;
use serde::Deserialize;
use serde_json::json;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;

use super::{CatalogProvider, ExternalSearchResult, ProviderError, SeriesInfo};

/// Hardcover GraphQL endpoint
const HARDCOVER_API_URL: &str = "https://api.hardcover.app/v1/graphql";

/// Default timeout for Hardcover API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// User-Agent sent with every request
const USER_AGENT: &str = "medley/0.1";

/// Keyword search, returning the raw Typesense result blob
const SEARCH_QUERY: &str = r#"
query SearchBooks($query: String!) {
  search(query: $query, query_type: "Book", per_page: 10, page: 1) {
    results
  }
}
"#;

/// Cover image resolution by book id
const IMAGES_QUERY: &str = r#"
query BookImages($ids: [Int!]!) {
  books(where: { id: { _in: $ids } }) {
    id
    image {
      url
    }
  }
}
"#;

/// Series description and completeness by exact name
const SERIES_QUERY: &str = r#"
query SeriesInfo($name: String!) {
  series(where: { name: { _eq: $name } }, limit: 1) {
    description
    is_completed
  }
}
"#;

pub struct HardcoverClient {
    http_client: Client,
    api_token: String,
}

impl HardcoverClient {
    pub fn new(api_token: String) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            api_token,
        }
    }

    async fn gql<T: serde::de::DeserializeOwned>(
        &self,
        query: &str,
        variables: serde_json::Value,
    ) -> Result<T, ProviderError> {
        let response = self
            .http_client
            .post(HARDCOVER_API_URL)
            .header(reqwest::header::AUTHORIZATION, &self.api_token)
            .header(reqwest::header::USER_AGENT, USER_AGENT)
            .json(&json!({ "query": query, "variables": variables }))
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("Hardcover request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "Hardcover returned {}",
                response.status()
            )));
        }

        let envelope: GraphQlEnvelope<T> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse Hardcover response: {}", e)))?;

        if let Some(errors) = envelope.errors {
            if !errors.is_empty() {
                return Err(ProviderError::Api(format!(
                    "Hardcover GraphQL error: {}",
                    errors[0].message
                )));
            }
        }

        envelope
            .data
            .ok_or_else(|| ProviderError::Parse("Hardcover response had no data".to_string()))
    }

    /// Series description and completeness, or None when Hardcover does not
    /// know the series
    pub async fn series_info(&self, name: &str) -> Result<Option<SeriesInfo>, ProviderError> {
        debug!(series = name, "Fetching Hardcover series info");
        let data: SeriesData = self.gql(SERIES_QUERY, json!({ "name": name })).await?;

        Ok(data.series.into_iter().next().map(|s| SeriesInfo {
            description: s.description.filter(|d| !d.is_empty()),
            is_complete: s.is_completed.unwrap_or(false),
        }))
    }
}

/// The search blob arrives either as a bare array of hits or wrapped in
/// the Typesense `{ hits: [{ document }] }` shape
fn parse_hits(results: serde_json::Value) -> Vec<SearchHit> {
    if results.is_array() {
        return serde_json::from_value(results).unwrap_or_default();
    }
    if let Some(hits) = results.get("hits").and_then(|h| h.as_array()) {
        return hits
            .iter()
            .filter_map(|h| h.get("document"))
            .filter_map(|d| serde_json::from_value(d.clone()).ok())
            .collect();
    }
    Vec::new()
}

/// Hardcover returns protocol-relative asset paths
fn full_image_url(url: &str) -> String {
    if url.starts_with("http") {
        url.to_string()
    } else {
        format!("https://{}", url)
    }
}

fn hit_to_result(hit: SearchHit, images: &HashMap<String, String>) -> ExternalSearchResult {
    let mut extra = serde_json::Map::new();
    if let Some(author) = hit.author_names.as_ref().and_then(|a| a.first()) {
        extra.insert("author".to_string(), json!(author));
    }
    if let Some(pages) = hit.pages {
        extra.insert("page_count".to_string(), json!(pages));
    }
    if let Some(genres) = &hit.genres {
        let genres: Vec<&String> = genres.iter().take(5).collect();
        extra.insert("genres".to_string(), json!(genres));
    }
    if let Some(series) = hit.series_names.as_ref().and_then(|s| s.first()) {
        extra.insert("series".to_string(), json!(series));
    }
    if let Some(position) = hit.featured_series_position {
        extra.insert("series_position".to_string(), json!(position));
    }

    ExternalSearchResult {
        cover_image_url: images.get(&hit.id).cloned(),
        external_id: hit.id,
        external_source: "hardcover".to_string(),
        media_type: MediaType::Book,
        title: hit.title,
        description: hit.description.filter(|d| !d.is_empty()),
        release_date: hit.release_year.map(|y| format!("{}-01-01", y)),
        extra: serde_json::Value::Object(extra),
    }
}

#[async_trait]
impl CatalogProvider for HardcoverClient {
    fn name(&self) -> &'static str {
        "Hardcover"
    }

    fn handles(&self, media_type: MediaType) -> bool {
        media_type == MediaType::Book
    }

    async fn search(
        &self,
        query: &str,
        filter: Option<MediaType>,
    ) -> Result<Vec<ExternalSearchResult>, ProviderError> {
        if let Some(media_type) = filter {
            if !self.handles(media_type) {
                return Ok(Vec::new());
            }
        }

        let data: SearchData = self.gql(SEARCH_QUERY, json!({ "query": query })).await?;
        let hits = parse_hits(data.search.results);
        if hits.is_empty() {
            return Ok(Vec::new());
        }

        // One follow-up query resolves every cover image. Typesense hit ids
        // are strings; the books() query wants ints.
        let ids: Vec<i64> = hits.iter().filter_map(|h| h.id.parse().ok()).collect();
        let images: HashMap<String, String> = match self
            .gql::<ImagesData>(IMAGES_QUERY, json!({ "ids": ids }))
            .await
        {
            Ok(data) => data
                .books
                .into_iter()
                .filter_map(|b| b.image.map(|i| (b.id.to_string(), full_image_url(&i.url))))
                .collect(),
            // covers are decoration; a failed image lookup must not sink
            // the search
            Err(e) => {
                debug!(error = %e, "Hardcover image lookup failed");
                HashMap::new()
            }
        };

        Ok(hits
            .into_iter()
            .map(|hit| hit_to_result(hit, &images))
            .collect())
    }
}

// ============================================================================
// Hardcover API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct GraphQlEnvelope<T> {
    data: Option<T>,
    errors: Option<Vec<GraphQlError>>,
}

#[derive(Debug, Deserialize)]
struct GraphQlError {
    message: String,
}

#[derive(Debug, Deserialize)]
struct SearchData {
    search: SearchResults,
}

#[derive(Debug, Deserialize)]
struct SearchResults {
    results: serde_json::Value,
}

/// Typesense returns ids as strings
#[derive(Debug, Deserialize)]
struct SearchHit {
    id: String,
    title: String,
    description: Option<String>,
    author_names: Option<Vec<String>>,
    series_names: Option<Vec<String>>,
    featured_series_position: Option<f64>,
    genres: Option<Vec<String>>,
    pages: Option<i64>,
    release_year: Option<i32>,
}

#[derive(Debug, Deserialize)]
struct ImagesData {
    books: Vec<BookImage>,
}

#[derive(Debug, Deserialize)]
struct BookImage {
    id: i64,
    image: Option<ImageUrl>,
}

#[derive(Debug, Deserialize)]
struct ImageUrl {
    url: String,
}

#[derive(Debug, Deserialize)]
struct SeriesData {
    series: Vec<SeriesRow>,
}

#[derive(Debug, Deserialize)]
struct SeriesRow {
    description: Option<String>,
    is_completed: Option<bool>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_hits_bare_array() {
        let results = json!([
            {"id": "1", "title": "Dune"},
            {"id": "2", "title": "Dune Messiah"}
        ]);
        let hits = parse_hits(results);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[0].title, "Dune");
    }

    #[test]
    fn test_parse_hits_typesense_wrapped() {
        let results = json!({
            "hits": [
                {"document": {"id": "1", "title": "Dune"}},
                {"document": {"id": "2", "title": "Children of Dune"}}
            ]
        });
        let hits = parse_hits(results);
        assert_eq!(hits.len(), 2);
        assert_eq!(hits[1].title, "Children of Dune");
    }

    #[test]
    fn test_hit_to_result_extra_fields() {
        let hit = SearchHit {
            id: "42".to_string(),
            title: "Dune".to_string(),
            description: Some("Spice".to_string()),
            author_names: Some(vec!["Frank Herbert".to_string()]),
            series_names: Some(vec!["Dune Saga".to_string()]),
            featured_series_position: Some(1.0),
            genres: None,
            pages: Some(412),
            release_year: Some(1965),
        };
        let mut images = HashMap::new();
        images.insert("42".to_string(), "https://assets.example/cover.jpg".to_string());

        let result = hit_to_result(hit, &images);
        assert_eq!(result.external_id, "42");
        assert_eq!(result.release_date.as_deref(), Some("1965-01-01"));
        assert_eq!(result.extra["series"], "Dune Saga");
        assert_eq!(result.extra["series_position"], 1.0);
        assert_eq!(result.extra["author"], "Frank Herbert");
        assert_eq!(
            result.cover_image_url.as_deref(),
            Some("https://assets.example/cover.jpg")
        );
    }

    #[test]
    fn test_full_image_url_protocol_relative() {
        assert_eq!(
            full_image_url("assets.hardcover.app/cover.jpg"),
            "https://assets.hardcover.app/cover.jpg"
        );
        assert_eq!(
            full_image_url("https://assets.hardcover.app/cover.jpg"),
            "https://assets.hardcover.app/cover.jpg"
        );
    }
}
