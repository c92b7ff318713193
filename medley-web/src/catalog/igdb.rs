//! IGDB client (games)
//!
//! Queries the IGDB v4 API. Authentication is a Twitch OAuth
//! client-credentials token; the token lives in an injectable cache object
//! with expiry slack, scoped to the client, so nothing process-wide holds
//! credentials.
//!
//! API reference: https://api-docs.igdb.com/

use async_trait::async_trait;
use medley_common::types::MediaType;
use reqwest::Client;
use serde::Deserialize;
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::debug;

use super::{CatalogProvider, ExternalSearchResult, ProviderError};

/// IGDB API base URL
const IGDB_API_URL: &str = "https://api.igdb.com/v4";

/// Twitch OAuth token endpoint
const TWITCH_OAUTH_URL: &str = "https://id.twitch.tv/oauth2/token";

/// Default timeout for IGDB API requests
const DEFAULT_TIMEOUT: Duration = Duration::from_secs(10);

/// Refresh this long before the token actually expires
const TOKEN_EXPIRY_SLACK: Duration = Duration::from_secs(60);

/// Cap per search, matching what the UI shows
const MAX_RESULTS: usize = 10;

/// Cached OAuth access token with its expiry
#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    expires_at: Instant,
}

impl CachedToken {
    fn is_valid(&self, now: Instant) -> bool {
        self.expires_at > now
    }
}

/// Token cache owned by the client (not module-global)
#[derive(Default)]
pub struct TokenCache {
    inner: Mutex<Option<CachedToken>>,
}

impl TokenCache {
    async fn get_valid(&self) -> Option<String> {
        let guard = self.inner.lock().await;
        guard
            .as_ref()
            .filter(|t| t.is_valid(Instant::now()))
            .map(|t| t.access_token.clone())
    }

    async fn store(&self, access_token: String, expires_in: Duration) {
        let expires_at = Instant::now() + expires_in.saturating_sub(TOKEN_EXPIRY_SLACK);
        *self.inner.lock().await = Some(CachedToken {
            access_token,
            expires_at,
        });
    }
}

pub struct IgdbClient {
    http_client: Client,
    client_id: String,
    client_secret: String,
    token_cache: TokenCache,
}

impl IgdbClient {
    pub fn new(client_id: String, client_secret: String) -> Self {
        Self {
            http_client: Client::builder()
                .timeout(DEFAULT_TIMEOUT)
                .build()
                .expect("Failed to create HTTP client"),
            client_id,
            client_secret,
            token_cache: TokenCache::default(),
        }
    }

    async fn access_token(&self) -> Result<String, ProviderError> {
        if let Some(token) = self.token_cache.get_valid().await {
            return Ok(token);
        }

        debug!("Fetching fresh IGDB access token");
        let response = self
            .http_client
            .post(TWITCH_OAUTH_URL)
            .query(&[
                ("client_id", self.client_id.as_str()),
                ("client_secret", self.client_secret.as_str()),
                ("grant_type", "client_credentials"),
            ])
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("Twitch token request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "Twitch token endpoint returned {}",
                response.status()
            )));
        }

        let token: TwitchTokenResponse = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse token response: {}", e)))?;

        self.token_cache
            .store(token.access_token.clone(), Duration::from_secs(token.expires_in))
            .await;

        Ok(token.access_token)
    }
}

/// Build the IGDB query body; double quotes in user input would terminate
/// the search string early, so they are stripped
fn search_body(query: &str) -> String {
    format!(
        "fields name,cover.url,first_release_date,summary,genres.name; search \"{}\"; limit {};",
        query.replace('"', ""),
        MAX_RESULTS
    )
}

/// Upgrade an IGDB thumbnail URL to a full cover
fn cover_url(url: &str) -> String {
    format!("https:{}", url.replace("t_thumb", "t_cover_big_2x"))
}

fn release_date_from_unix(timestamp: i64) -> Option<String> {
    chrono::DateTime::from_timestamp(timestamp, 0).map(|dt| dt.date_naive().to_string())
}

#[async_trait]
impl CatalogProvider for IgdbClient {
    fn name(&self) -> &'static str {
        "IGDB"
    }

    fn handles(&self, media_type: MediaType) -> bool {
        media_type == MediaType::VideoGame
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

        let access_token = self.access_token().await?;

        let response = self
            .http_client
            .post(format!("{}/games", IGDB_API_URL))
            .header("Client-ID", &self.client_id)
            .bearer_auth(access_token)
            .header(reqwest::header::CONTENT_TYPE, "text/plain")
            .body(search_body(query))
            .send()
            .await
            .map_err(|e| ProviderError::Network(format!("IGDB request failed: {}", e)))?;

        if !response.status().is_success() {
            return Err(ProviderError::Api(format!(
                "IGDB returned {}",
                response.status()
            )));
        }

        let games: Vec<IgdbGame> = response
            .json()
            .await
            .map_err(|e| ProviderError::Parse(format!("Failed to parse IGDB response: {}", e)))?;

        Ok(games
            .into_iter()
            .map(|game| {
                let genres: Vec<String> = game
                    .genres
                    .unwrap_or_default()
                    .into_iter()
                    .map(|g| g.name)
                    .collect();

                ExternalSearchResult {
                    external_id: game.id.to_string(),
                    external_source: "igdb".to_string(),
                    media_type: MediaType::VideoGame,
                    title: game.name,
                    description: game.summary.filter(|s| !s.is_empty()),
                    cover_image_url: game.cover.map(|c| cover_url(&c.url)),
                    release_date: game.first_release_date.and_then(release_date_from_unix),
                    extra: serde_json::json!({ "genres": genres }),
                }
            })
            .collect())
    }
}

// ============================================================================
// IGDB API Response Types
// ============================================================================

#[derive(Debug, Deserialize)]
struct TwitchTokenResponse {
    access_token: String,
    expires_in: u64,
}

#[derive(Debug, Deserialize)]
struct IgdbGame {
    id: u64,
    name: String,
    summary: Option<String>,
    cover: Option<IgdbCover>,
    first_release_date: Option<i64>,
    genres: Option<Vec<IgdbGenre>>,
}

#[derive(Debug, Deserialize)]
struct IgdbCover {
    url: String,
}

#[derive(Debug, Deserialize)]
struct IgdbGenre {
    name: String,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_search_body_strips_quotes() {
        let body = search_body("portal \"2\"");
        assert!(body.contains("search \"portal 2\";"));
    }

    #[test]
    fn test_cover_url_upgrade() {
        assert_eq!(
            cover_url("//images.igdb.com/igdb/image/upload/t_thumb/co1234.jpg"),
            "https://images.igdb.com/igdb/image/upload/t_cover_big_2x/co1234.jpg"
        );
    }

    #[test]
    fn test_release_date_from_unix() {
        // 2020-03-20 (Animal Crossing: New Horizons)
        assert_eq!(
            release_date_from_unix(1584662400).as_deref(),
            Some("2020-03-20")
        );
    }

    #[tokio::test]
    async fn test_token_cache_expiry() {
        let cache = TokenCache::default();
        assert!(cache.get_valid().await.is_none());

        // lifetime shorter than the slack: expired immediately
        cache
            .store("short-lived".to_string(), Duration::from_secs(30))
            .await;
        assert!(cache.get_valid().await.is_none());

        cache
            .store("long-lived".to_string(), Duration::from_secs(3600))
            .await;
        assert_eq!(cache.get_valid().await.as_deref(), Some("long-lived"));
    }

    #[tokio::test]
    async fn test_search_with_foreign_filter_is_empty() {
        let client = IgdbClient::new("id".to_string(), "secret".to_string());
        let results = client.search("dune", Some(MediaType::Movie)).await.unwrap();
        assert!(results.is_empty());
    }
}
