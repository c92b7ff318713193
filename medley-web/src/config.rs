//! Configuration resolution for medley-web
//!
//! Provider credentials resolve with Database → ENV → TOML priority: the
//! settings table is authoritative (it is where the settings API writes),
//! environment variables cover deployments, and the TOML file is the
//! hand-edited fallback.

use medley_common::config::{TomlConfig, DEFAULT_WINDOW_DAYS};
use medley_common::Result;
use sqlx::SqlitePool;
use tracing::{info, warn};

use crate::db::settings;

/// Resolved runtime tunables
#[derive(Debug, Clone)]
pub struct AppConfig {
    /// Dashboard recently-finished window
    pub recently_finished_window_days: i64,
    /// Series displayed-status activity window. Same default as the
    /// dashboard window, configured independently.
    pub series_activity_window_days: i64,
}

impl AppConfig {
    pub fn from_toml(toml: &TomlConfig) -> Self {
        Self {
            recently_finished_window_days: toml
                .recently_finished_window_days
                .unwrap_or(DEFAULT_WINDOW_DAYS),
            series_activity_window_days: toml
                .series_activity_window_days
                .unwrap_or(DEFAULT_WINDOW_DAYS),
        }
    }
}

impl Default for AppConfig {
    fn default() -> Self {
        Self {
            recently_finished_window_days: DEFAULT_WINDOW_DAYS,
            series_activity_window_days: DEFAULT_WINDOW_DAYS,
        }
    }
}

/// Validate a credential (non-empty, non-whitespace)
pub fn is_valid_key(key: &str) -> bool {
    !key.trim().is_empty()
}

/// Resolve one provider credential from 3-tier configuration.
///
/// Priority: Database → ENV → TOML. Returns None when no tier has a
/// usable value; the provider is then skipped rather than the service
/// failing to start.
pub async fn resolve_credential(
    db: &SqlitePool,
    setting_key: &str,
    env_var: &str,
    toml_value: Option<&String>,
) -> Result<Option<String>> {
    let db_key = settings::get_setting(db, setting_key).await?;
    let env_key = std::env::var(env_var).ok();
    let toml_key = toml_value;

    let mut sources = Vec::new();
    if db_key.as_deref().is_some_and(is_valid_key) {
        sources.push("database");
    }
    if env_key.as_deref().is_some_and(is_valid_key) {
        sources.push("environment");
    }
    if toml_key.map(|k| k.as_str()).is_some_and(is_valid_key) {
        sources.push("TOML");
    }

    if sources.len() > 1 {
        warn!(
            "{} found in multiple sources: {}. Using {} (highest priority).",
            setting_key,
            sources.join(", "),
            sources[0]
        );
    }

    if let Some(key) = db_key {
        if is_valid_key(&key) {
            info!("{} loaded from database", setting_key);
            return Ok(Some(key));
        }
    }
    if let Some(key) = env_key {
        if is_valid_key(&key) {
            info!("{} loaded from environment variable", setting_key);
            return Ok(Some(key));
        }
    }
    if let Some(key) = toml_key {
        if is_valid_key(key) {
            info!("{} loaded from TOML config", setting_key);
            return Ok(Some(key.clone()));
        }
    }

    Ok(None)
}

/// Build the catalog provider set from whatever credentials resolve.
/// Unconfigured providers are skipped with a warning and the search
/// simply has fewer sources.
pub async fn build_providers(
    db: &SqlitePool,
    toml: &TomlConfig,
) -> Result<crate::catalog::ProviderSet> {
    use std::sync::Arc;

    let mut providers = crate::catalog::ProviderSet::default();

    match resolve_credential(db, "hardcover_api_token", "MEDLEY_HARDCOVER_API_TOKEN", toml.hardcover_api_token.as_ref()).await? {
        Some(token) => {
            providers.hardcover = Some(Arc::new(crate::catalog::hardcover::HardcoverClient::new(token)))
        }
        None => warn!("Hardcover API token not configured; book search disabled"),
    }

    match resolve_credential(db, "tmdb_api_key", "MEDLEY_TMDB_API_KEY", toml.tmdb_api_key.as_ref()).await? {
        Some(key) => providers.tmdb = Some(Arc::new(crate::catalog::tmdb::TmdbClient::new(key))),
        None => warn!("TMDB API key not configured; movie/TV search disabled"),
    }

    let igdb_id = resolve_credential(db, "igdb_client_id", "MEDLEY_IGDB_CLIENT_ID", toml.igdb_client_id.as_ref()).await?;
    let igdb_secret = resolve_credential(db, "igdb_client_secret", "MEDLEY_IGDB_CLIENT_SECRET", toml.igdb_client_secret.as_ref()).await?;
    match (igdb_id, igdb_secret) {
        (Some(id), Some(secret)) => {
            providers.igdb = Some(Arc::new(crate::catalog::igdb::IgdbClient::new(id, secret)))
        }
        _ => warn!("IGDB credentials not configured; game search disabled"),
    }

    Ok(providers)
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_common::db::init::init_memory_database;

    #[test]
    fn test_is_valid_key() {
        assert!(is_valid_key("abc"));
        assert!(!is_valid_key(""));
        assert!(!is_valid_key("   "));
    }

    #[test]
    fn test_windows_default_and_override() {
        let config = AppConfig::default();
        assert_eq!(config.recently_finished_window_days, 30);
        assert_eq!(config.series_activity_window_days, 30);

        let toml = TomlConfig {
            recently_finished_window_days: Some(14),
            ..Default::default()
        };
        let config = AppConfig::from_toml(&toml);
        assert_eq!(config.recently_finished_window_days, 14);
        // the two windows are independent; overriding one leaves the other
        assert_eq!(config.series_activity_window_days, 30);
    }

    #[tokio::test]
    async fn test_database_beats_toml() {
        let pool = init_memory_database().await.unwrap();
        settings::set_setting(&pool, "tmdb_api_key", "from-db").await.unwrap();

        let toml_value = "from-toml".to_string();
        let resolved = resolve_credential(
            &pool,
            "tmdb_api_key",
            "MEDLEY_TEST_UNSET_TMDB_KEY",
            Some(&toml_value),
        )
        .await
        .unwrap();
        assert_eq!(resolved.as_deref(), Some("from-db"));
    }

    #[tokio::test]
    async fn test_unconfigured_credential_resolves_none() {
        let pool = init_memory_database().await.unwrap();
        let resolved = resolve_credential(&pool, "tmdb_api_key", "MEDLEY_TEST_UNSET_TMDB_KEY", None)
            .await
            .unwrap();
        assert!(resolved.is_none());
    }
}
