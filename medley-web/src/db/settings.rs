//! Settings persistence (key/value)
//!
//! Holds provider credentials configured through the API so they survive
//! restarts without touching the TOML file.

use medley_common::Result;
use sqlx::SqlitePool;

/// Get a setting value by key
pub async fn get_setting(pool: &SqlitePool, key: &str) -> Result<Option<String>> {
    let value: Option<String> = sqlx::query_scalar("SELECT value FROM settings WHERE key = ?")
        .bind(key)
        .fetch_optional(pool)
        .await?;
    Ok(value)
}

/// Set a setting value (insert or replace)
pub async fn set_setting(pool: &SqlitePool, key: &str, value: &str) -> Result<()> {
    sqlx::query("INSERT OR REPLACE INTO settings (key, value) VALUES (?, ?)")
        .bind(key)
        .bind(value)
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_common::db::init::init_memory_database;

    #[tokio::test]
    async fn test_set_and_get_setting() {
        let pool = init_memory_database().await.unwrap();

        assert!(get_setting(&pool, "tmdb_api_key").await.unwrap().is_none());

        set_setting(&pool, "tmdb_api_key", "abc123").await.unwrap();
        assert_eq!(
            get_setting(&pool, "tmdb_api_key").await.unwrap().as_deref(),
            Some("abc123")
        );

        set_setting(&pool, "tmdb_api_key", "def456").await.unwrap();
        assert_eq!(
            get_setting(&pool, "tmdb_api_key").await.unwrap().as_deref(),
            Some("def456")
        );
    }
}
