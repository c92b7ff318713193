//! Database initialization
//!
//! Opens (or creates) the SQLite database and installs the schema
//! idempotently so first run needs no manual setup.

use crate::Result;
use sqlx::{sqlite::SqlitePoolOptions, SqlitePool};
use std::path::Path;
use tracing::info;

use super::schema;

/// Initialize database connection and create tables if needed
pub async fn init_database(db_path: &Path) -> Result<SqlitePool> {
    let newly_created = !db_path.exists();

    // Create parent directory if it doesn't exist
    if let Some(parent) = db_path.parent() {
        std::fs::create_dir_all(parent)?;
    }

    // Use sqlite options to create database if it doesn't exist
    let db_url = format!("sqlite://{}?mode=rwc", db_path.display());
    let pool = SqlitePoolOptions::new()
        .max_connections(10)
        .connect(&db_url)
        .await?;

    if newly_created {
        info!("Initialized new database: {}", db_path.display());
    } else {
        info!("Opened existing database: {}", db_path.display());
    }

    configure_connection(&pool).await?;
    schema::create_all_tables(&pool).await?;

    Ok(pool)
}

/// Open an in-memory database with the full schema installed (tests).
/// Capped to one connection: each :memory: connection is its own database.
pub async fn init_memory_database() -> Result<SqlitePool> {
    let pool = SqlitePoolOptions::new()
        .max_connections(1)
        .connect("sqlite::memory:")
        .await?;
    configure_connection(&pool).await?;
    schema::create_all_tables(&pool).await?;
    Ok(pool)
}

async fn configure_connection(pool: &SqlitePool) -> Result<()> {
    // Enable foreign keys (cascades on item and metadata deletes rely on it)
    sqlx::query("PRAGMA foreign_keys = ON").execute(pool).await?;

    // WAL mode allows concurrent readers with one writer
    sqlx::query("PRAGMA journal_mode = WAL").execute(pool).await?;

    sqlx::query("PRAGMA busy_timeout = 5000").execute(pool).await?;

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_init_creates_database_file() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("medley.db");

        let pool = init_database(&db_path).await.expect("init failed");
        assert!(db_path.exists());

        // Schema must be queryable immediately
        let count: i64 = sqlx::query_scalar("SELECT COUNT(*) FROM tracked_items")
            .fetch_one(&pool)
            .await
            .unwrap();
        assert_eq!(count, 0);
    }

    #[tokio::test]
    async fn test_init_is_idempotent() {
        let dir = tempfile::tempdir().unwrap();
        let db_path = dir.path().join("medley.db");

        init_database(&db_path).await.expect("first init failed");
        init_database(&db_path).await.expect("second init failed");
    }
}
