//! Table definitions
//!
//! Single source of truth for the database schema. Each `create_*_table`
//! function is idempotent (`CREATE TABLE IF NOT EXISTS`); `create_all_tables`
//! runs them in dependency order.
//!
//! Timestamps are RFC3339 TEXT written by the application rather than
//! `CURRENT_TIMESTAMP`, so lexicographic order equals chronological order
//! at sub-second resolution. Dates are `YYYY-MM-DD` TEXT.

use crate::Result;
use sqlx::SqlitePool;
use tracing::info;

/// Create all tables in dependency order
pub async fn create_all_tables(pool: &SqlitePool) -> Result<()> {
    create_users_table(pool).await?;
    create_sessions_table(pool).await?;
    create_settings_table(pool).await?;
    create_catalog_metadata_table(pool).await?;
    create_series_table(pool).await?;
    create_tracked_items_table(pool).await?;
    create_instances_table(pool).await?;
    create_views_table(pool).await?;

    info!("Database schema initialized");
    Ok(())
}

async fn create_users_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS users (
            guid TEXT PRIMARY KEY,
            name TEXT NOT NULL,
            email TEXT UNIQUE NOT NULL,
            password_hash TEXT NOT NULL,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_sessions_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS sessions (
            token TEXT PRIMARY KEY,
            user_id TEXT NOT NULL REFERENCES users(guid) ON DELETE CASCADE,
            expires_at TEXT NOT NULL,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS sessions_user_id_idx ON sessions(user_id)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_settings_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS settings (
            key TEXT PRIMARY KEY,
            value TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;
    Ok(())
}

/// Shared, externally-sourced descriptive data. The unique index on
/// (external_id, external_source) prevents caching the same catalog entry
/// twice; rows are not owned by any single user.
async fn create_catalog_metadata_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS catalog_metadata (
            guid TEXT PRIMARY KEY,
            type TEXT NOT NULL,
            title TEXT NOT NULL,
            description TEXT,
            cover_image_url TEXT,
            release_date TEXT,
            external_id TEXT NOT NULL,
            external_source TEXT NOT NULL,
            extra TEXT,
            created_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE UNIQUE INDEX IF NOT EXISTS catalog_metadata_external_unique
         ON catalog_metadata(external_id, external_source)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_series_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS series (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            type TEXT NOT NULL,
            status TEXT NOT NULL DEFAULT 'backlog',
            rating REAL,
            description TEXT,
            is_complete INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS series_user_id_idx ON series(user_id)")
        .execute(pool)
        .await?;
    Ok(())
}

async fn create_tracked_items_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS tracked_items (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            catalog_metadata_id TEXT NOT NULL
                REFERENCES catalog_metadata(guid) ON DELETE CASCADE,
            series_id TEXT REFERENCES series(guid) ON DELETE SET NULL,
            status TEXT NOT NULL DEFAULT 'backlog',
            is_purchased INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS tracked_items_user_id_idx ON tracked_items(user_id)")
        .execute(pool)
        .await?;
    sqlx::query("CREATE INDEX IF NOT EXISTS tracked_items_series_id_idx ON tracked_items(series_id)")
        .execute(pool)
        .await?;
    Ok(())
}

/// One row per consumption pass. `completed_at` NULL means still in
/// progress; the dates drive tracked-item status recomputation.
async fn create_instances_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS instances (
            guid TEXT PRIMARY KEY,
            tracked_item_id TEXT NOT NULL
                REFERENCES tracked_items(guid) ON DELETE CASCADE,
            rating REAL,
            structured_rating TEXT,
            review_text TEXT,
            started_at TEXT,
            completed_at TEXT,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query(
        "CREATE INDEX IF NOT EXISTS instances_tracked_item_id_idx ON instances(tracked_item_id)",
    )
    .execute(pool)
    .await?;
    Ok(())
}

async fn create_views_table(pool: &SqlitePool) -> Result<()> {
    sqlx::query(
        r#"
        CREATE TABLE IF NOT EXISTS views (
            guid TEXT PRIMARY KEY,
            user_id TEXT NOT NULL,
            name TEXT NOT NULL,
            subject TEXT NOT NULL,
            filters TEXT NOT NULL DEFAULT '{}',
            display_order INTEGER NOT NULL DEFAULT 0,
            created_at TEXT NOT NULL,
            updated_at TEXT NOT NULL
        )
        "#,
    )
    .execute(pool)
    .await?;

    sqlx::query("CREATE INDEX IF NOT EXISTS views_user_id_idx ON views(user_id)")
        .execute(pool)
        .await?;
    Ok(())
}
