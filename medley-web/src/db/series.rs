//! Series database operations

use chrono::Utc;
use medley_common::db::models::Series;
use medley_common::types::{ItemStatus, MediaType};
use medley_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_guid, parse_timestamp};

/// Save a new series
pub async fn save_series(pool: &SqlitePool, series: &Series) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO series (
            guid, user_id, name, type, status, rating, description,
            is_complete, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(series.guid.to_string())
    .bind(series.user_id.to_string())
    .bind(&series.name)
    .bind(series.media_type.as_str())
    .bind(series.status.as_str())
    .bind(series.rating)
    .bind(&series.description)
    .bind(series.is_complete as i64)
    .bind(series.created_at.to_rfc3339())
    .bind(series.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn series_from_row(row: &SqliteRow) -> Result<Series> {
    let guid: String = row.get("guid");
    let user_id: String = row.get("user_id");
    let type_str: String = row.get("type");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(Series {
        guid: parse_guid(&guid)?,
        user_id: parse_guid(&user_id)?,
        name: row.get("name"),
        media_type: MediaType::parse(&type_str)?,
        status: ItemStatus::parse(&status)?,
        rating: row.get("rating"),
        description: row.get("description"),
        is_complete: row.get::<i64, _>("is_complete") != 0,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

const SERIES_SELECT: &str = "\
    SELECT guid, user_id, name, type, status, rating, description,
           is_complete, created_at, updated_at
    FROM series";

/// Load a series scoped to its owner
pub async fn load_series(pool: &SqlitePool, guid: Uuid, user_id: Uuid) -> Result<Option<Series>> {
    let sql = format!("{} WHERE guid = ? AND user_id = ?", SERIES_SELECT);
    let row = sqlx::query(&sql)
        .bind(guid.to_string())
        .bind(user_id.to_string())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(series_from_row).transpose()
}

/// Find a user's series by exact name and type (add-to-library reuse path)
pub async fn find_series_by_name(
    pool: &SqlitePool,
    user_id: Uuid,
    name: &str,
    media_type: MediaType,
) -> Result<Option<Series>> {
    let sql = format!("{} WHERE user_id = ? AND name = ? AND type = ?", SERIES_SELECT);
    let row = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(name)
        .bind(media_type.as_str())
        .fetch_optional(pool)
        .await?;

    row.as_ref().map(series_from_row).transpose()
}

/// All of the user's series of one type, name ascending
pub async fn list_series_by_type(
    pool: &SqlitePool,
    user_id: Uuid,
    media_type: MediaType,
) -> Result<Vec<Series>> {
    let sql = format!(
        "{} WHERE user_id = ? AND type = ? ORDER BY name ASC",
        SERIES_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(media_type.as_str())
        .fetch_all(pool)
        .await?;

    rows.iter().map(series_from_row).collect()
}

/// All of the user's series (view-engine input)
pub async fn list_all_series(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<Series>> {
    let sql = format!("{} WHERE user_id = ?", SERIES_SELECT);
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .fetch_all(pool)
        .await?;

    rows.iter().map(series_from_row).collect()
}

/// Overwrite the series status (user-set or aggregated)
pub async fn update_series_status(
    pool: &SqlitePool,
    guid: Uuid,
    user_id: Uuid,
    status: ItemStatus,
) -> Result<()> {
    sqlx::query("UPDATE series SET status = ?, updated_at = ? WHERE guid = ? AND user_id = ?")
        .bind(status.as_str())
        .bind(Utc::now().to_rfc3339())
        .bind(guid.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Update name / description / completeness
pub async fn update_series_fields(
    pool: &SqlitePool,
    guid: Uuid,
    user_id: Uuid,
    name: &str,
    description: Option<&str>,
    is_complete: bool,
) -> Result<()> {
    sqlx::query(
        "UPDATE series SET name = ?, description = ?, is_complete = ?, updated_at = ?
         WHERE guid = ? AND user_id = ?",
    )
    .bind(name)
    .bind(description)
    .bind(is_complete as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .bind(user_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn update_series_rating(
    pool: &SqlitePool,
    guid: Uuid,
    user_id: Uuid,
    rating: Option<f64>,
) -> Result<()> {
    sqlx::query("UPDATE series SET rating = ?, updated_at = ? WHERE guid = ? AND user_id = ?")
        .bind(rating)
        .bind(Utc::now().to_rfc3339())
        .bind(guid.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Delete a series (member items keep existing with series_id set null)
pub async fn delete_series(pool: &SqlitePool, guid: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM series WHERE guid = ? AND user_id = ?")
        .bind(guid.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Member item counts per series for the given series set
pub async fn item_counts_for_series(
    pool: &SqlitePool,
    series_ids: &[Uuid],
    user_id: Uuid,
) -> Result<std::collections::HashMap<Uuid, i64>> {
    if series_ids.is_empty() {
        return Ok(std::collections::HashMap::new());
    }

    let sql = format!(
        "SELECT series_id, COUNT(*) AS item_count
         FROM tracked_items
         WHERE user_id = ? AND series_id IN ({})
         GROUP BY series_id",
        super::sql_placeholders(series_ids.len())
    );

    let mut query = sqlx::query(&sql).bind(user_id.to_string());
    for id in series_ids {
        query = query.bind(id.to_string());
    }
    let rows = query.fetch_all(pool).await?;

    let mut counts = std::collections::HashMap::new();
    for row in &rows {
        let series_id: String = row.get("series_id");
        let item_count: i64 = row.get("item_count");
        counts.insert(parse_guid(&series_id)?, item_count);
    }
    Ok(counts)
}
