//! Tracked item database operations

use chrono::{DateTime, NaiveDate, Utc};
use medley_common::db::models::TrackedItem;
use medley_common::types::{ItemStatus, MediaType};
use medley_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::metadata::extra_series_position;
use super::{parse_date_opt, parse_guid, parse_guid_opt, parse_timestamp, sql_placeholders};

/// Tracked item joined with its catalog metadata and series name, the shape
/// the library, dashboard, and view queries all work from.
#[derive(Debug, Clone, serde::Serialize)]
pub struct ItemSummary {
    pub id: Uuid,
    pub status: ItemStatus,
    pub is_purchased: bool,
    pub metadata_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub cover_image_url: Option<String>,
    pub series_id: Option<Uuid>,
    pub series_name: Option<String>,
    #[serde(skip)]
    pub updated_at: DateTime<Utc>,
}

/// Series member with the fields the next-in-series inference orders by
#[derive(Debug, Clone)]
pub struct SeriesMemberRow {
    pub summary: ItemSummary,
    pub series_position: Option<f64>,
    pub release_date: Option<NaiveDate>,
}

const SUMMARY_SELECT: &str = "\
    SELECT ti.guid, ti.status, ti.is_purchased, ti.series_id, ti.updated_at,
           cm.guid AS metadata_id, cm.title, cm.type, cm.cover_image_url,
           s.name AS series_name
    FROM tracked_items ti
    INNER JOIN catalog_metadata cm ON cm.guid = ti.catalog_metadata_id
    LEFT JOIN series s ON s.guid = ti.series_id";

pub(crate) fn summary_from_row(row: &SqliteRow) -> Result<ItemSummary> {
    let guid: String = row.get("guid");
    let status: String = row.get("status");
    let series_id: Option<String> = row.get("series_id");
    let metadata_id: String = row.get("metadata_id");
    let type_str: String = row.get("type");
    let updated_at: String = row.get("updated_at");

    Ok(ItemSummary {
        id: parse_guid(&guid)?,
        status: ItemStatus::parse(&status)?,
        is_purchased: row.get::<i64, _>("is_purchased") != 0,
        metadata_id: parse_guid(&metadata_id)?,
        title: row.get("title"),
        media_type: MediaType::parse(&type_str)?,
        cover_image_url: row.get("cover_image_url"),
        series_id: parse_guid_opt(series_id)?,
        series_name: row.get("series_name"),
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Save a new tracked item
pub async fn save_item(pool: &SqlitePool, item: &TrackedItem) -> Result<()> {
    sqlx::query(
        r#"
        INSERT INTO tracked_items (
            guid, user_id, catalog_metadata_id, series_id, status,
            is_purchased, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(item.guid.to_string())
    .bind(item.user_id.to_string())
    .bind(item.catalog_metadata_id.to_string())
    .bind(item.series_id.map(|id| id.to_string()))
    .bind(item.status.as_str())
    .bind(item.is_purchased as i64)
    .bind(item.created_at.to_rfc3339())
    .bind(item.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn item_from_row(row: &SqliteRow) -> Result<TrackedItem> {
    let guid: String = row.get("guid");
    let user_id: String = row.get("user_id");
    let catalog_metadata_id: String = row.get("catalog_metadata_id");
    let series_id: Option<String> = row.get("series_id");
    let status: String = row.get("status");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    Ok(TrackedItem {
        guid: parse_guid(&guid)?,
        user_id: parse_guid(&user_id)?,
        catalog_metadata_id: parse_guid(&catalog_metadata_id)?,
        series_id: parse_guid_opt(series_id)?,
        status: ItemStatus::parse(&status)?,
        is_purchased: row.get::<i64, _>("is_purchased") != 0,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Load a tracked item scoped to its owner
pub async fn load_item(pool: &SqlitePool, guid: Uuid, user_id: Uuid) -> Result<Option<TrackedItem>> {
    let row = sqlx::query(
        "SELECT guid, user_id, catalog_metadata_id, series_id, status,
                is_purchased, created_at, updated_at
         FROM tracked_items WHERE guid = ? AND user_id = ?",
    )
    .bind(guid.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(item_from_row).transpose()
}

/// Load the user's tracked item for a catalog entry, if any
pub async fn load_item_by_metadata(
    pool: &SqlitePool,
    metadata_id: Uuid,
    user_id: Uuid,
) -> Result<Option<TrackedItem>> {
    let row = sqlx::query(
        "SELECT guid, user_id, catalog_metadata_id, series_id, status,
                is_purchased, created_at, updated_at
         FROM tracked_items WHERE catalog_metadata_id = ? AND user_id = ?",
    )
    .bind(metadata_id.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(item_from_row).transpose()
}

/// Overwrite the item status (derived or user-set)
pub async fn update_item_status(
    pool: &SqlitePool,
    guid: Uuid,
    user_id: Uuid,
    status: ItemStatus,
) -> Result<()> {
    sqlx::query(
        "UPDATE tracked_items SET status = ?, updated_at = ? WHERE guid = ? AND user_id = ?",
    )
    .bind(status.as_str())
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .bind(user_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_item_purchased(
    pool: &SqlitePool,
    guid: Uuid,
    user_id: Uuid,
    is_purchased: bool,
) -> Result<()> {
    sqlx::query(
        "UPDATE tracked_items SET is_purchased = ?, updated_at = ? WHERE guid = ? AND user_id = ?",
    )
    .bind(is_purchased as i64)
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .bind(user_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

pub async fn set_item_series(
    pool: &SqlitePool,
    guid: Uuid,
    user_id: Uuid,
    series_id: Option<Uuid>,
) -> Result<()> {
    sqlx::query(
        "UPDATE tracked_items SET series_id = ?, updated_at = ? WHERE guid = ? AND user_id = ?",
    )
    .bind(series_id.map(|id| id.to_string()))
    .bind(Utc::now().to_rfc3339())
    .bind(guid.to_string())
    .bind(user_id.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Delete a tracked item (instances cascade)
pub async fn delete_item(pool: &SqlitePool, guid: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM tracked_items WHERE guid = ? AND user_id = ?")
        .bind(guid.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Statuses of every member item of a series
pub async fn member_statuses(
    pool: &SqlitePool,
    series_id: Uuid,
    user_id: Uuid,
) -> Result<Vec<ItemStatus>> {
    let rows: Vec<(String,)> =
        sqlx::query_as("SELECT status FROM tracked_items WHERE series_id = ? AND user_id = ?")
            .bind(series_id.to_string())
            .bind(user_id.to_string())
            .fetch_all(pool)
            .await?;

    rows.iter().map(|(s,)| ItemStatus::parse(s)).collect()
}

pub async fn count_series_members(
    pool: &SqlitePool,
    series_id: Uuid,
    user_id: Uuid,
) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tracked_items WHERE series_id = ? AND user_id = ?")
            .bind(series_id.to_string())
            .bind(user_id.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Library listing: the user's items, optionally narrowed by type and
/// status, newest-updated first
pub async fn load_library_summaries(
    pool: &SqlitePool,
    user_id: Uuid,
    media_type: Option<MediaType>,
    status: Option<ItemStatus>,
) -> Result<Vec<ItemSummary>> {
    let sql = format!(
        "{} WHERE ti.user_id = ?{}{} ORDER BY ti.updated_at DESC",
        SUMMARY_SELECT,
        if media_type.is_some() { " AND cm.type = ?" } else { "" },
        if status.is_some() { " AND ti.status = ?" } else { "" },
    );

    // binds are positional; order matches the clause order above
    let mut query = sqlx::query(&sql).bind(user_id.to_string());
    if let Some(media_type) = media_type {
        query = query.bind(media_type.as_str());
    }
    if let Some(status) = status {
        query = query.bind(status.as_str());
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter().map(summary_from_row).collect()
}

/// All of the user's items with the given status, title ascending
pub async fn load_summaries_by_status(
    pool: &SqlitePool,
    user_id: Uuid,
    status: ItemStatus,
) -> Result<Vec<ItemSummary>> {
    let sql = format!(
        "{} WHERE ti.user_id = ? AND ti.status = ? ORDER BY cm.title ASC",
        SUMMARY_SELECT
    );
    let rows = sqlx::query(&sql)
        .bind(user_id.to_string())
        .bind(status.as_str())
        .fetch_all(pool)
        .await?;
    rows.iter().map(summary_from_row).collect()
}

/// Member rows of the given series with the ordering inputs (series
/// position from the metadata extra JSON, release date). Ordering itself
/// happens in the engine.
pub async fn load_series_member_rows(
    pool: &SqlitePool,
    series_ids: &[Uuid],
    user_id: Uuid,
) -> Result<Vec<SeriesMemberRow>> {
    if series_ids.is_empty() {
        return Ok(Vec::new());
    }

    let sql = format!(
        "SELECT ti.guid, ti.status, ti.is_purchased, ti.series_id, ti.updated_at,
                cm.guid AS metadata_id, cm.title, cm.type, cm.cover_image_url,
                cm.release_date, cm.extra,
                s.name AS series_name
         FROM tracked_items ti
         INNER JOIN catalog_metadata cm ON cm.guid = ti.catalog_metadata_id
         INNER JOIN series s ON s.guid = ti.series_id
         WHERE ti.user_id = ? AND ti.series_id IN ({})",
        sql_placeholders(series_ids.len())
    );

    let mut query = sqlx::query(&sql).bind(user_id.to_string());
    for id in series_ids {
        query = query.bind(id.to_string());
    }

    let rows = query.fetch_all(pool).await?;
    rows.iter()
        .map(|row| {
            let summary = summary_from_row(row)?;
            let release_date: Option<String> = row.get("release_date");
            let extra: Option<String> = row.get("extra");
            let extra: Option<serde_json::Value> = extra
                .as_deref()
                .map(serde_json::from_str)
                .transpose()
                .map_err(|e| {
                    medley_common::Error::Internal(format!("Invalid extra JSON: {}", e))
                })?;

            Ok(SeriesMemberRow {
                summary,
                series_position: extra_series_position(extra.as_ref()),
                release_date: parse_date_opt(release_date)?,
            })
        })
        .collect()
}
