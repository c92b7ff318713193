//! Instance database operations
//!
//! Instances are the individual read/watch/play passes of a tracked item.
//! Their date ranges drive the status cascade; the queries here also feed
//! the dashboard and view engines.

use chrono::NaiveDate;
use medley_common::db::models::Instance;
use medley_common::types::StructuredRating;
use medley_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use std::collections::HashMap;
use uuid::Uuid;

use super::items::ItemSummary;
use super::{parse_date_opt, parse_guid, parse_timestamp, sql_placeholders};
use crate::engine::status::InstanceDates;

/// Most recent completed instance of one item
#[derive(Debug, Clone)]
pub struct LatestCompleted {
    pub item_id: Uuid,
    pub rating: Option<f64>,
    pub completed_at: NaiveDate,
}

/// Item summary plus the completion date that qualified it
#[derive(Debug, Clone)]
pub struct CompletedItemRow {
    pub summary: ItemSummary,
    pub completed_at: NaiveDate,
}

/// Save instance to database (insert or full update by guid)
pub async fn save_instance(pool: &SqlitePool, instance: &Instance) -> Result<()> {
    let structured_rating = instance
        .structured_rating
        .as_ref()
        .map(serde_json::to_string)
        .transpose()
        .map_err(|e| {
            medley_common::Error::Internal(format!("Failed to serialize structured rating: {}", e))
        })?;

    sqlx::query(
        r#"
        INSERT INTO instances (
            guid, tracked_item_id, rating, structured_rating, review_text,
            started_at, completed_at, created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(guid) DO UPDATE SET
            rating = excluded.rating,
            structured_rating = excluded.structured_rating,
            review_text = excluded.review_text,
            started_at = excluded.started_at,
            completed_at = excluded.completed_at,
            updated_at = excluded.updated_at
        "#,
    )
    .bind(instance.guid.to_string())
    .bind(instance.tracked_item_id.to_string())
    .bind(instance.rating)
    .bind(structured_rating)
    .bind(&instance.review_text)
    .bind(instance.started_at.map(|d| d.to_string()))
    .bind(instance.completed_at.map(|d| d.to_string()))
    .bind(instance.created_at.to_rfc3339())
    .bind(instance.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn instance_from_row(row: &SqliteRow) -> Result<Instance> {
    let guid: String = row.get("guid");
    let tracked_item_id: String = row.get("tracked_item_id");
    let structured_rating: Option<String> = row.get("structured_rating");
    let started_at: Option<String> = row.get("started_at");
    let completed_at: Option<String> = row.get("completed_at");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let structured_rating: Option<StructuredRating> = structured_rating
        .as_deref()
        .map(serde_json::from_str)
        .transpose()
        .map_err(|e| {
            medley_common::Error::Internal(format!("Invalid structured rating JSON: {}", e))
        })?;

    Ok(Instance {
        guid: parse_guid(&guid)?,
        tracked_item_id: parse_guid(&tracked_item_id)?,
        rating: row.get("rating"),
        structured_rating,
        review_text: row.get("review_text"),
        started_at: parse_date_opt(started_at)?,
        completed_at: parse_date_opt(completed_at)?,
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Load instance by guid
pub async fn load_instance(pool: &SqlitePool, guid: Uuid) -> Result<Option<Instance>> {
    let row = sqlx::query(
        "SELECT guid, tracked_item_id, rating, structured_rating, review_text,
                started_at, completed_at, created_at, updated_at
         FROM instances WHERE guid = ?",
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(instance_from_row).transpose()
}

/// Delete instance by guid
pub async fn delete_instance(pool: &SqlitePool, guid: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM instances WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// All instances of an item, oldest pass first (instance order is derived
/// from creation time, not stored)
pub async fn load_instances_for_item(pool: &SqlitePool, item_id: Uuid) -> Result<Vec<Instance>> {
    let rows = sqlx::query(
        "SELECT guid, tracked_item_id, rating, structured_rating, review_text,
                started_at, completed_at, created_at, updated_at
         FROM instances WHERE tracked_item_id = ?
         ORDER BY created_at ASC, guid ASC",
    )
    .bind(item_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(instance_from_row).collect()
}

/// Date ranges of every instance of an item (delete-recompute input)
pub async fn instance_dates_for_item(
    pool: &SqlitePool,
    item_id: Uuid,
) -> Result<Vec<InstanceDates>> {
    let rows = sqlx::query(
        "SELECT started_at, completed_at FROM instances WHERE tracked_item_id = ?",
    )
    .bind(item_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let started_at: Option<String> = row.get("started_at");
            let completed_at: Option<String> = row.get("completed_at");
            Ok(InstanceDates {
                started_at: parse_date_opt(started_at)?,
                completed_at: parse_date_opt(completed_at)?,
            })
        })
        .collect()
}

/// Most recent completed instance per item, newest pass wins.
/// Items with no completed instance are simply absent from the result.
pub async fn latest_completed_per_item(
    pool: &SqlitePool,
    item_ids: &[Uuid],
) -> Result<HashMap<Uuid, LatestCompleted>> {
    if item_ids.is_empty() {
        return Ok(HashMap::new());
    }

    let sql = format!(
        "SELECT tracked_item_id, rating, completed_at
         FROM instances
         WHERE tracked_item_id IN ({}) AND completed_at IS NOT NULL
         ORDER BY tracked_item_id, created_at DESC, guid DESC",
        sql_placeholders(item_ids.len())
    );

    let mut query = sqlx::query(&sql);
    for id in item_ids {
        query = query.bind(id.to_string());
    }
    let rows = query.fetch_all(pool).await?;

    let mut latest = HashMap::new();
    for row in &rows {
        let item_id: String = row.get("tracked_item_id");
        let item_id = parse_guid(&item_id)?;
        if latest.contains_key(&item_id) {
            continue;
        }
        let completed_at: Option<String> = row.get("completed_at");
        let completed_at = parse_date_opt(completed_at)?
            .ok_or_else(|| medley_common::Error::Internal("completed_at vanished".to_string()))?;
        latest.insert(
            item_id,
            LatestCompleted {
                item_id,
                rating: row.get("rating"),
                completed_at,
            },
        );
    }
    Ok(latest)
}

/// Items of this user with an instance completed on or after the cutoff,
/// joined with metadata and series name. Ordered per item newest pass
/// first so the caller can take the first row per item.
pub async fn completed_in_window(
    pool: &SqlitePool,
    user_id: Uuid,
    cutoff: NaiveDate,
) -> Result<Vec<CompletedItemRow>> {
    let rows = sqlx::query(
        "SELECT ti.guid, ti.status, ti.is_purchased, ti.series_id, ti.updated_at,
                cm.guid AS metadata_id, cm.title, cm.type, cm.cover_image_url,
                s.name AS series_name,
                i.completed_at
         FROM instances i
         INNER JOIN tracked_items ti ON ti.guid = i.tracked_item_id
         INNER JOIN catalog_metadata cm ON cm.guid = ti.catalog_metadata_id
         LEFT JOIN series s ON s.guid = ti.series_id
         WHERE ti.user_id = ? AND i.completed_at IS NOT NULL AND i.completed_at >= ?
         ORDER BY ti.guid, i.created_at DESC, i.guid DESC",
    )
    .bind(user_id.to_string())
    .bind(cutoff.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter()
        .map(|row| {
            let summary = super::items::summary_from_row(row)?;
            let completed_at: Option<String> = row.get("completed_at");
            let completed_at = parse_date_opt(completed_at)?.ok_or_else(|| {
                medley_common::Error::Internal("completed_at vanished".to_string())
            })?;
            Ok(CompletedItemRow {
                summary,
                completed_at,
            })
        })
        .collect()
}

/// Years in which each of the user's items has a completed instance
/// (view-engine input for the completed-in-range predicate)
pub async fn completed_years_by_item(
    pool: &SqlitePool,
    user_id: Uuid,
) -> Result<HashMap<Uuid, Vec<i32>>> {
    use chrono::Datelike;

    let rows = sqlx::query(
        "SELECT i.tracked_item_id, i.completed_at
         FROM instances i
         INNER JOIN tracked_items ti ON ti.guid = i.tracked_item_id
         WHERE ti.user_id = ? AND i.completed_at IS NOT NULL",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    let mut years: HashMap<Uuid, Vec<i32>> = HashMap::new();
    for row in &rows {
        let item_id: String = row.get("tracked_item_id");
        let completed_at: Option<String> = row.get("completed_at");
        if let Some(date) = parse_date_opt(completed_at)? {
            years
                .entry(parse_guid(&item_id)?)
                .or_default()
                .push(date.year());
        }
    }
    Ok(years)
}
