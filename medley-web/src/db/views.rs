//! Saved view database operations

use chrono::Utc;
use medley_common::db::models::View;
use medley_common::types::{ViewFilters, ViewSubject};
use medley_common::Result;
use sqlx::sqlite::SqliteRow;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_guid, parse_timestamp};

/// Save a new view
pub async fn save_view(pool: &SqlitePool, view: &View) -> Result<()> {
    let filters = serde_json::to_string(&view.filters)
        .map_err(|e| medley_common::Error::Internal(format!("Failed to serialize filters: {}", e)))?;

    sqlx::query(
        r#"
        INSERT INTO views (
            guid, user_id, name, subject, filters, display_order,
            created_at, updated_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?)
        "#,
    )
    .bind(view.guid.to_string())
    .bind(view.user_id.to_string())
    .bind(&view.name)
    .bind(view.subject.as_str())
    .bind(filters)
    .bind(view.display_order)
    .bind(view.created_at.to_rfc3339())
    .bind(view.updated_at.to_rfc3339())
    .execute(pool)
    .await?;

    Ok(())
}

fn view_from_row(row: &SqliteRow) -> Result<View> {
    let guid: String = row.get("guid");
    let user_id: String = row.get("user_id");
    let subject: String = row.get("subject");
    let filters: String = row.get("filters");
    let created_at: String = row.get("created_at");
    let updated_at: String = row.get("updated_at");

    let filters: ViewFilters = serde_json::from_str(&filters)
        .map_err(|e| medley_common::Error::Internal(format!("Invalid filters JSON: {}", e)))?;

    Ok(View {
        guid: parse_guid(&guid)?,
        user_id: parse_guid(&user_id)?,
        name: row.get("name"),
        subject: ViewSubject::parse(&subject)?,
        filters,
        display_order: row.get("display_order"),
        created_at: parse_timestamp(&created_at)?,
        updated_at: parse_timestamp(&updated_at)?,
    })
}

/// Load a view scoped to its owner
pub async fn load_view(pool: &SqlitePool, guid: Uuid, user_id: Uuid) -> Result<Option<View>> {
    let row = sqlx::query(
        "SELECT guid, user_id, name, subject, filters, display_order, created_at, updated_at
         FROM views WHERE guid = ? AND user_id = ?",
    )
    .bind(guid.to_string())
    .bind(user_id.to_string())
    .fetch_optional(pool)
    .await?;

    row.as_ref().map(view_from_row).transpose()
}

/// The user's views in display order
pub async fn list_views(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<View>> {
    let rows = sqlx::query(
        "SELECT guid, user_id, name, subject, filters, display_order, created_at, updated_at
         FROM views WHERE user_id = ? ORDER BY display_order ASC",
    )
    .bind(user_id.to_string())
    .fetch_all(pool)
    .await?;

    rows.iter().map(view_from_row).collect()
}

/// Update name / filters / display order (subject is immutable)
pub async fn update_view(
    pool: &SqlitePool,
    guid: Uuid,
    user_id: Uuid,
    name: &str,
    filters: &ViewFilters,
    display_order: Option<i64>,
) -> Result<()> {
    let filters = serde_json::to_string(filters)
        .map_err(|e| medley_common::Error::Internal(format!("Failed to serialize filters: {}", e)))?;

    match display_order {
        Some(order) => {
            sqlx::query(
                "UPDATE views SET name = ?, filters = ?, display_order = ?, updated_at = ?
                 WHERE guid = ? AND user_id = ?",
            )
            .bind(name)
            .bind(filters)
            .bind(order)
            .bind(Utc::now().to_rfc3339())
            .bind(guid.to_string())
            .bind(user_id.to_string())
            .execute(pool)
            .await?;
        }
        None => {
            sqlx::query(
                "UPDATE views SET name = ?, filters = ?, updated_at = ?
                 WHERE guid = ? AND user_id = ?",
            )
            .bind(name)
            .bind(filters)
            .bind(Utc::now().to_rfc3339())
            .bind(guid.to_string())
            .bind(user_id.to_string())
            .execute(pool)
            .await?;
        }
    }
    Ok(())
}

/// Delete a view
pub async fn delete_view(pool: &SqlitePool, guid: Uuid, user_id: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM views WHERE guid = ? AND user_id = ?")
        .bind(guid.to_string())
        .bind(user_id.to_string())
        .execute(pool)
        .await?;
    Ok(())
}
