//! Catalog metadata database operations
//!
//! Catalog rows are shared across users and cached by
//! (external_id, external_source) so the same entry is never fetched twice.

use medley_common::db::models::CatalogMetadata;
use medley_common::types::MediaType;
use medley_common::Result;
use sqlx::{Row, SqlitePool};
use uuid::Uuid;

use super::{parse_date_opt, parse_guid, parse_timestamp};

/// Name of the series this entry belongs to, from the extra JSON
pub fn extra_series_name(extra: Option<&serde_json::Value>) -> Option<String> {
    extra
        .and_then(|e| e.get("series"))
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty())
        .map(|s| s.to_string())
}

/// Position of this entry within its series, from the extra JSON.
/// Accepts either a number or a numeric string (providers disagree).
pub fn extra_series_position(extra: Option<&serde_json::Value>) -> Option<f64> {
    let value = extra?.get("series_position")?;
    match value {
        serde_json::Value::Number(n) => n.as_f64(),
        serde_json::Value::String(s) if !s.is_empty() => s.parse().ok(),
        _ => None,
    }
}

/// Insert catalog metadata, treating a duplicate (external_id,
/// external_source) as success: the existing row's guid is returned and the
/// insert is a no-op.
pub async fn insert_metadata_ignore_conflict(
    pool: &SqlitePool,
    metadata: &CatalogMetadata,
) -> Result<Uuid> {
    sqlx::query(
        r#"
        INSERT INTO catalog_metadata (
            guid, type, title, description, cover_image_url, release_date,
            external_id, external_source, extra, created_at
        ) VALUES (?, ?, ?, ?, ?, ?, ?, ?, ?, ?)
        ON CONFLICT(external_id, external_source) DO NOTHING
        "#,
    )
    .bind(metadata.guid.to_string())
    .bind(metadata.media_type.as_str())
    .bind(&metadata.title)
    .bind(&metadata.description)
    .bind(&metadata.cover_image_url)
    .bind(metadata.release_date.map(|d| d.to_string()))
    .bind(&metadata.external_id)
    .bind(&metadata.external_source)
    .bind(
        metadata
            .extra
            .as_ref()
            .map(|e| e.to_string()),
    )
    .bind(metadata.created_at.to_rfc3339())
    .execute(pool)
    .await?;

    let guid: String = sqlx::query_scalar(
        "SELECT guid FROM catalog_metadata WHERE external_id = ? AND external_source = ?",
    )
    .bind(&metadata.external_id)
    .bind(&metadata.external_source)
    .fetch_one(pool)
    .await?;

    parse_guid(&guid)
}

/// Load catalog metadata by guid
pub async fn load_metadata(pool: &SqlitePool, guid: Uuid) -> Result<Option<CatalogMetadata>> {
    let row = sqlx::query(
        "SELECT guid, type, title, description, cover_image_url, release_date,
                external_id, external_source, extra, created_at
         FROM catalog_metadata WHERE guid = ?",
    )
    .bind(guid.to_string())
    .fetch_optional(pool)
    .await?;

    match row {
        Some(row) => {
            let guid_str: String = row.get("guid");
            let type_str: String = row.get("type");
            let release_date: Option<String> = row.get("release_date");
            let extra: Option<String> = row.get("extra");
            let created_at: String = row.get("created_at");

            Ok(Some(CatalogMetadata {
                guid: parse_guid(&guid_str)?,
                media_type: MediaType::parse(&type_str)?,
                title: row.get("title"),
                description: row.get("description"),
                cover_image_url: row.get("cover_image_url"),
                release_date: parse_date_opt(release_date)?,
                external_id: row.get("external_id"),
                external_source: row.get("external_source"),
                extra: extra
                    .as_deref()
                    .map(serde_json::from_str)
                    .transpose()
                    .map_err(|e| {
                        medley_common::Error::Internal(format!("Invalid extra JSON: {}", e))
                    })?,
                created_at: parse_timestamp(&created_at)?,
            }))
        }
        None => Ok(None),
    }
}

/// Update the user-editable descriptive fields
pub async fn update_metadata(
    pool: &SqlitePool,
    guid: Uuid,
    title: &str,
    description: Option<&str>,
    cover_image_url: Option<&str>,
    release_date: Option<&str>,
    extra: Option<&serde_json::Value>,
) -> Result<()> {
    sqlx::query(
        "UPDATE catalog_metadata
         SET title = ?, description = ?, cover_image_url = ?, release_date = ?, extra = ?
         WHERE guid = ?",
    )
    .bind(title)
    .bind(description)
    .bind(cover_image_url)
    .bind(release_date)
    .bind(extra.map(|e| e.to_string()))
    .bind(guid.to_string())
    .execute(pool)
    .await?;
    Ok(())
}

/// Set or clear the series name inside the extra JSON, preserving the other
/// extra fields
pub async fn set_extra_series_name(
    pool: &SqlitePool,
    guid: Uuid,
    series_name: Option<&str>,
) -> Result<()> {
    let extra_str: Option<String> =
        sqlx::query_scalar("SELECT extra FROM catalog_metadata WHERE guid = ?")
            .bind(guid.to_string())
            .fetch_one(pool)
            .await?;

    let mut extra: serde_json::Value = match extra_str.as_deref() {
        Some(s) => serde_json::from_str(s)
            .map_err(|e| medley_common::Error::Internal(format!("Invalid extra JSON: {}", e)))?,
        None => serde_json::json!({}),
    };

    if let Some(obj) = extra.as_object_mut() {
        match series_name {
            Some(name) => {
                obj.insert("series".to_string(), serde_json::Value::String(name.to_string()));
            }
            None => {
                obj.remove("series");
            }
        }
    }

    sqlx::query("UPDATE catalog_metadata SET extra = ? WHERE guid = ?")
        .bind(extra.to_string())
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

/// Tracking state of the caller's library entries for a batch of external
/// ids, keyed by (external_id, external_source). Search results use this
/// to show "already in your library".
pub async fn tracked_status_by_external(
    pool: &SqlitePool,
    user_id: Uuid,
    external_ids: &[String],
) -> Result<std::collections::HashMap<(String, String), (Uuid, medley_common::types::ItemStatus)>> {
    if external_ids.is_empty() {
        return Ok(std::collections::HashMap::new());
    }

    let sql = format!(
        "SELECT cm.external_id, cm.external_source, ti.guid, ti.status
         FROM catalog_metadata cm
         INNER JOIN tracked_items ti
             ON ti.catalog_metadata_id = cm.guid AND ti.user_id = ?
         WHERE cm.external_id IN ({})",
        super::sql_placeholders(external_ids.len())
    );

    let mut query = sqlx::query(&sql).bind(user_id.to_string());
    for id in external_ids {
        query = query.bind(id);
    }
    let rows = query.fetch_all(pool).await?;

    let mut tracked = std::collections::HashMap::new();
    for row in &rows {
        let external_id: String = row.get("external_id");
        let external_source: String = row.get("external_source");
        let guid: String = row.get("guid");
        let status: String = row.get("status");
        tracked.insert(
            (external_id, external_source),
            (
                parse_guid(&guid)?,
                medley_common::types::ItemStatus::parse(&status)?,
            ),
        );
    }
    Ok(tracked)
}

/// Number of tracked items (any user) referencing this metadata row
pub async fn count_items_referencing(pool: &SqlitePool, guid: Uuid) -> Result<i64> {
    let count: i64 =
        sqlx::query_scalar("SELECT COUNT(*) FROM tracked_items WHERE catalog_metadata_id = ?")
            .bind(guid.to_string())
            .fetch_one(pool)
            .await?;
    Ok(count)
}

/// Delete an orphaned metadata row
pub async fn delete_metadata(pool: &SqlitePool, guid: Uuid) -> Result<()> {
    sqlx::query("DELETE FROM catalog_metadata WHERE guid = ?")
        .bind(guid.to_string())
        .execute(pool)
        .await?;
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_common::db::init::init_memory_database;

    #[tokio::test]
    async fn test_duplicate_insert_returns_existing_row() {
        let pool = init_memory_database().await.unwrap();

        let first = CatalogMetadata::new(
            MediaType::Book,
            "Dune".to_string(),
            "hc-123".to_string(),
            "hardcover".to_string(),
        );
        let first_guid = insert_metadata_ignore_conflict(&pool, &first).await.unwrap();
        assert_eq!(first_guid, first.guid);

        // Same external identity, different guid: insert is ignored and the
        // original row wins
        let second = CatalogMetadata::new(
            MediaType::Book,
            "Dune (different fetch)".to_string(),
            "hc-123".to_string(),
            "hardcover".to_string(),
        );
        let second_guid = insert_metadata_ignore_conflict(&pool, &second).await.unwrap();
        assert_eq!(second_guid, first.guid);

        let loaded = load_metadata(&pool, first.guid).await.unwrap().unwrap();
        assert_eq!(loaded.title, "Dune");
    }

    #[tokio::test]
    async fn test_set_extra_series_name_preserves_other_fields() {
        let pool = init_memory_database().await.unwrap();

        let mut metadata = CatalogMetadata::new(
            MediaType::Book,
            "Dune".to_string(),
            "hc-123".to_string(),
            "hardcover".to_string(),
        );
        metadata.extra = Some(serde_json::json!({"author": "Frank Herbert"}));
        insert_metadata_ignore_conflict(&pool, &metadata).await.unwrap();

        set_extra_series_name(&pool, metadata.guid, Some("Dune Saga"))
            .await
            .unwrap();
        let loaded = load_metadata(&pool, metadata.guid).await.unwrap().unwrap();
        let extra = loaded.extra.unwrap();
        assert_eq!(extra["series"], "Dune Saga");
        assert_eq!(extra["author"], "Frank Herbert");

        set_extra_series_name(&pool, metadata.guid, None).await.unwrap();
        let loaded = load_metadata(&pool, metadata.guid).await.unwrap().unwrap();
        assert!(loaded.extra.unwrap().get("series").is_none());
    }

    #[test]
    fn test_extra_series_position_parsing() {
        let number = serde_json::json!({"series_position": 2.5});
        assert_eq!(extra_series_position(Some(&number)), Some(2.5));

        let string = serde_json::json!({"series_position": "3"});
        assert_eq!(extra_series_position(Some(&string)), Some(3.0));

        let empty = serde_json::json!({"series_position": ""});
        assert_eq!(extra_series_position(Some(&empty)), None);

        assert_eq!(extra_series_position(None), None);
    }
}
