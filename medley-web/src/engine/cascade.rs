//! Status recomputation cascade
//!
//! Instance writes ripple outward: the instance row changes, the owning
//! item's status is re-derived, and the item's series (if any) is
//! re-aggregated. The cascade runs synchronously inside the triggering
//! request and reports what it did as a list of events, one per stage, so
//! each stage stays observable and testable on its own.

use medley_common::db::models::TrackedItem;
use medley_common::types::ItemStatus;
use medley_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db;
use crate::engine::series::sync_series_status;
use crate::engine::status::{
    status_after_instance_delete, status_after_instance_upsert, InstanceDates,
};

/// One stage of the recomputation cascade
#[derive(Debug, Clone, PartialEq, Eq, Serialize)]
#[serde(tag = "stage", rename_all = "snake_case")]
pub enum CascadeEvent {
    InstanceWritten {
        instance_id: Uuid,
        item_id: Uuid,
    },
    InstanceDeleted {
        instance_id: Uuid,
        item_id: Uuid,
    },
    ItemStatusRecomputed {
        item_id: Uuid,
        status: ItemStatus,
    },
    SeriesStatusRecomputed {
        series_id: Uuid,
        status: ItemStatus,
    },
}

/// Run the cascade after an instance create/update.
///
/// The edited instance alone decides the new item status; a write without
/// dates leaves the item (and therefore the series) untouched.
pub async fn instance_written(
    pool: &SqlitePool,
    item: &TrackedItem,
    instance_id: Uuid,
    dates: &InstanceDates,
) -> Result<Vec<CascadeEvent>> {
    let mut events = vec![CascadeEvent::InstanceWritten {
        instance_id,
        item_id: item.guid,
    }];

    let Some(new_status) = status_after_instance_upsert(dates) else {
        return Ok(events);
    };

    db::items::update_item_status(pool, item.guid, item.user_id, new_status).await?;
    debug!(item_id = %item.guid, status = new_status.as_str(), "Item status derived");
    events.push(CascadeEvent::ItemStatusRecomputed {
        item_id: item.guid,
        status: new_status,
    });

    if let Some(series_id) = item.series_id {
        let just_completed = new_status == ItemStatus::Completed;
        if let Some(status) =
            sync_series_status(pool, series_id, item.user_id, just_completed).await?
        {
            events.push(CascadeEvent::SeriesStatusRecomputed { series_id, status });
        }
    }

    Ok(events)
}

/// Run the cascade after an instance delete.
///
/// The deleted instance may have been the one driving the prior status, so
/// the item is re-derived from the full remaining set; this stage always
/// writes.
pub async fn instance_deleted(
    pool: &SqlitePool,
    item: &TrackedItem,
    instance_id: Uuid,
) -> Result<Vec<CascadeEvent>> {
    let mut events = vec![CascadeEvent::InstanceDeleted {
        instance_id,
        item_id: item.guid,
    }];

    let remaining = db::instances::instance_dates_for_item(pool, item.guid).await?;
    let new_status = status_after_instance_delete(&remaining);

    db::items::update_item_status(pool, item.guid, item.user_id, new_status).await?;
    debug!(item_id = %item.guid, status = new_status.as_str(), "Item status re-derived after delete");
    events.push(CascadeEvent::ItemStatusRecomputed {
        item_id: item.guid,
        status: new_status,
    });

    if let Some(series_id) = item.series_id {
        if let Some(status) = sync_series_status(pool, series_id, item.user_id, false).await? {
            events.push(CascadeEvent::SeriesStatusRecomputed { series_id, status });
        }
    }

    Ok(events)
}

/// Re-aggregate a series after a member's status changed for any other
/// reason (direct status edit, membership change, item removal). Runs for
/// both the old and new series when membership changes.
pub async fn member_changed(
    pool: &SqlitePool,
    user_id: Uuid,
    series_id: Uuid,
) -> Result<Vec<CascadeEvent>> {
    let mut events = Vec::new();
    if let Some(status) = sync_series_status(pool, series_id, user_id, false).await? {
        events.push(CascadeEvent::SeriesStatusRecomputed { series_id, status });
    }
    Ok(events)
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{NaiveDate, Utc};
    use medley_common::db::init::init_memory_database;
    use medley_common::db::models::{CatalogMetadata, Instance};
    use medley_common::types::MediaType;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    async fn setup_item(pool: &SqlitePool) -> TrackedItem {
        let user_id = Uuid::new_v4();
        let metadata = CatalogMetadata::new(
            MediaType::Book,
            "Dune".to_string(),
            "hc-1".to_string(),
            "hardcover".to_string(),
        );
        db::metadata::insert_metadata_ignore_conflict(pool, &metadata)
            .await
            .unwrap();
        let item = TrackedItem::new(user_id, metadata.guid, None);
        db::items::save_item(pool, &item).await.unwrap();
        item
    }

    async fn stored_status(pool: &SqlitePool, item: &TrackedItem) -> ItemStatus {
        db::items::load_item(pool, item.guid, item.user_id)
            .await
            .unwrap()
            .unwrap()
            .status
    }

    #[tokio::test]
    async fn test_full_lifecycle_backlog_to_backlog() {
        let pool = init_memory_database().await.unwrap();
        let item = setup_item(&pool).await;

        // created with no instances
        assert_eq!(stored_status(&pool, &item).await, ItemStatus::Backlog);

        // start a pass
        let now = Utc::now();
        let mut instance = Instance {
            guid: Uuid::new_v4(),
            tracked_item_id: item.guid,
            rating: None,
            structured_rating: None,
            review_text: None,
            started_at: Some(date("2024-01-01")),
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        db::instances::save_instance(&pool, &instance).await.unwrap();
        let dates = InstanceDates {
            started_at: instance.started_at,
            completed_at: instance.completed_at,
        };
        let events = instance_written(&pool, &item, instance.guid, &dates)
            .await
            .unwrap();
        assert_eq!(stored_status(&pool, &item).await, ItemStatus::InProgress);
        assert!(events.contains(&CascadeEvent::ItemStatusRecomputed {
            item_id: item.guid,
            status: ItemStatus::InProgress,
        }));

        // finish the same pass
        instance.completed_at = Some(date("2024-01-10"));
        db::instances::save_instance(&pool, &instance).await.unwrap();
        let dates = InstanceDates {
            started_at: instance.started_at,
            completed_at: instance.completed_at,
        };
        instance_written(&pool, &item, instance.guid, &dates)
            .await
            .unwrap();
        assert_eq!(stored_status(&pool, &item).await, ItemStatus::Completed);

        // delete the pass: nothing remains, back to backlog
        db::instances::delete_instance(&pool, instance.guid).await.unwrap();
        let events = instance_deleted(&pool, &item, instance.guid).await.unwrap();
        assert_eq!(stored_status(&pool, &item).await, ItemStatus::Backlog);
        assert!(events.contains(&CascadeEvent::ItemStatusRecomputed {
            item_id: item.guid,
            status: ItemStatus::Backlog,
        }));
    }

    #[tokio::test]
    async fn test_dateless_write_preserves_user_status() {
        let pool = init_memory_database().await.unwrap();
        let item = setup_item(&pool).await;

        db::items::update_item_status(&pool, item.guid, item.user_id, ItemStatus::NextUp)
            .await
            .unwrap();

        // a review-only instance carries no dates and must not clobber
        // the user-set status
        let now = Utc::now();
        let instance = Instance {
            guid: Uuid::new_v4(),
            tracked_item_id: item.guid,
            rating: None,
            structured_rating: None,
            review_text: Some("notes".to_string()),
            started_at: None,
            completed_at: None,
            created_at: now,
            updated_at: now,
        };
        db::instances::save_instance(&pool, &instance).await.unwrap();
        let events = instance_written(&pool, &item, instance.guid, &InstanceDates::default())
            .await
            .unwrap();

        assert_eq!(stored_status(&pool, &item).await, ItemStatus::NextUp);
        assert_eq!(events.len(), 1);
    }
}
