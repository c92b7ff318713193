//! Series status aggregation
//!
//! Keeps a series' stored status consistent with its member items, and
//! computes the read-time activity override shown on series details.

use chrono::{Duration, NaiveDate};
use medley_common::types::ItemStatus;
use medley_common::Result;
use sqlx::SqlitePool;
use tracing::debug;
use uuid::Uuid;

use crate::db;

/// Aggregate a series status from its member statuses.
///
/// Returns the status to store, or None to leave the stored value alone
/// (which preserves manually-set values like on_hold or
/// waiting_for_next_release). An empty member set is a no-op.
///
/// `just_completed` marks that the triggering event was a member reaching
/// completed: a completion inside a not-yet-finished series counts as
/// renewed activity.
pub fn aggregate_series_status(
    member_statuses: &[ItemStatus],
    just_completed: bool,
) -> Option<ItemStatus> {
    if member_statuses.is_empty() {
        return None;
    }

    if member_statuses.contains(&ItemStatus::InProgress) {
        return Some(ItemStatus::InProgress);
    }

    if member_statuses.iter().all(|s| s.is_done()) {
        return Some(ItemStatus::Completed);
    }

    if just_completed {
        return Some(ItemStatus::InProgress);
    }

    None
}

/// Whether the displayed series status should be forced to in_progress:
/// any member actively in progress, or any member completion within the
/// activity window (inclusive at exactly `window_days` ago).
pub fn activity_override(
    member_statuses: &[ItemStatus],
    latest_completions: &[NaiveDate],
    today: NaiveDate,
    window_days: i64,
) -> bool {
    if member_statuses.contains(&ItemStatus::InProgress) {
        return true;
    }
    let cutoff = today - Duration::days(window_days);
    latest_completions.iter().any(|d| *d >= cutoff)
}

/// Re-read member statuses and conditionally overwrite the series row.
/// Runs synchronously inside the triggering request; returns the stored
/// status when one was written.
pub async fn sync_series_status(
    pool: &SqlitePool,
    series_id: Uuid,
    user_id: Uuid,
    just_completed: bool,
) -> Result<Option<ItemStatus>> {
    let statuses = db::items::member_statuses(pool, series_id, user_id).await?;

    let new_status = aggregate_series_status(&statuses, just_completed);
    if let Some(status) = new_status {
        debug!(%series_id, status = status.as_str(), "Series status aggregated");
        db::series::update_series_status(pool, series_id, user_id, status).await?;
    }

    Ok(new_status)
}

#[cfg(test)]
mod tests {
    use super::*;
    use ItemStatus::*;

    #[test]
    fn test_in_progress_member_dominates() {
        assert_eq!(
            aggregate_series_status(&[Completed, InProgress, Backlog], false),
            Some(InProgress)
        );
        // dominance holds regardless of the trigger
        assert_eq!(
            aggregate_series_status(&[InProgress], true),
            Some(InProgress)
        );
    }

    #[test]
    fn test_completed_requires_full_coverage() {
        assert_eq!(
            aggregate_series_status(&[Completed, Dropped, Completed], false),
            Some(Completed)
        );
        // one more backlog item reverts eligibility
        assert_eq!(
            aggregate_series_status(&[Completed, Dropped, Completed, Backlog], false),
            None
        );
    }

    #[test]
    fn test_completion_in_unfinished_series_renews_activity() {
        assert_eq!(
            aggregate_series_status(&[Completed, Backlog], true),
            Some(InProgress)
        );
        // without the trigger, manual statuses are preserved
        assert_eq!(aggregate_series_status(&[Completed, Backlog], false), None);
    }

    #[test]
    fn test_empty_series_is_noop() {
        assert_eq!(aggregate_series_status(&[], false), None);
        assert_eq!(aggregate_series_status(&[], true), None);
    }

    #[test]
    fn test_activity_override_window_boundary() {
        let today = NaiveDate::parse_from_str("2024-06-30", "%Y-%m-%d").unwrap();
        let exactly_30 = NaiveDate::parse_from_str("2024-05-31", "%Y-%m-%d").unwrap();
        let days_31 = NaiveDate::parse_from_str("2024-05-30", "%Y-%m-%d").unwrap();

        assert!(activity_override(&[Completed], &[exactly_30], today, 30));
        assert!(!activity_override(&[Completed], &[days_31], today, 30));

        // an in-progress member overrides with no completions at all
        assert!(activity_override(&[InProgress], &[], today, 30));
    }

    mod db_backed {
        use super::*;
        use medley_common::db::init::init_memory_database;
        use medley_common::db::models::{CatalogMetadata, Series, TrackedItem};
        use medley_common::types::MediaType;

        async fn insert_member(
            pool: &SqlitePool,
            user_id: Uuid,
            series_id: Uuid,
            status: ItemStatus,
            n: usize,
        ) {
            let metadata = CatalogMetadata::new(
                MediaType::Book,
                format!("Book {}", n),
                format!("ext-{}", n),
                "hardcover".to_string(),
            );
            crate::db::metadata::insert_metadata_ignore_conflict(pool, &metadata)
                .await
                .unwrap();

            let mut item = TrackedItem::new(user_id, metadata.guid, Some(series_id));
            item.status = status;
            crate::db::items::save_item(pool, &item).await.unwrap();
        }

        #[tokio::test]
        async fn test_sync_writes_aggregate_and_preserves_manual() {
            let pool = init_memory_database().await.unwrap();
            let user_id = Uuid::new_v4();

            let mut series = Series::new(user_id, "Saga".to_string(), MediaType::Book);
            series.status = ItemStatus::OnHold;
            crate::db::series::save_series(&pool, &series).await.unwrap();

            insert_member(&pool, user_id, series.guid, ItemStatus::Completed, 1).await;
            insert_member(&pool, user_id, series.guid, ItemStatus::Backlog, 2).await;

            // No in-progress member, not fully done, no completion trigger:
            // the manual on_hold stays.
            let written = sync_series_status(&pool, series.guid, user_id, false)
                .await
                .unwrap();
            assert_eq!(written, None);
            let stored = crate::db::series::load_series(&pool, series.guid, user_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.status, ItemStatus::OnHold);

            // A completion trigger marks the series active again.
            let written = sync_series_status(&pool, series.guid, user_id, true)
                .await
                .unwrap();
            assert_eq!(written, Some(ItemStatus::InProgress));
            let stored = crate::db::series::load_series(&pool, series.guid, user_id)
                .await
                .unwrap()
                .unwrap();
            assert_eq!(stored.status, ItemStatus::InProgress);
        }
    }
}
