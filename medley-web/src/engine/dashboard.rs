//! Dashboard composition
//!
//! Builds the three curated dashboard lists: in-progress, recently
//! finished, and next-in-series. The selection and ordering rules live in
//! pure functions over plain rows; `compose_dashboard` wires them to the
//! database.

use chrono::{Duration, NaiveDate};
use medley_common::types::ItemStatus;
use medley_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::db;
use crate::db::instances::CompletedItemRow;
use crate::db::items::{ItemSummary, SeriesMemberRow};

/// One dashboard row: an item summary plus the denormalized rating of its
/// most recent completed instance (0 when there is none; displayed, never
/// persisted).
#[derive(Debug, Clone, Serialize)]
pub struct DashboardEntry {
    #[serde(flatten)]
    pub item: ItemSummary,
    pub rating: f64,
}

#[derive(Debug, Serialize)]
pub struct DashboardData {
    pub in_progress: Vec<DashboardEntry>,
    pub recently_finished: Vec<DashboardEntry>,
    pub next_in_series: Vec<DashboardEntry>,
}

/// Collapse window rows (pre-ordered per item, newest pass first) to one
/// row per item, then order the result by completion date descending.
pub fn latest_completion_per_item(rows: Vec<CompletedItemRow>) -> Vec<CompletedItemRow> {
    let mut seen = HashSet::new();
    let mut out: Vec<CompletedItemRow> = rows
        .into_iter()
        .filter(|row| seen.insert(row.summary.id))
        .collect();
    out.sort_by(|a, b| b.completed_at.cmp(&a.completed_at));
    out
}

/// Order series members: explicit series position first (ascending, absent
/// last), then release date (ascending, absent last), then title for
/// determinism.
pub fn order_series_members(members: &mut [SeriesMemberRow]) {
    members.sort_by(|a, b| {
        let pos = match (a.series_position, b.series_position) {
            (Some(x), Some(y)) => x.partial_cmp(&y).unwrap_or(std::cmp::Ordering::Equal),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        };
        pos.then_with(|| match (a.release_date, b.release_date) {
            (Some(x), Some(y)) => x.cmp(&y),
            (Some(_), None) => std::cmp::Ordering::Less,
            (None, Some(_)) => std::cmp::Ordering::Greater,
            (None, None) => std::cmp::Ordering::Equal,
        })
        .then_with(|| a.summary.title.cmp(&b.summary.title))
    });
}

/// Infer the next item per series: walk the ordered member list, find the
/// last position that is active (in progress or recently finished), and
/// take the first backlog item strictly after it. Series with no active
/// member or no later backlog item contribute nothing.
pub fn infer_next_in_series(
    members_by_series: &HashMap<Uuid, Vec<SeriesMemberRow>>,
    active_ids: &HashSet<Uuid>,
) -> Vec<ItemSummary> {
    let mut inferred = Vec::new();

    for members in members_by_series.values() {
        let last_active = members
            .iter()
            .rposition(|m| active_ids.contains(&m.summary.id));
        let Some(last_active) = last_active else {
            continue;
        };

        if let Some(next) = members[last_active + 1..]
            .iter()
            .find(|m| m.summary.status == ItemStatus::Backlog)
        {
            inferred.push(next.summary.clone());
        }
    }

    // stable presentation order across requests
    inferred.sort_by(|a, b| a.title.cmp(&b.title));
    inferred
}

/// Union explicit next-up entries with inferred ones: explicit entries come
/// first and win duplicates by item id.
pub fn merge_next_up(explicit: Vec<ItemSummary>, inferred: Vec<ItemSummary>) -> Vec<ItemSummary> {
    let explicit_ids: HashSet<Uuid> = explicit.iter().map(|i| i.id).collect();
    let mut merged = explicit;
    merged.extend(inferred.into_iter().filter(|i| !explicit_ids.contains(&i.id)));
    merged
}

async fn attach_ratings(
    pool: &SqlitePool,
    items: Vec<ItemSummary>,
) -> Result<Vec<DashboardEntry>> {
    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let latest = db::instances::latest_completed_per_item(pool, &ids).await?;

    Ok(items
        .into_iter()
        .map(|item| {
            let rating = latest
                .get(&item.id)
                .and_then(|l| l.rating)
                .unwrap_or(0.0);
            DashboardEntry { item, rating }
        })
        .collect())
}

/// Build the three dashboard lists for one user. `today` is passed in so
/// the window boundary is testable against a fixed reference date.
pub async fn compose_dashboard(
    pool: &SqlitePool,
    user_id: Uuid,
    today: NaiveDate,
    window_days: i64,
) -> Result<DashboardData> {
    let in_progress =
        db::items::load_summaries_by_status(pool, user_id, ItemStatus::InProgress).await?;

    let cutoff = today - Duration::days(window_days);
    let window_rows = db::instances::completed_in_window(pool, user_id, cutoff).await?;
    let recently_finished = latest_completion_per_item(window_rows);

    let explicit = db::items::load_summaries_by_status(pool, user_id, ItemStatus::NextUp).await?;

    // Series touched by active items feed the inference
    let mut series_ids: Vec<Uuid> = in_progress
        .iter()
        .filter_map(|i| i.series_id)
        .chain(recently_finished.iter().filter_map(|r| r.summary.series_id))
        .collect();
    series_ids.sort();
    series_ids.dedup();

    let active_ids: HashSet<Uuid> = in_progress
        .iter()
        .map(|i| i.id)
        .chain(recently_finished.iter().map(|r| r.summary.id))
        .collect();

    let member_rows = db::items::load_series_member_rows(pool, &series_ids, user_id).await?;
    let mut members_by_series: HashMap<Uuid, Vec<SeriesMemberRow>> = HashMap::new();
    for row in member_rows {
        if let Some(series_id) = row.summary.series_id {
            members_by_series.entry(series_id).or_default().push(row);
        }
    }
    for members in members_by_series.values_mut() {
        order_series_members(members);
    }

    let inferred = infer_next_in_series(&members_by_series, &active_ids);
    let next_in_series = merge_next_up(explicit, inferred);

    Ok(DashboardData {
        in_progress: attach_ratings(pool, in_progress).await?,
        recently_finished: attach_ratings(
            pool,
            recently_finished.into_iter().map(|r| r.summary).collect(),
        )
        .await?,
        next_in_series: attach_ratings(pool, next_in_series).await?,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use medley_common::types::MediaType;

    fn date(s: &str) -> NaiveDate {
        NaiveDate::parse_from_str(s, "%Y-%m-%d").unwrap()
    }

    fn summary(title: &str, status: ItemStatus, series_id: Option<Uuid>) -> ItemSummary {
        ItemSummary {
            id: Uuid::new_v4(),
            status,
            is_purchased: false,
            metadata_id: Uuid::new_v4(),
            title: title.to_string(),
            media_type: MediaType::Book,
            cover_image_url: None,
            series_id,
            series_name: series_id.map(|_| "Saga".to_string()),
            updated_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    fn member(title: &str, status: ItemStatus, series_id: Uuid, pos: f64) -> SeriesMemberRow {
        SeriesMemberRow {
            summary: summary(title, status, Some(series_id)),
            series_position: Some(pos),
            release_date: None,
        }
    }

    #[test]
    fn test_next_in_series_picks_first_backlog_after_last_active() {
        let series_id = Uuid::new_v4();
        let a = member("A", ItemStatus::Completed, series_id, 1.0);
        let b = member("B", ItemStatus::InProgress, series_id, 2.0);
        let c = member("C", ItemStatus::Backlog, series_id, 3.0);
        let d = member("D", ItemStatus::Backlog, series_id, 4.0);

        let active_ids: HashSet<Uuid> = [a.summary.id, b.summary.id].into_iter().collect();
        let mut members_by_series = HashMap::new();
        members_by_series.insert(series_id, vec![a, b, c.clone(), d]);

        let inferred = infer_next_in_series(&members_by_series, &active_ids);
        assert_eq!(inferred.len(), 1);
        assert_eq!(inferred[0].id, c.summary.id);
    }

    #[test]
    fn test_series_without_active_member_contributes_nothing() {
        let series_id = Uuid::new_v4();
        let a = member("A", ItemStatus::Backlog, series_id, 1.0);
        let mut members_by_series = HashMap::new();
        members_by_series.insert(series_id, vec![a]);

        let inferred = infer_next_in_series(&members_by_series, &HashSet::new());
        assert!(inferred.is_empty());
    }

    #[test]
    fn test_backlog_before_last_active_is_skipped() {
        // [backlog, completed(active)]: the backlog item sits before the
        // last active position, so nothing is inferred
        let series_id = Uuid::new_v4();
        let a = member("A", ItemStatus::Backlog, series_id, 1.0);
        let b = member("B", ItemStatus::Completed, series_id, 2.0);

        let active_ids: HashSet<Uuid> = [b.summary.id].into_iter().collect();
        let mut members_by_series = HashMap::new();
        members_by_series.insert(series_id, vec![a, b]);

        let inferred = infer_next_in_series(&members_by_series, &active_ids);
        assert!(inferred.is_empty());
    }

    #[test]
    fn test_merge_next_up_dedups_with_explicit_first() {
        let series_id = Uuid::new_v4();
        let shared = summary("Shared", ItemStatus::NextUp, Some(series_id));
        let explicit_only = summary("Explicit", ItemStatus::NextUp, None);
        let inferred_only = summary("Inferred", ItemStatus::Backlog, Some(series_id));

        let merged = merge_next_up(
            vec![explicit_only.clone(), shared.clone()],
            vec![shared.clone(), inferred_only.clone()],
        );

        let ids: Vec<Uuid> = merged.iter().map(|i| i.id).collect();
        assert_eq!(ids, vec![explicit_only.id, shared.id, inferred_only.id]);
    }

    #[test]
    fn test_series_order_position_then_release_date() {
        let series_id = Uuid::new_v4();
        let mut members = vec![
            SeriesMemberRow {
                summary: summary("No position, late", ItemStatus::Backlog, Some(series_id)),
                series_position: None,
                release_date: Some(date("2020-01-01")),
            },
            SeriesMemberRow {
                summary: summary("Second", ItemStatus::Backlog, Some(series_id)),
                series_position: Some(2.0),
                release_date: Some(date("1999-01-01")),
            },
            SeriesMemberRow {
                summary: summary("First", ItemStatus::Backlog, Some(series_id)),
                series_position: Some(1.0),
                release_date: Some(date("2005-01-01")),
            },
            SeriesMemberRow {
                summary: summary("No position, early", ItemStatus::Backlog, Some(series_id)),
                series_position: None,
                release_date: Some(date("2010-01-01")),
            },
        ];

        order_series_members(&mut members);
        let titles: Vec<&str> = members.iter().map(|m| m.summary.title.as_str()).collect();
        assert_eq!(
            titles,
            vec!["First", "Second", "No position, early", "No position, late"]
        );
    }

    #[test]
    fn test_latest_completion_per_item_dedup_and_order() {
        let item_a = summary("A", ItemStatus::Completed, None);
        let item_b = summary("B", ItemStatus::Completed, None);

        // rows arrive ordered per item, newest pass first
        let rows = vec![
            CompletedItemRow {
                summary: item_a.clone(),
                completed_at: date("2024-06-10"),
            },
            CompletedItemRow {
                summary: item_a.clone(),
                completed_at: date("2024-06-01"),
            },
            CompletedItemRow {
                summary: item_b.clone(),
                completed_at: date("2024-06-20"),
            },
        ];

        let deduped = latest_completion_per_item(rows);
        assert_eq!(deduped.len(), 2);
        // ordered by completion date descending
        assert_eq!(deduped[0].summary.id, item_b.id);
        assert_eq!(deduped[1].summary.id, item_a.id);
        assert_eq!(deduped[1].completed_at, date("2024-06-10"));
    }

    mod db_backed {
        use super::*;
        use medley_common::db::init::init_memory_database;
        use medley_common::db::models::{CatalogMetadata, Instance, TrackedItem};

        struct Fixture {
            pool: SqlitePool,
            user_id: Uuid,
            counter: u32,
        }

        impl Fixture {
            async fn new() -> Self {
                Self {
                    pool: init_memory_database().await.unwrap(),
                    user_id: Uuid::new_v4(),
                    counter: 0,
                }
            }

            async fn item(&mut self, title: &str, status: ItemStatus) -> TrackedItem {
                self.counter += 1;
                let metadata = CatalogMetadata::new(
                    MediaType::Book,
                    title.to_string(),
                    format!("ext-{}", self.counter),
                    "hardcover".to_string(),
                );
                db::metadata::insert_metadata_ignore_conflict(&self.pool, &metadata)
                    .await
                    .unwrap();
                let mut item = TrackedItem::new(self.user_id, metadata.guid, None);
                item.status = status;
                db::items::save_item(&self.pool, &item).await.unwrap();
                item
            }

            async fn completed_instance(
                &mut self,
                item: &TrackedItem,
                completed_at: NaiveDate,
                rating: Option<f64>,
            ) {
                let now = Utc::now();
                let instance = Instance {
                    guid: Uuid::new_v4(),
                    tracked_item_id: item.guid,
                    rating,
                    structured_rating: None,
                    review_text: None,
                    started_at: None,
                    completed_at: Some(completed_at),
                    created_at: now,
                    updated_at: now,
                };
                db::instances::save_instance(&self.pool, &instance).await.unwrap();
            }
        }

        #[tokio::test]
        async fn test_window_boundary_inclusive_at_exactly_window_days() {
            let mut fx = Fixture::new().await;
            let today = date("2024-06-30");

            let included = fx.item("Included", ItemStatus::Completed).await;
            fx.completed_instance(&included, date("2024-05-31"), Some(8.0))
                .await; // exactly 30 days ago

            let excluded = fx.item("Excluded", ItemStatus::Completed).await;
            fx.completed_instance(&excluded, date("2024-05-30"), Some(9.0))
                .await; // 31 days ago

            let data = compose_dashboard(&fx.pool, fx.user_id, today, 30)
                .await
                .unwrap();

            let titles: Vec<&str> = data
                .recently_finished
                .iter()
                .map(|e| e.item.title.as_str())
                .collect();
            assert_eq!(titles, vec!["Included"]);
            assert_eq!(data.recently_finished[0].rating, 8.0);
        }

        #[tokio::test]
        async fn test_in_progress_ordered_by_title_with_zero_default_rating() {
            let mut fx = Fixture::new().await;

            fx.item("Zebra", ItemStatus::InProgress).await;
            fx.item("Alpha", ItemStatus::InProgress).await;
            fx.item("Shelved", ItemStatus::Backlog).await;

            let data = compose_dashboard(&fx.pool, fx.user_id, date("2024-06-30"), 30)
                .await
                .unwrap();

            let titles: Vec<&str> = data
                .in_progress
                .iter()
                .map(|e| e.item.title.as_str())
                .collect();
            assert_eq!(titles, vec!["Alpha", "Zebra"]);
            // no completed instance: denormalized rating defaults to 0
            assert!(data.in_progress.iter().all(|e| e.rating == 0.0));
        }
    }
}
