//! View execution
//!
//! Applies a saved filter/sort specification over the user's items or
//! series. Filters are AND-combined; fields that do not apply to the
//! view's subject are ignored, matching what the view editor can produce.

use chrono::{Datelike, NaiveDate};
use medley_common::db::models::{Series, View};
use medley_common::types::{ItemStatus, SortDirection, ViewFilters, ViewSubject};
use medley_common::Result;
use serde::Serialize;
use sqlx::SqlitePool;
use uuid::Uuid;

use crate::db;
use crate::db::items::ItemSummary;

/// One item result row with the denormalized rating and latest completion
#[derive(Debug, Clone, Serialize)]
pub struct ItemViewRow {
    #[serde(flatten)]
    pub summary: ItemSummary,
    pub rating: f64,
    pub completed_at: Option<NaiveDate>,
    #[serde(skip)]
    pub completed_years: Vec<i32>,
}

/// One series result row with the member count
#[derive(Debug, Clone, Serialize)]
pub struct SeriesViewRow {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: medley_common::types::MediaType,
    pub status: ItemStatus,
    pub rating: f64,
    pub is_complete: bool,
    pub item_count: i64,
    #[serde(skip)]
    pub updated_at: chrono::DateTime<chrono::Utc>,
}

#[derive(Debug, Serialize)]
#[serde(untagged)]
pub enum ViewResults {
    Items(Vec<ItemViewRow>),
    Series(Vec<SeriesViewRow>),
}

/// Resolve the completed-year predicate to an inclusive year range.
/// "This calendar year" beats an explicit range when both are set.
fn completed_year_range(
    filters: &ViewFilters,
    current_year: i32,
) -> Option<(Option<i32>, Option<i32>)> {
    if filters.completed_this_year == Some(true) {
        return Some((Some(current_year), Some(current_year)));
    }
    if filters.completed_year_start.is_none() && filters.completed_year_end.is_none() {
        return None;
    }
    Some((filters.completed_year_start, filters.completed_year_end))
}

fn year_in_range(year: i32, range: (Option<i32>, Option<i32>)) -> bool {
    if let Some(start) = range.0 {
        if year < start {
            return false;
        }
    }
    if let Some(end) = range.1 {
        if year > end {
            return false;
        }
    }
    true
}

/// Apply item filters. The series-completeness field is a series-subject
/// filter and is ignored here.
pub fn filter_items(
    rows: Vec<ItemViewRow>,
    filters: &ViewFilters,
    current_year: i32,
) -> Vec<ItemViewRow> {
    let year_range = completed_year_range(filters, current_year);

    rows.into_iter()
        .filter(|row| {
            if let Some(types) = &filters.media_types {
                if !types.is_empty() && !types.contains(&row.summary.media_type) {
                    return false;
                }
            }
            if let Some(statuses) = &filters.statuses {
                if !statuses.is_empty() && !statuses.contains(&row.summary.status) {
                    return false;
                }
            }
            if let Some(purchased) = filters.is_purchased {
                if row.summary.is_purchased != purchased {
                    return false;
                }
            }
            if let Some(range) = year_range {
                // existential: any instance completed within the range
                if !row.completed_years.iter().any(|y| year_in_range(*y, range)) {
                    return false;
                }
            }
            true
        })
        .collect()
}

/// Apply series filters. The purchased and completed-year fields are
/// item-subject filters and are ignored here.
pub fn filter_series(rows: Vec<SeriesViewRow>, filters: &ViewFilters) -> Vec<SeriesViewRow> {
    rows.into_iter()
        .filter(|row| {
            if let Some(types) = &filters.media_types {
                if !types.is_empty() && !types.contains(&row.media_type) {
                    return false;
                }
            }
            if let Some(statuses) = &filters.statuses {
                if !statuses.is_empty() && !statuses.contains(&row.status) {
                    return false;
                }
            }
            if let Some(is_complete) = filters.is_series_complete {
                if row.is_complete != is_complete {
                    return false;
                }
            }
            true
        })
        .collect()
}

fn apply_direction(ordering: std::cmp::Ordering, direction: SortDirection) -> std::cmp::Ordering {
    match direction {
        SortDirection::Asc => ordering,
        SortDirection::Desc => ordering.reverse(),
    }
}

/// Sort item rows. Default with no declared field: newest updated first.
pub fn sort_items(rows: &mut [ItemViewRow], filters: &ViewFilters) {
    let direction = filters.sort_direction.unwrap_or(SortDirection::Asc);

    match filters.sort_by.as_deref() {
        Some("title") => rows.sort_by(|a, b| {
            apply_direction(a.summary.title.cmp(&b.summary.title), direction)
        }),
        Some("rating") => rows.sort_by(|a, b| {
            apply_direction(
                a.rating
                    .partial_cmp(&b.rating)
                    .unwrap_or(std::cmp::Ordering::Equal),
                direction,
            )
        }),
        Some("completed_at") => rows.sort_by(|a, b| {
            // absent completion dates sort last in either direction
            match (a.completed_at, b.completed_at) {
                (Some(x), Some(y)) => apply_direction(x.cmp(&y), direction),
                (Some(_), None) => std::cmp::Ordering::Less,
                (None, Some(_)) => std::cmp::Ordering::Greater,
                (None, None) => std::cmp::Ordering::Equal,
            }
        }),
        Some("updated_at") => rows.sort_by(|a, b| {
            apply_direction(a.summary.updated_at.cmp(&b.summary.updated_at), direction)
        }),
        _ => rows.sort_by(|a, b| b.summary.updated_at.cmp(&a.summary.updated_at)),
    }
}

/// Sort series rows. Default with no declared field: name ascending.
pub fn sort_series(rows: &mut [SeriesViewRow], filters: &ViewFilters) {
    let direction = filters.sort_direction.unwrap_or(SortDirection::Asc);

    match filters.sort_by.as_deref() {
        Some("updated_at") => rows.sort_by(|a, b| {
            apply_direction(a.updated_at.cmp(&b.updated_at), direction)
        }),
        Some("rating") => rows.sort_by(|a, b| {
            apply_direction(
                a.rating
                    .partial_cmp(&b.rating)
                    .unwrap_or(std::cmp::Ordering::Equal),
                direction,
            )
        }),
        Some("item_count") => rows.sort_by(|a, b| {
            apply_direction(a.item_count.cmp(&b.item_count), direction)
        }),
        Some("name") => rows.sort_by(|a, b| apply_direction(a.name.cmp(&b.name), direction)),
        _ => rows.sort_by(|a, b| a.name.cmp(&b.name)),
    }
}

async fn item_rows(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<ItemViewRow>> {
    let summaries = db::items::load_library_summaries(pool, user_id, None, None).await?;
    let ids: Vec<Uuid> = summaries.iter().map(|s| s.id).collect();
    let latest = db::instances::latest_completed_per_item(pool, &ids).await?;
    let mut years = db::instances::completed_years_by_item(pool, user_id).await?;

    Ok(summaries
        .into_iter()
        .map(|summary| {
            let latest = latest.get(&summary.id);
            let completed_years = years.remove(&summary.id).unwrap_or_default();
            ItemViewRow {
                rating: latest.and_then(|l| l.rating).unwrap_or(0.0),
                completed_at: latest.map(|l| l.completed_at),
                completed_years,
                summary,
            }
        })
        .collect())
}

async fn series_rows(pool: &SqlitePool, user_id: Uuid) -> Result<Vec<SeriesViewRow>> {
    let all: Vec<Series> = db::series::list_all_series(pool, user_id).await?;
    let ids: Vec<Uuid> = all.iter().map(|s| s.guid).collect();
    let counts = db::series::item_counts_for_series(pool, &ids, user_id).await?;

    Ok(all
        .into_iter()
        .map(|series| SeriesViewRow {
            item_count: counts.get(&series.guid).copied().unwrap_or(0),
            id: series.guid,
            name: series.name,
            media_type: series.media_type,
            status: series.status,
            rating: series.rating.unwrap_or(0.0),
            is_complete: series.is_complete,
            updated_at: series.updated_at,
        })
        .collect())
}

/// Execute a view against current data. `today` fixes the "this calendar
/// year" predicate for tests.
pub async fn run_view(
    pool: &SqlitePool,
    user_id: Uuid,
    view: &View,
    today: NaiveDate,
) -> Result<ViewResults> {
    match view.subject {
        ViewSubject::Items => {
            let rows = item_rows(pool, user_id).await?;
            let mut rows = filter_items(rows, &view.filters, today.year());
            sort_items(&mut rows, &view.filters);
            Ok(ViewResults::Items(rows))
        }
        ViewSubject::Series => {
            let rows = series_rows(pool, user_id).await?;
            let mut rows = filter_series(rows, &view.filters);
            sort_series(&mut rows, &view.filters);
            Ok(ViewResults::Series(rows))
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::{DateTime, Utc};
    use medley_common::types::MediaType;

    fn item_row(
        title: &str,
        media_type: MediaType,
        status: ItemStatus,
        is_purchased: bool,
        completed_years: Vec<i32>,
    ) -> ItemViewRow {
        ItemViewRow {
            summary: ItemSummary {
                id: Uuid::new_v4(),
                status,
                is_purchased,
                metadata_id: Uuid::new_v4(),
                title: title.to_string(),
                media_type,
                cover_image_url: None,
                series_id: None,
                series_name: None,
                updated_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
            },
            rating: 0.0,
            completed_at: None,
            completed_years,
        }
    }

    #[test]
    fn test_filters_are_and_combined() {
        let rows = vec![
            item_row("Purchased book", MediaType::Book, ItemStatus::Backlog, true, vec![]),
            item_row("Unpurchased book", MediaType::Book, ItemStatus::Backlog, false, vec![]),
            item_row("Purchased movie", MediaType::Movie, ItemStatus::Backlog, true, vec![]),
        ];

        let filters = ViewFilters {
            media_types: Some(vec![MediaType::Book]),
            is_purchased: Some(true),
            ..Default::default()
        };

        let filtered = filter_items(rows, &filters, 2024);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].summary.title, "Purchased book");
    }

    #[test]
    fn test_completed_year_range_is_existential() {
        let rows = vec![
            item_row("Finished 2022 and 2024", MediaType::Book, ItemStatus::Completed, false, vec![2022, 2024]),
            item_row("Finished 2020", MediaType::Book, ItemStatus::Completed, false, vec![2020]),
            item_row("Never finished", MediaType::Book, ItemStatus::InProgress, false, vec![]),
        ];

        let filters = ViewFilters {
            completed_year_start: Some(2023),
            completed_year_end: Some(2024),
            ..Default::default()
        };

        let filtered = filter_items(rows, &filters, 2024);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].summary.title, "Finished 2022 and 2024");
    }

    #[test]
    fn test_completed_this_year_uses_reference_year() {
        let rows = vec![
            item_row("This year", MediaType::Book, ItemStatus::Completed, false, vec![2024]),
            item_row("Last year", MediaType::Book, ItemStatus::Completed, false, vec![2023]),
        ];

        let filters = ViewFilters {
            completed_this_year: Some(true),
            ..Default::default()
        };

        let filtered = filter_items(rows, &filters, 2024);
        assert_eq!(filtered.len(), 1);
        assert_eq!(filtered[0].summary.title, "This year");
    }

    #[test]
    fn test_series_only_filter_is_ignored_for_items() {
        let rows = vec![item_row("Book", MediaType::Book, ItemStatus::Backlog, false, vec![])];

        let filters = ViewFilters {
            is_series_complete: Some(true),
            ..Default::default()
        };

        // silently ignored, not an error and not a match-nothing filter
        let filtered = filter_items(rows, &filters, 2024);
        assert_eq!(filtered.len(), 1);
    }

    #[test]
    fn test_default_item_sort_is_newest_updated_first() {
        let mut older = item_row("Older", MediaType::Book, ItemStatus::Backlog, false, vec![]);
        older.summary.updated_at = DateTime::<Utc>::from_timestamp(1_000, 0).unwrap();
        let mut newer = item_row("Newer", MediaType::Book, ItemStatus::Backlog, false, vec![]);
        newer.summary.updated_at = DateTime::<Utc>::from_timestamp(2_000, 0).unwrap();

        let mut rows = vec![older, newer];
        sort_items(&mut rows, &ViewFilters::default());
        assert_eq!(rows[0].summary.title, "Newer");
    }

    #[test]
    fn test_item_sort_by_title_desc() {
        let mut rows = vec![
            item_row("Alpha", MediaType::Book, ItemStatus::Backlog, false, vec![]),
            item_row("Zebra", MediaType::Book, ItemStatus::Backlog, false, vec![]),
        ];

        let filters = ViewFilters {
            sort_by: Some("title".to_string()),
            sort_direction: Some(SortDirection::Desc),
            ..Default::default()
        };
        sort_items(&mut rows, &filters);
        assert_eq!(rows[0].summary.title, "Zebra");
    }

    fn series_row(name: &str, media_type: MediaType, is_complete: bool, item_count: i64) -> SeriesViewRow {
        SeriesViewRow {
            id: Uuid::new_v4(),
            name: name.to_string(),
            media_type,
            status: ItemStatus::Backlog,
            rating: 0.0,
            is_complete,
            item_count,
            updated_at: DateTime::<Utc>::from_timestamp(0, 0).unwrap(),
        }
    }

    #[test]
    fn test_series_completeness_filter_and_default_sort() {
        let rows = vec![
            series_row("Zeta", MediaType::Book, true, 3),
            series_row("Alpha", MediaType::Book, true, 2),
            series_row("Ongoing", MediaType::Book, false, 5),
        ];

        let filters = ViewFilters {
            is_series_complete: Some(true),
            ..Default::default()
        };

        let mut filtered = filter_series(rows, &filters);
        sort_series(&mut filtered, &filters);

        let names: Vec<&str> = filtered.iter().map(|r| r.name.as_str()).collect();
        assert_eq!(names, vec!["Alpha", "Zeta"]);
    }

    #[test]
    fn test_series_sort_by_item_count_desc() {
        let mut rows = vec![
            series_row("Small", MediaType::Book, false, 1),
            series_row("Large", MediaType::Book, false, 9),
        ];

        let filters = ViewFilters {
            sort_by: Some("item_count".to_string()),
            sort_direction: Some(SortDirection::Desc),
            ..Default::default()
        };
        sort_series(&mut rows, &filters);
        assert_eq!(rows[0].name, "Large");
    }
}
