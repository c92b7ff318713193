//! Library listing and membership
//!
//! Adding a catalog entry upserts the shared metadata row (duplicate
//! inserts are success, returning the existing row), materializes the
//! series the entry belongs to, and creates the tracked item. Removal
//! cascades to instances and cleans up orphaned series and metadata.

use axum::{
    extract::{Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::NaiveDate;
use medley_common::db::models::{CatalogMetadata, Series, TrackedItem};
use medley_common::types::{ItemStatus, MediaType};
use serde::{Deserialize, Serialize};
use tracing::{debug, info};
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db;
use crate::db::items::ItemSummary;
use crate::engine::cascade;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct LibraryParams {
    #[serde(rename = "type")]
    pub media_type: Option<MediaType>,
    pub status: Option<ItemStatus>,
}

/// Library row with the denormalized latest-completed rating and date
#[derive(Debug, Serialize)]
pub struct LibraryEntry {
    #[serde(flatten)]
    pub item: ItemSummary,
    pub rating: f64,
    pub completed_at: Option<NaiveDate>,
}

/// GET /api/library?type=...&status=...
pub async fn get_library(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<LibraryParams>,
) -> ApiResult<Json<Vec<LibraryEntry>>> {
    let items =
        db::items::load_library_summaries(&state.db, user_id, params.media_type, params.status)
            .await?;

    let ids: Vec<Uuid> = items.iter().map(|i| i.id).collect();
    let latest = db::instances::latest_completed_per_item(&state.db, &ids).await?;

    Ok(Json(
        items
            .into_iter()
            .map(|item| {
                let latest = latest.get(&item.id);
                LibraryEntry {
                    rating: latest.and_then(|l| l.rating).unwrap_or(0.0),
                    completed_at: latest.map(|l| l.completed_at),
                    item,
                }
            })
            .collect(),
    ))
}

#[derive(Debug, Deserialize)]
pub struct AddToLibraryRequest {
    pub external_id: String,
    pub external_source: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    /// `YYYY-MM-DD`
    pub release_date: Option<String>,
    #[serde(default)]
    pub extra: serde_json::Value,
}

#[derive(Debug, Serialize)]
pub struct AddToLibraryResponse {
    pub tracked_item_id: Uuid,
}

/// Find the user's series for this name, or create it, enriching a new
/// series with provider info (description, completeness) when available.
async fn find_or_create_series(
    state: &AppState,
    user_id: Uuid,
    name: &str,
    media_type: MediaType,
    external_source: &str,
) -> ApiResult<Uuid> {
    if let Some(existing) =
        db::series::find_series_by_name(&state.db, user_id, name, media_type).await?
    {
        return Ok(existing.guid);
    }

    let mut series = Series::new(user_id, name.to_string(), media_type);

    if external_source == "hardcover" {
        if let Some(client) = &state.providers.hardcover {
            // enrichment only; a provider failure must not block the add
            match client.series_info(name).await {
                Ok(Some(info)) => {
                    series.description = info.description;
                    series.is_complete = info.is_complete;
                }
                Ok(None) => {}
                Err(e) => debug!(series = name, error = %e, "Series info lookup failed"),
            }
        }
    }

    db::series::save_series(&state.db, &series).await?;
    info!(series_id = %series.guid, name, "Series created");
    Ok(series.guid)
}

/// POST /api/library
pub async fn add_to_library(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<AddToLibraryRequest>,
) -> ApiResult<Json<AddToLibraryResponse>> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
    }

    // TMDB movies: collection (franchise) info lives on the details
    // endpoint, not on search results, so resolve it now.
    let mut extra = payload.extra.clone();
    if extra.is_null() {
        extra = serde_json::json!({});
    }
    if payload.external_source == "tmdb" && payload.media_type == MediaType::Movie {
        if let Some(client) = &state.providers.tmdb {
            match client.movie_collection(&payload.external_id).await {
                Ok(Some(collection)) => {
                    if let Some(obj) = extra.as_object_mut() {
                        obj.insert("series".to_string(), serde_json::json!(collection));
                    }
                }
                Ok(None) => {}
                Err(e) => debug!(error = %e, "TMDB collection lookup failed"),
            }
        }
    }

    let mut metadata = CatalogMetadata::new(
        payload.media_type,
        payload.title.clone(),
        payload.external_id.clone(),
        payload.external_source.clone(),
    );
    metadata.description = payload.description.clone();
    metadata.cover_image_url = payload.cover_image_url.clone();
    metadata.release_date = payload
        .release_date
        .as_deref()
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| ApiError::BadRequest(format!("Invalid release date: {}", e)))
        })
        .transpose()?;
    metadata.extra = match extra.as_object() {
        Some(obj) if !obj.is_empty() => Some(extra.clone()),
        _ => None,
    };

    // duplicate catalog inserts are success: the existing row comes back
    let metadata_id = db::metadata::insert_metadata_ignore_conflict(&state.db, &metadata).await?;

    // Materialize the series the entry belongs to, if any
    let series_name = extra
        .get("series")
        .and_then(|v| v.as_str())
        .filter(|s| !s.is_empty());
    let series_id = match series_name {
        Some(name) => Some(
            find_or_create_series(
                &state,
                user_id,
                name,
                payload.media_type,
                &payload.external_source,
            )
            .await?,
        ),
        None => None,
    };

    // Already tracked? Backfill the series link if the item predates it.
    if let Some(existing) = db::items::load_item_by_metadata(&state.db, metadata_id, user_id).await?
    {
        if let (Some(series_id), None) = (series_id, existing.series_id) {
            db::items::set_item_series(&state.db, existing.guid, user_id, Some(series_id)).await?;
            cascade::member_changed(&state.db, user_id, series_id).await?;
        }
        return Ok(Json(AddToLibraryResponse {
            tracked_item_id: existing.guid,
        }));
    }

    let item = TrackedItem::new(user_id, metadata_id, series_id);
    db::items::save_item(&state.db, &item).await?;
    info!(item_id = %item.guid, title = payload.title, "Added to library");

    Ok(Json(AddToLibraryResponse {
        tracked_item_id: item.guid,
    }))
}

#[derive(Debug, Deserialize)]
pub struct RemoveFromLibraryRequest {
    pub metadata_id: Uuid,
}

/// POST /api/library/remove
pub async fn remove_from_library(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<RemoveFromLibraryRequest>,
) -> ApiResult<()> {
    let item = db::items::load_item_by_metadata(&state.db, payload.metadata_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Library entry not found".to_string()))?;

    // Delete the tracking row (instances cascade)
    db::items::delete_item(&state.db, item.guid, user_id).await?;
    info!(item_id = %item.guid, "Removed from library");

    // The item's series: delete when now empty, else re-aggregate
    if let Some(series_id) = item.series_id {
        let remaining = db::items::count_series_members(&state.db, series_id, user_id).await?;
        if remaining == 0 {
            db::series::delete_series(&state.db, series_id, user_id).await?;
            debug!(%series_id, "Deleted empty series");
        } else {
            cascade::member_changed(&state.db, user_id, series_id).await?;
        }
    }

    // Shared metadata: delete once no user references it
    let references = db::metadata::count_items_referencing(&state.db, payload.metadata_id).await?;
    if references == 0 {
        db::metadata::delete_metadata(&state.db, payload.metadata_id).await?;
        debug!(metadata_id = %payload.metadata_id, "Deleted orphaned metadata");
    }

    Ok(())
}

/// Build library routes
pub fn library_routes() -> Router<AppState> {
    Router::new()
        .route("/api/library", get(get_library).post(add_to_library))
        .route("/api/library/remove", post(remove_from_library))
}
