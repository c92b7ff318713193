//! Tracked item operations
//!
//! Detail view, direct status edits, purchase toggle, metadata edits, and
//! series membership changes. Anything that can move a member item's
//! status re-aggregates the affected series before the response goes out.

use axum::{
    extract::{Path, State},
    routing::post,
    Json, Router,
};
use chrono::NaiveDate;
use medley_common::db::models::Series;
use medley_common::types::{ItemStatus, MediaType, StructuredRating};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db;
use crate::engine::cascade;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Serialize)]
pub struct InstanceDetails {
    pub id: Uuid,
    pub rating: f64,
    pub structured_rating: Option<StructuredRating>,
    pub review_text: Option<String>,
    pub started_at: Option<NaiveDate>,
    pub completed_at: Option<NaiveDate>,
}

#[derive(Debug, Serialize)]
pub struct ItemDetails {
    pub id: Uuid,
    pub status: ItemStatus,
    pub is_purchased: bool,
    pub series_id: Option<Uuid>,
    pub series_name: Option<String>,
    pub metadata_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub extra: Option<serde_json::Value>,
    pub instances: Vec<InstanceDetails>,
}

/// GET /api/items/:id
pub async fn get_item_details(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(item_id): Path<Uuid>,
) -> ApiResult<Json<ItemDetails>> {
    let item = db::items::load_item(&state.db, item_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", item_id)))?;

    let metadata = db::metadata::load_metadata(&state.db, item.catalog_metadata_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Catalog metadata missing".to_string()))?;

    let series_name = match item.series_id {
        Some(series_id) => db::series::load_series(&state.db, series_id, user_id)
            .await?
            .map(|s| s.name),
        None => None,
    };

    let instances = db::instances::load_instances_for_item(&state.db, item_id).await?;

    Ok(Json(ItemDetails {
        id: item.guid,
        status: item.status,
        is_purchased: item.is_purchased,
        series_id: item.series_id,
        series_name,
        metadata_id: metadata.guid,
        title: metadata.title,
        media_type: metadata.media_type,
        description: metadata.description,
        cover_image_url: metadata.cover_image_url,
        release_date: metadata.release_date,
        extra: metadata.extra,
        instances: instances
            .into_iter()
            .map(|i| InstanceDetails {
                id: i.guid,
                rating: i.rating.unwrap_or(0.0),
                structured_rating: i.structured_rating,
                review_text: i.review_text,
                started_at: i.started_at,
                completed_at: i.completed_at,
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateStatusRequest {
    pub status: ItemStatus,
}

/// POST /api/items/:id/status
pub async fn update_item_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateStatusRequest>,
) -> ApiResult<()> {
    let item = db::items::load_item(&state.db, item_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", item_id)))?;

    db::items::update_item_status(&state.db, item_id, user_id, payload.status).await?;
    info!(%item_id, status = payload.status.as_str(), "Item status set");

    if let Some(series_id) = item.series_id {
        cascade::member_changed(&state.db, user_id, series_id).await?;
    }
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct TogglePurchasedRequest {
    pub is_purchased: bool,
}

/// POST /api/items/:id/purchased
pub async fn toggle_purchased(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<TogglePurchasedRequest>,
) -> ApiResult<()> {
    db::items::load_item(&state.db, item_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", item_id)))?;

    db::items::set_item_purchased(&state.db, item_id, user_id, payload.is_purchased).await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateMetadataRequest {
    pub title: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    /// `YYYY-MM-DD`
    pub release_date: Option<String>,
    pub extra: Option<serde_json::Value>,
}

/// POST /api/metadata/:id
pub async fn update_metadata(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Path(metadata_id): Path<Uuid>,
    Json(payload): Json<UpdateMetadataRequest>,
) -> ApiResult<()> {
    if payload.title.trim().is_empty() {
        return Err(ApiError::BadRequest("Title cannot be empty".to_string()));
    }
    if let Some(date) = payload.release_date.as_deref() {
        NaiveDate::parse_from_str(date, "%Y-%m-%d")
            .map_err(|e| ApiError::BadRequest(format!("Invalid release date: {}", e)))?;
    }

    db::metadata::load_metadata(&state.db, metadata_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Metadata {} not found", metadata_id)))?;

    db::metadata::update_metadata(
        &state.db,
        metadata_id,
        &payload.title,
        payload.description.as_deref(),
        payload.cover_image_url.as_deref(),
        payload.release_date.as_deref(),
        payload.extra.as_ref(),
    )
    .await?;
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateItemSeriesRequest {
    /// Join this existing series (None leaves or stays without a series)
    pub series_id: Option<Uuid>,
    /// Create a new series with this name and join it instead
    pub new_series_name: Option<String>,
}

/// POST /api/items/:id/series
///
/// Membership changes re-aggregate both sides: the series the item left
/// and the one it joined.
pub async fn update_item_series(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<UpdateItemSeriesRequest>,
) -> ApiResult<()> {
    let item = db::items::load_item(&state.db, item_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", item_id)))?;
    let old_series_id = item.series_id;

    let metadata = db::metadata::load_metadata(&state.db, item.catalog_metadata_id)
        .await?
        .ok_or_else(|| ApiError::NotFound("Catalog metadata missing".to_string()))?;

    let (resolved_series_id, resolved_series_name) = match (&payload.new_series_name, payload.series_id) {
        (Some(name), _) => {
            if name.trim().is_empty() {
                return Err(ApiError::BadRequest("Series name cannot be empty".to_string()));
            }
            let series = Series::new(user_id, name.clone(), metadata.media_type);
            db::series::save_series(&state.db, &series).await?;
            info!(series_id = %series.guid, name, "Series created");
            (Some(series.guid), Some(name.clone()))
        }
        (None, Some(series_id)) => {
            let series = db::series::load_series(&state.db, series_id, user_id)
                .await?
                .ok_or_else(|| ApiError::NotFound(format!("Series {} not found", series_id)))?;
            (Some(series_id), Some(series.name))
        }
        (None, None) => (None, None),
    };

    db::items::set_item_series(&state.db, item_id, user_id, resolved_series_id).await?;

    // Keep the series name in the shared metadata extra consistent with
    // the membership
    db::metadata::set_extra_series_name(
        &state.db,
        metadata.guid,
        resolved_series_name.as_deref(),
    )
    .await?;

    if let Some(old_id) = old_series_id {
        cascade::member_changed(&state.db, user_id, old_id).await?;
    }
    if let Some(new_id) = resolved_series_id {
        if Some(new_id) != old_series_id {
            cascade::member_changed(&state.db, user_id, new_id).await?;
        }
    }

    Ok(())
}

/// Build item routes
pub fn item_routes() -> Router<AppState> {
    use axum::routing::get;

    Router::new()
        .route("/api/items/:id", get(get_item_details))
        .route("/api/items/:id/status", post(update_item_status))
        .route("/api/items/:id/purchased", post(toggle_purchased))
        .route("/api/items/:id/series", post(update_item_series))
        .route("/api/metadata/:id", post(update_metadata))
}
