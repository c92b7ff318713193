//! Series operations
//!
//! The details view carries the read-time auto-override: when a member is
//! in progress or recently finished, the displayed status is forced to
//! in_progress and flagged, so the UI disables the status control and
//! explains why. The stored status is never touched by the override.

use axum::{
    extract::{Path, Query, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use medley_common::types::{validate_rating, ItemStatus, MediaType};
use serde::{Deserialize, Serialize};
use tracing::info;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db;
use crate::engine::dashboard::order_series_members;
use crate::engine::series::activity_override;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SeriesListParams {
    #[serde(rename = "type")]
    pub media_type: MediaType,
}

#[derive(Debug, Serialize)]
pub struct SeriesListEntry {
    pub id: Uuid,
    pub name: String,
}

/// GET /api/series?type=...
pub async fn list_series(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SeriesListParams>,
) -> ApiResult<Json<Vec<SeriesListEntry>>> {
    let series = db::series::list_series_by_type(&state.db, user_id, params.media_type).await?;
    Ok(Json(
        series
            .into_iter()
            .map(|s| SeriesListEntry {
                id: s.guid,
                name: s.name,
            })
            .collect(),
    ))
}

#[derive(Debug, Serialize)]
pub struct SeriesItemEntry {
    pub id: Uuid,
    pub status: ItemStatus,
    pub is_purchased: bool,
    pub metadata_id: Uuid,
    pub title: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub cover_image_url: Option<String>,
    pub rating: f64,
}

#[derive(Debug, Serialize)]
pub struct SeriesDetails {
    pub id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    /// Displayed status: the stored value, or in_progress under the
    /// activity override
    pub status: ItemStatus,
    pub is_status_auto_overridden: bool,
    pub rating: f64,
    pub description: Option<String>,
    pub is_complete: bool,
    pub items: Vec<SeriesItemEntry>,
}

/// GET /api/series/:id
pub async fn get_series_details(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(series_id): Path<Uuid>,
) -> ApiResult<Json<SeriesDetails>> {
    let series = db::series::load_series(&state.db, series_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Series {} not found", series_id)))?;

    let mut members =
        db::items::load_series_member_rows(&state.db, &[series_id], user_id).await?;
    order_series_members(&mut members);

    let member_ids: Vec<Uuid> = members.iter().map(|m| m.summary.id).collect();
    let latest = db::instances::latest_completed_per_item(&state.db, &member_ids).await?;

    let statuses: Vec<ItemStatus> = members.iter().map(|m| m.summary.status).collect();
    let completions: Vec<chrono::NaiveDate> =
        latest.values().map(|l| l.completed_at).collect();
    let is_overridden = !members.is_empty()
        && activity_override(
            &statuses,
            &completions,
            Utc::now().date_naive(),
            state.config.series_activity_window_days,
        );

    Ok(Json(SeriesDetails {
        id: series.guid,
        name: series.name,
        media_type: series.media_type,
        status: if is_overridden {
            ItemStatus::InProgress
        } else {
            series.status
        },
        is_status_auto_overridden: is_overridden,
        rating: series.rating.unwrap_or(0.0),
        description: series.description,
        is_complete: series.is_complete,
        items: members
            .into_iter()
            .map(|m| SeriesItemEntry {
                rating: latest
                    .get(&m.summary.id)
                    .and_then(|l| l.rating)
                    .unwrap_or(0.0),
                id: m.summary.id,
                status: m.summary.status,
                is_purchased: m.summary.is_purchased,
                metadata_id: m.summary.metadata_id,
                title: m.summary.title,
                media_type: m.summary.media_type,
                cover_image_url: m.summary.cover_image_url,
            })
            .collect(),
    }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeriesStatusRequest {
    pub status: ItemStatus,
}

/// POST /api/series/:id/status
pub async fn update_series_status(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(series_id): Path<Uuid>,
    Json(payload): Json<UpdateSeriesStatusRequest>,
) -> ApiResult<()> {
    db::series::load_series(&state.db, series_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Series {} not found", series_id)))?;

    db::series::update_series_status(&state.db, series_id, user_id, payload.status).await?;
    info!(%series_id, status = payload.status.as_str(), "Series status set");
    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeriesRequest {
    pub name: String,
    pub description: Option<String>,
    pub is_complete: bool,
}

/// POST /api/series/:id
pub async fn update_series(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(series_id): Path<Uuid>,
    Json(payload): Json<UpdateSeriesRequest>,
) -> ApiResult<()> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("Series name cannot be empty".to_string()));
    }

    let series = db::series::load_series(&state.db, series_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Series {} not found", series_id)))?;
    let renamed = series.name != payload.name;

    db::series::update_series_fields(
        &state.db,
        series_id,
        user_id,
        &payload.name,
        payload.description.as_deref(),
        payload.is_complete,
    )
    .await?;

    // A rename propagates into each member's metadata extra so item detail
    // pages keep showing the current series name
    if renamed {
        let members =
            db::items::load_series_member_rows(&state.db, &[series_id], user_id).await?;
        for member in &members {
            db::metadata::set_extra_series_name(
                &state.db,
                member.summary.metadata_id,
                Some(&payload.name),
            )
            .await?;
        }
        info!(%series_id, name = payload.name, "Series renamed");
    }

    Ok(())
}

#[derive(Debug, Deserialize)]
pub struct UpdateSeriesRatingRequest {
    pub rating: Option<f64>,
}

/// POST /api/series/:id/rating
pub async fn update_series_rating(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(series_id): Path<Uuid>,
    Json(payload): Json<UpdateSeriesRatingRequest>,
) -> ApiResult<()> {
    if let Some(rating) = payload.rating {
        validate_rating(rating).map_err(ApiError::from)?;
    }

    db::series::load_series(&state.db, series_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Series {} not found", series_id)))?;

    db::series::update_series_rating(&state.db, series_id, user_id, payload.rating).await?;
    Ok(())
}

/// Build series routes
pub fn series_routes() -> Router<AppState> {
    Router::new()
        .route("/api/series", get(list_series))
        .route("/api/series/:id", get(get_series_details).post(update_series))
        .route("/api/series/:id/status", post(update_series_status))
        .route("/api/series/:id/rating", post(update_series_rating))
}
