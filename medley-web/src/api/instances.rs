//! Instance operations
//!
//! Saving or deleting an instance runs the full status cascade before the
//! response: the item status is re-derived and the item's series is
//! re-aggregated in the same request.

use axum::{
    extract::{Path, State},
    routing::{delete, post},
    Json, Router,
};
use chrono::{NaiveDate, Utc};
use medley_common::db::models::Instance;
use medley_common::types::{validate_rating, StructuredRating};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db;
use crate::engine::cascade::{self, CascadeEvent};
use crate::engine::status::InstanceDates;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SaveInstanceRequest {
    /// Update this instance; absent means create a new pass
    pub instance_id: Option<Uuid>,
    pub rating: Option<f64>,
    pub structured_rating: Option<StructuredRating>,
    pub review_text: Option<String>,
    /// `YYYY-MM-DD`
    pub started_at: Option<String>,
    /// `YYYY-MM-DD`; absent means the pass is still in progress
    pub completed_at: Option<String>,
}

#[derive(Debug, Serialize)]
pub struct SaveInstanceResponse {
    pub instance_id: Uuid,
    pub cascade: Vec<CascadeEvent>,
}

fn parse_date_field(value: Option<&str>, field: &str) -> ApiResult<Option<NaiveDate>> {
    value
        .filter(|s| !s.is_empty())
        .map(|s| {
            NaiveDate::parse_from_str(s, "%Y-%m-%d")
                .map_err(|e| ApiError::BadRequest(format!("Invalid {}: {}", field, e)))
        })
        .transpose()
}

/// Resolve the overall rating: validated user input wins; otherwise the
/// structured sub-rating average when all five dimensions are present.
fn resolve_rating(
    rating: Option<f64>,
    structured: Option<&StructuredRating>,
) -> ApiResult<Option<f64>> {
    if let Some(rating) = rating {
        validate_rating(rating).map_err(ApiError::from)?;
        return Ok(Some(rating));
    }
    Ok(structured.map(|s| s.overall()))
}

/// POST /api/items/:id/instances
pub async fn save_instance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(item_id): Path<Uuid>,
    Json(payload): Json<SaveInstanceRequest>,
) -> ApiResult<Json<SaveInstanceResponse>> {
    let item = db::items::load_item(&state.db, item_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Item {} not found", item_id)))?;

    // Validation happens before anything reaches the deriver
    if let Some(structured) = &payload.structured_rating {
        structured.validate().map_err(ApiError::from)?;
    }
    let rating = resolve_rating(payload.rating, payload.structured_rating.as_ref())?;
    let started_at = parse_date_field(payload.started_at.as_deref(), "started_at")?;
    let completed_at = parse_date_field(payload.completed_at.as_deref(), "completed_at")?;

    let now = Utc::now();
    let instance = match payload.instance_id {
        Some(instance_id) => {
            let existing = db::instances::load_instance(&state.db, instance_id)
                .await?
                .filter(|i| i.tracked_item_id == item_id)
                .ok_or_else(|| {
                    ApiError::NotFound(format!("Instance {} not found", instance_id))
                })?;
            Instance {
                rating,
                structured_rating: payload.structured_rating,
                review_text: payload.review_text.filter(|s| !s.is_empty()),
                started_at,
                completed_at,
                updated_at: now,
                ..existing
            }
        }
        None => Instance {
            guid: Uuid::new_v4(),
            tracked_item_id: item_id,
            rating,
            structured_rating: payload.structured_rating,
            review_text: payload.review_text.filter(|s| !s.is_empty()),
            started_at,
            completed_at,
            created_at: now,
            updated_at: now,
        },
    };

    db::instances::save_instance(&state.db, &instance).await?;

    let dates = InstanceDates {
        started_at,
        completed_at,
    };
    let cascade = cascade::instance_written(&state.db, &item, instance.guid, &dates).await?;

    Ok(Json(SaveInstanceResponse {
        instance_id: instance.guid,
        cascade,
    }))
}

#[derive(Debug, Serialize)]
pub struct DeleteInstanceResponse {
    pub cascade: Vec<CascadeEvent>,
}

/// DELETE /api/instances/:id
pub async fn delete_instance(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(instance_id): Path<Uuid>,
) -> ApiResult<Json<DeleteInstanceResponse>> {
    let instance = db::instances::load_instance(&state.db, instance_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Instance {} not found", instance_id)))?;

    // ownership check through the owning item
    let item = db::items::load_item(&state.db, instance.tracked_item_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("Instance {} not found", instance_id)))?;

    db::instances::delete_instance(&state.db, instance_id).await?;
    let cascade = cascade::instance_deleted(&state.db, &item, instance_id).await?;

    Ok(Json(DeleteInstanceResponse { cascade }))
}

/// Build instance routes
pub fn instance_routes() -> Router<AppState> {
    Router::new()
        .route("/api/items/:id/instances", post(save_instance))
        .route("/api/instances/:id", delete(delete_instance))
}

#[cfg(test)]
mod tests {
    use super::*;
    use medley_common::types::RatingDimension;

    fn dim(rating: u8) -> RatingDimension {
        RatingDimension {
            rating,
            comment: None,
        }
    }

    #[test]
    fn test_resolve_rating_prefers_explicit() {
        let structured = StructuredRating {
            setting: dim(5),
            character: dim(5),
            plot: dim(5),
            enjoyment: dim(5),
            emotional_impact: dim(5),
        };
        assert_eq!(
            resolve_rating(Some(7.5), Some(&structured)).unwrap(),
            Some(7.5)
        );
        // all five set and no explicit rating: average on the 0-10 scale
        assert_eq!(resolve_rating(None, Some(&structured)).unwrap(), Some(10.0));
        assert_eq!(resolve_rating(None, None).unwrap(), None);
    }

    #[test]
    fn test_resolve_rating_rejects_invalid() {
        assert!(resolve_rating(Some(11.0), None).is_err());
        assert!(resolve_rating(Some(7.25), None).is_err());
    }

    #[test]
    fn test_parse_date_field() {
        assert_eq!(parse_date_field(None, "started_at").unwrap(), None);
        assert_eq!(parse_date_field(Some(""), "started_at").unwrap(), None);
        assert!(parse_date_field(Some("2024-01-01"), "started_at")
            .unwrap()
            .is_some());
        assert!(parse_date_field(Some("01/01/2024"), "started_at").is_err());
    }
}
