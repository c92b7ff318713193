//! Saved view operations

use axum::{
    extract::{Path, State},
    routing::{get, post},
    Json, Router,
};
use chrono::Utc;
use medley_common::db::models::View;
use medley_common::types::{ViewFilters, ViewSubject};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::db;
use crate::engine::views::{run_view, ViewResults};
use crate::{ApiError, ApiResult, AppState};

/// New views land at the end of the sidebar unless ordered explicitly
const DEFAULT_DISPLAY_ORDER: i64 = 999;

/// GET /api/views
pub async fn get_views(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<Vec<View>>> {
    Ok(Json(db::views::list_views(&state.db, user_id).await?))
}

#[derive(Debug, Deserialize)]
pub struct CreateViewRequest {
    pub name: String,
    pub subject: ViewSubject,
    #[serde(default)]
    pub filters: ViewFilters,
    pub display_order: Option<i64>,
}

/// POST /api/views
pub async fn create_view(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Json(payload): Json<CreateViewRequest>,
) -> ApiResult<Json<View>> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("View name cannot be empty".to_string()));
    }

    let now = Utc::now();
    let view = View {
        guid: Uuid::new_v4(),
        user_id,
        name: payload.name,
        subject: payload.subject,
        filters: payload.filters,
        display_order: payload.display_order.unwrap_or(DEFAULT_DISPLAY_ORDER),
        created_at: now,
        updated_at: now,
    };
    db::views::save_view(&state.db, &view).await?;

    Ok(Json(view))
}

#[derive(Debug, Serialize)]
pub struct ViewResultsResponse {
    pub view: View,
    pub results: ViewResults,
}

/// GET /api/views/:id/results
pub async fn get_view_results(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(view_id): Path<Uuid>,
) -> ApiResult<Json<ViewResultsResponse>> {
    let view = db::views::load_view(&state.db, view_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("View {} not found", view_id)))?;

    let results = run_view(&state.db, user_id, &view, Utc::now().date_naive()).await?;

    Ok(Json(ViewResultsResponse { view, results }))
}

#[derive(Debug, Deserialize)]
pub struct UpdateViewRequest {
    pub name: String,
    pub filters: ViewFilters,
    pub display_order: Option<i64>,
}

/// POST /api/views/:id
pub async fn update_view(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(view_id): Path<Uuid>,
    Json(payload): Json<UpdateViewRequest>,
) -> ApiResult<()> {
    if payload.name.trim().is_empty() {
        return Err(ApiError::BadRequest("View name cannot be empty".to_string()));
    }

    db::views::load_view(&state.db, view_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("View {} not found", view_id)))?;

    db::views::update_view(
        &state.db,
        view_id,
        user_id,
        &payload.name,
        &payload.filters,
        payload.display_order,
    )
    .await?;
    Ok(())
}

/// DELETE /api/views/:id
pub async fn delete_view(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Path(view_id): Path<Uuid>,
) -> ApiResult<()> {
    db::views::load_view(&state.db, view_id, user_id)
        .await?
        .ok_or_else(|| ApiError::NotFound(format!("View {} not found", view_id)))?;

    db::views::delete_view(&state.db, view_id, user_id).await?;
    Ok(())
}

/// Build view routes
pub fn view_routes() -> Router<AppState> {
    Router::new()
        .route("/api/views", get(get_views).post(create_view))
        .route("/api/views/:id", post(update_view).delete(delete_view))
        .route("/api/views/:id/results", get(get_view_results))
}
