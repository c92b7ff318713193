//! Dashboard endpoint

use axum::{extract::State, routing::get, Json, Router};
use chrono::Utc;

use super::auth::CurrentUser;
use crate::engine::dashboard::{compose_dashboard, DashboardData};
use crate::{ApiResult, AppState};

/// GET /api/dashboard
pub async fn get_dashboard(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
) -> ApiResult<Json<DashboardData>> {
    let data = compose_dashboard(
        &state.db,
        user_id,
        Utc::now().date_naive(),
        state.config.recently_finished_window_days,
    )
    .await?;
    Ok(Json(data))
}

/// Build dashboard routes
pub fn dashboard_routes() -> Router<AppState> {
    Router::new().route("/api/dashboard", get(get_dashboard))
}
