//! Settings API endpoint
//!
//! Lets the UI configure provider credentials. The database is the
//! authoritative store; the TOML file gets a best-effort backup copy so a
//! wiped database does not lose the keys.

use axum::{extract::State, routing::post, Json, Router};
use serde::{Deserialize, Serialize};
use tracing::{info, warn};

use super::auth::CurrentUser;
use crate::config::is_valid_key;
use crate::db;
use crate::{ApiError, ApiResult, AppState};

/// Keys the settings endpoint accepts
const ALLOWED_KEYS: &[&str] = &[
    "hardcover_api_token",
    "tmdb_api_key",
    "igdb_client_id",
    "igdb_client_secret",
];

#[derive(Debug, Deserialize)]
pub struct SetSettingRequest {
    pub key: String,
    pub value: String,
}

#[derive(Debug, Serialize)]
pub struct SetSettingResponse {
    pub success: bool,
    pub message: String,
}

/// POST /api/settings
///
/// Takes effect for provider clients on the next service start.
pub async fn set_setting(
    State(state): State<AppState>,
    CurrentUser(_user_id): CurrentUser,
    Json(payload): Json<SetSettingRequest>,
) -> ApiResult<Json<SetSettingResponse>> {
    if !ALLOWED_KEYS.contains(&payload.key.as_str()) {
        return Err(ApiError::BadRequest(format!(
            "Unknown setting: {}",
            payload.key
        )));
    }
    if !is_valid_key(&payload.value) {
        return Err(ApiError::BadRequest(
            "Value cannot be empty or whitespace-only".to_string(),
        ));
    }

    // Write to database (authoritative)
    db::settings::set_setting(&state.db, &payload.key, &payload.value).await?;
    info!(key = payload.key, "Setting configured via API");

    // Sync to TOML (best-effort backup)
    match sync_to_toml(&payload.key, &payload.value) {
        Ok(()) => {}
        Err(e) => warn!("TOML sync failed (database write succeeded): {}", e),
    }

    Ok(Json(SetSettingResponse {
        success: true,
        message: format!("{} configured successfully", payload.key),
    }))
}

fn sync_to_toml(key: &str, value: &str) -> medley_common::Result<()> {
    let path = medley_common::config::toml_config_path()?;
    let mut config = medley_common::config::load_toml_config().unwrap_or_default();

    match key {
        "hardcover_api_token" => config.hardcover_api_token = Some(value.to_string()),
        "tmdb_api_key" => config.tmdb_api_key = Some(value.to_string()),
        "igdb_client_id" => config.igdb_client_id = Some(value.to_string()),
        "igdb_client_secret" => config.igdb_client_secret = Some(value.to_string()),
        _ => return Ok(()),
    }

    medley_common::config::write_toml_config(&config, &path)
}

/// Build settings routes
pub fn settings_routes() -> Router<AppState> {
    Router::new().route("/api/settings", post(set_setting))
}
