//! External catalog search
//!
//! Fans the query out to the configured providers and annotates each hit
//! with the caller's existing tracking state so the UI can show what is
//! already on the shelf.

use axum::{
    extract::{Query, State},
    routing::get,
    Json, Router,
};
use medley_common::types::{ItemStatus, MediaType};
use serde::{Deserialize, Serialize};
use tracing::debug;
use uuid::Uuid;

use super::auth::CurrentUser;
use crate::catalog::{search_all, ExternalSearchResult};
use crate::db;
use crate::{ApiError, ApiResult, AppState};

#[derive(Debug, Deserialize)]
pub struct SearchParams {
    pub query: String,
    /// A media type, or "all" (default)
    #[serde(rename = "type")]
    pub media_type: Option<String>,
}

/// Search hit plus the caller's tracking state when already in the library
#[derive(Debug, Serialize)]
pub struct SearchResultWithStatus {
    #[serde(flatten)]
    pub result: ExternalSearchResult,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub tracked_item_id: Option<Uuid>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub status: Option<ItemStatus>,
}

fn parse_type_filter(raw: Option<&str>) -> ApiResult<Option<MediaType>> {
    match raw {
        None | Some("all") => Ok(None),
        Some(s) => MediaType::parse(s).map(Some).map_err(ApiError::from),
    }
}

/// GET /api/search?query=...&type=...
pub async fn search_catalog(
    State(state): State<AppState>,
    CurrentUser(user_id): CurrentUser,
    Query(params): Query<SearchParams>,
) -> ApiResult<Json<Vec<SearchResultWithStatus>>> {
    if params.query.trim().is_empty() {
        return Err(ApiError::BadRequest("Search query cannot be empty".to_string()));
    }
    let filter = parse_type_filter(params.media_type.as_deref())?;

    let results = search_all(&state.providers, &params.query, filter).await;
    debug!(hits = results.len(), "Catalog search complete");

    if results.is_empty() {
        return Ok(Json(Vec::new()));
    }

    let external_ids: Vec<String> = results.iter().map(|r| r.external_id.clone()).collect();
    let tracked = db::metadata::tracked_status_by_external(&state.db, user_id, &external_ids).await?;

    Ok(Json(
        results
            .into_iter()
            .map(|result| {
                let key = (result.external_id.clone(), result.external_source.clone());
                let (tracked_item_id, status) = match tracked.get(&key) {
                    Some((id, status)) => (Some(*id), Some(*status)),
                    None => (None, None),
                };
                SearchResultWithStatus {
                    result,
                    tracked_item_id,
                    status,
                }
            })
            .collect(),
    ))
}

/// Build search routes
pub fn search_routes() -> Router<AppState> {
    Router::new().route("/api/search", get(search_catalog))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_parse_type_filter() {
        assert_eq!(parse_type_filter(None).unwrap(), None);
        assert_eq!(parse_type_filter(Some("all")).unwrap(), None);
        assert_eq!(
            parse_type_filter(Some("book")).unwrap(),
            Some(MediaType::Book)
        );
        assert!(parse_type_filter(Some("vinyl")).is_err());
    }
}
