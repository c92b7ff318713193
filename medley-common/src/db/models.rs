//! Database models

use chrono::{DateTime, NaiveDate, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::{ItemStatus, MediaType, StructuredRating, ViewFilters, ViewSubject};

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct User {
    pub guid: Uuid,
    pub name: String,
    pub email: String,
    pub password_hash: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Session {
    pub token: String,
    pub user_id: Uuid,
    pub expires_at: DateTime<Utc>,
    pub created_at: DateTime<Utc>,
}

/// Shared catalog entry cached from an external provider.
/// `extra` holds type-specific fields (author, director, series name,
/// series position, genres, ...) as free-form JSON.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CatalogMetadata {
    pub guid: Uuid,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub title: String,
    pub description: Option<String>,
    pub cover_image_url: Option<String>,
    pub release_date: Option<NaiveDate>,
    pub external_id: String,
    pub external_source: String,
    pub extra: Option<serde_json::Value>,
    pub created_at: DateTime<Utc>,
}

impl CatalogMetadata {
    pub fn new(
        media_type: MediaType,
        title: String,
        external_id: String,
        external_source: String,
    ) -> Self {
        Self {
            guid: Uuid::new_v4(),
            media_type,
            title,
            description: None,
            cover_image_url: None,
            release_date: None,
            external_id,
            external_source,
            extra: None,
            created_at: Utc::now(),
        }
    }
}

/// One row per (user, catalog entry) pair being followed.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TrackedItem {
    pub guid: Uuid,
    pub user_id: Uuid,
    pub catalog_metadata_id: Uuid,
    pub series_id: Option<Uuid>,
    pub status: ItemStatus,
    pub is_purchased: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl TrackedItem {
    pub fn new(user_id: Uuid, catalog_metadata_id: Uuid, series_id: Option<Uuid>) -> Self {
        let now = Utc::now();
        Self {
            guid: Uuid::new_v4(),
            user_id,
            catalog_metadata_id,
            series_id,
            status: ItemStatus::Backlog,
            is_purchased: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// One consumption pass (read / watch / playthrough) of a tracked item.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Instance {
    pub guid: Uuid,
    pub tracked_item_id: Uuid,
    pub rating: Option<f64>,
    pub structured_rating: Option<StructuredRating>,
    pub review_text: Option<String>,
    pub started_at: Option<NaiveDate>,
    /// NULL means the pass is still in progress
    pub completed_at: Option<NaiveDate>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Series {
    pub guid: Uuid,
    pub user_id: Uuid,
    pub name: String,
    #[serde(rename = "type")]
    pub media_type: MediaType,
    pub status: ItemStatus,
    pub rating: Option<f64>,
    pub description: Option<String>,
    pub is_complete: bool,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl Series {
    pub fn new(user_id: Uuid, name: String, media_type: MediaType) -> Self {
        let now = Utc::now();
        Self {
            guid: Uuid::new_v4(),
            user_id,
            name,
            media_type,
            status: ItemStatus::Backlog,
            rating: None,
            description: None,
            is_complete: false,
            created_at: now,
            updated_at: now,
        }
    }
}

/// Saved filter/sort specification. Pure configuration, no derived state.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct View {
    pub guid: Uuid,
    pub user_id: Uuid,
    pub name: String,
    pub subject: ViewSubject,
    pub filters: ViewFilters,
    pub display_order: i64,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}
