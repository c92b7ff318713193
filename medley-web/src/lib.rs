//! medley-web library interface
//!
//! Exposes the application state, router assembly, and the modules the
//! integration tests exercise.

pub mod api;
pub mod catalog;
pub mod config;
pub mod db;
pub mod engine;
pub mod error;

pub use crate::config::AppConfig;
pub use crate::error::{ApiError, ApiResult};

use axum::Router;
use catalog::ProviderSet;
use chrono::{DateTime, Utc};
use sqlx::SqlitePool;

/// Application state shared across handlers
#[derive(Clone)]
pub struct AppState {
    /// Database connection pool
    pub db: SqlitePool,
    /// Resolved runtime tunables (dashboard and series windows)
    pub config: AppConfig,
    /// Configured external catalog providers
    pub providers: ProviderSet,
    /// Service startup timestamp for uptime tracking
    pub startup_time: DateTime<Utc>,
}

impl AppState {
    pub fn new(db: SqlitePool, config: AppConfig, providers: ProviderSet) -> Self {
        Self {
            db,
            config,
            providers,
            startup_time: Utc::now(),
        }
    }
}

/// Build application router
pub fn build_router(state: AppState) -> Router {
    Router::new()
        .merge(api::health::health_routes())
        .merge(api::auth::auth_routes())
        .merge(api::search::search_routes())
        .merge(api::library::library_routes())
        .merge(api::items::item_routes())
        .merge(api::instances::instance_routes())
        .merge(api::series::series_routes())
        .merge(api::dashboard::dashboard_routes())
        .merge(api::views::view_routes())
        .merge(api::settings::settings_routes())
        .layer(tower_http::trace::TraceLayer::new_for_http())
        .with_state(state)
}
