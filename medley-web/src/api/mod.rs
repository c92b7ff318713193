//! HTTP API
//!
//! One module per concern, each exporting a `*_routes()` builder merged in
//! `build_router`.

pub mod auth;
pub mod dashboard;
pub mod health;
pub mod instances;
pub mod items;
pub mod library;
pub mod search;
pub mod series;
pub mod settings;
pub mod views;

pub use auth::CurrentUser;
