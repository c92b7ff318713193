//! Database initialization and shared models

pub mod init;
pub mod models;
pub mod schema;

pub use init::init_database;
