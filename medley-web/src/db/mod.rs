//! Database access for medley-web
//!
//! One module per entity, following the shared-schema initialization in
//! `medley_common::db`. All timestamps are RFC3339 TEXT and all dates are
//! `YYYY-MM-DD` TEXT; guids are UUID TEXT.

pub mod instances;
pub mod items;
pub mod metadata;
pub mod series;
pub mod settings;
pub mod users;
pub mod views;

use chrono::{DateTime, NaiveDate, Utc};
use medley_common::{Error, Result};
use uuid::Uuid;

pub(crate) fn parse_guid(s: &str) -> Result<Uuid> {
    Uuid::parse_str(s).map_err(|e| Error::Internal(format!("Invalid guid {}: {}", s, e)))
}

pub(crate) fn parse_guid_opt(s: Option<String>) -> Result<Option<Uuid>> {
    s.as_deref().map(parse_guid).transpose()
}

pub(crate) fn parse_timestamp(s: &str) -> Result<DateTime<Utc>> {
    DateTime::parse_from_rfc3339(s)
        .map(|dt| dt.with_timezone(&Utc))
        .map_err(|e| Error::Internal(format!("Invalid timestamp {}: {}", s, e)))
}

pub(crate) fn parse_date(s: &str) -> Result<NaiveDate> {
    NaiveDate::parse_from_str(s, "%Y-%m-%d")
        .map_err(|e| Error::InvalidInput(format!("Invalid date {}: {}", s, e)))
}

pub(crate) fn parse_date_opt(s: Option<String>) -> Result<Option<NaiveDate>> {
    s.as_deref().map(parse_date).transpose()
}

/// Placeholder list for a SQL `IN (...)` clause with `n` entries
pub(crate) fn sql_placeholders(n: usize) -> String {
    let mut s = String::with_capacity(n * 2);
    for i in 0..n {
        if i > 0 {
            s.push(',');
        }
        s.push('?');
    }
    s
}
