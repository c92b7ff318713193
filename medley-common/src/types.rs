//! Domain enums and value types shared by the Medley crates

use serde::{Deserialize, Serialize};

use crate::{Error, Result};

/// Kind of catalog entry a tracked item refers to
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum MediaType {
    Book,
    Movie,
    TvShow,
    VideoGame,
}

impl MediaType {
    pub fn as_str(&self) -> &'static str {
        match self {
            MediaType::Book => "book",
            MediaType::Movie => "movie",
            MediaType::TvShow => "tv_show",
            MediaType::VideoGame => "video_game",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "book" => Ok(MediaType::Book),
            "movie" => Ok(MediaType::Movie),
            "tv_show" => Ok(MediaType::TvShow),
            "video_game" => Ok(MediaType::VideoGame),
            other => Err(Error::InvalidInput(format!("Unknown media type: {}", other))),
        }
    }
}

/// Tracking status of an item or a series.
///
/// `WaitingForNextRelease` is only ever user-set on a series; the deriver
/// and aggregator never assign it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemStatus {
    Backlog,
    NextUp,
    InProgress,
    OnHold,
    WaitingForNextRelease,
    Completed,
    Dropped,
}

impl ItemStatus {
    pub fn as_str(&self) -> &'static str {
        match self {
            ItemStatus::Backlog => "backlog",
            ItemStatus::NextUp => "next_up",
            ItemStatus::InProgress => "in_progress",
            ItemStatus::OnHold => "on_hold",
            ItemStatus::WaitingForNextRelease => "waiting_for_next_release",
            ItemStatus::Completed => "completed",
            ItemStatus::Dropped => "dropped",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "backlog" => Ok(ItemStatus::Backlog),
            "next_up" => Ok(ItemStatus::NextUp),
            "in_progress" => Ok(ItemStatus::InProgress),
            "on_hold" => Ok(ItemStatus::OnHold),
            "waiting_for_next_release" => Ok(ItemStatus::WaitingForNextRelease),
            "completed" => Ok(ItemStatus::Completed),
            "dropped" => Ok(ItemStatus::Dropped),
            other => Err(Error::InvalidInput(format!("Unknown status: {}", other))),
        }
    }

    /// Statuses that count as finished for series aggregation
    pub fn is_done(&self) -> bool {
        matches!(self, ItemStatus::Completed | ItemStatus::Dropped)
    }
}

/// Which entity a saved view queries
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ViewSubject {
    Items,
    Series,
}

impl ViewSubject {
    pub fn as_str(&self) -> &'static str {
        match self {
            ViewSubject::Items => "items",
            ViewSubject::Series => "series",
        }
    }

    pub fn parse(s: &str) -> Result<Self> {
        match s {
            "items" => Ok(ViewSubject::Items),
            "series" => Ok(ViewSubject::Series),
            other => Err(Error::InvalidInput(format!("Unknown view subject: {}", other))),
        }
    }
}

/// Sort field for item-subject views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ItemSortField {
    UpdatedAt,
    Title,
    Rating,
    CompletedAt,
}

/// Sort field for series-subject views
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SeriesSortField {
    Name,
    UpdatedAt,
    Rating,
    ItemCount,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SortDirection {
    Asc,
    Desc,
}

/// Saved filter configuration of a view.
///
/// All fields are optional and AND-combined. Fields that do not apply to the
/// view's subject (e.g. `is_series_complete` on an items view) are ignored
/// rather than rejected: the UI never produces such a combination.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct ViewFilters {
    pub media_types: Option<Vec<MediaType>>,
    pub statuses: Option<Vec<ItemStatus>>,
    pub is_purchased: Option<bool>,
    pub completed_this_year: Option<bool>,
    pub completed_year_start: Option<i32>,
    pub completed_year_end: Option<i32>,
    pub is_series_complete: Option<bool>,
    pub sort_by: Option<String>,
    pub sort_direction: Option<SortDirection>,
}

/// One dimension of a structured sub-rating: 0-5 plus an optional note
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct RatingDimension {
    pub rating: u8,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub comment: Option<String>,
}

/// Structured sub-rating with five named dimensions.
///
/// When all five dimensions are set, the instance's overall rating is their
/// average unless the user supplied one explicitly.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StructuredRating {
    pub setting: RatingDimension,
    pub character: RatingDimension,
    pub plot: RatingDimension,
    pub enjoyment: RatingDimension,
    pub emotional_impact: RatingDimension,
}

impl StructuredRating {
    fn dimensions(&self) -> [&RatingDimension; 5] {
        [
            &self.setting,
            &self.character,
            &self.plot,
            &self.enjoyment,
            &self.emotional_impact,
        ]
    }

    /// Validate every dimension is within the 0-5 scale
    pub fn validate(&self) -> Result<()> {
        for dim in self.dimensions() {
            if dim.rating > 5 {
                return Err(Error::InvalidInput(format!(
                    "Sub-rating {} out of range (0-5)",
                    dim.rating
                )));
            }
        }
        Ok(())
    }

    /// Average of the five dimensions on the 0-10 overall scale,
    /// rounded to one decimal place
    pub fn overall(&self) -> f64 {
        let sum: u32 = self.dimensions().iter().map(|d| d.rating as u32).sum();
        // dimensions are 0-5, overall scale is 0-10
        let avg = (sum as f64 / 5.0) * 2.0;
        (avg * 10.0).round() / 10.0
    }
}

/// Validate an overall rating: 0-10 with at most one decimal place
pub fn validate_rating(rating: f64) -> Result<()> {
    if !(0.0..=10.0).contains(&rating) {
        return Err(Error::InvalidInput(format!(
            "Rating {} out of range (0-10)",
            rating
        )));
    }
    let tenths = rating * 10.0;
    if (tenths - tenths.round()).abs() > 1e-9 {
        return Err(Error::InvalidInput(format!(
            "Rating {} has more than one decimal place",
            rating
        )));
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_status_round_trip() {
        for status in [
            ItemStatus::Backlog,
            ItemStatus::NextUp,
            ItemStatus::InProgress,
            ItemStatus::OnHold,
            ItemStatus::WaitingForNextRelease,
            ItemStatus::Completed,
            ItemStatus::Dropped,
        ] {
            assert_eq!(ItemStatus::parse(status.as_str()).unwrap(), status);
        }
        assert!(ItemStatus::parse("reading").is_err());
    }

    #[test]
    fn test_structured_rating_average() {
        let dim = |rating| RatingDimension { rating, comment: None };
        let rating = StructuredRating {
            setting: dim(5),
            character: dim(4),
            plot: dim(4),
            enjoyment: dim(3),
            emotional_impact: dim(5),
        };
        // (5+4+4+3+5)/5 = 4.2 on 0-5, 8.4 on 0-10
        assert_eq!(rating.overall(), 8.4);
    }

    #[test]
    fn test_structured_rating_validation() {
        let dim = |rating| RatingDimension { rating, comment: None };
        let rating = StructuredRating {
            setting: dim(6),
            character: dim(4),
            plot: dim(4),
            enjoyment: dim(3),
            emotional_impact: dim(5),
        };
        assert!(rating.validate().is_err());
    }

    #[test]
    fn test_validate_rating_bounds() {
        assert!(validate_rating(0.0).is_ok());
        assert!(validate_rating(10.0).is_ok());
        assert!(validate_rating(7.5).is_ok());
        assert!(validate_rating(10.1).is_err());
        assert!(validate_rating(-0.5).is_err());
        assert!(validate_rating(7.25).is_err());
    }
}
