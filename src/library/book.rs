//! Book metadata model.

use chrono::{DateTime, NaiveDate, NaiveDateTime, Utc};
use serde::{Deserialize, Serialize};

/// Highest rating on the internal (Calibre) scale.
pub const MAX_RATING: u8 = 10;

/// Highest number of stars shown on the display.
pub const MAX_STARS: u8 = 5;

/// A single book record as ingested from the library.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Book {
    /// Book title.
    pub title: String,

    /// Author display name.
    pub author: String,

    /// Subject/genre tags, in source order.
    pub tags: Vec<String>,

    /// Rating on the 0-10 scale, `None` when unrated.
    pub rating: Option<u8>,

    /// Number of pages (if known).
    pub page_count: Option<u32>,

    /// Book description or summary.
    pub description: Option<String>,

    /// Series name.
    pub series: Option<String>,

    /// When the book was added to the library.
    pub added: DateTime<Utc>,
}

impl Book {
    /// Create a book with only the mandatory fields set.
    pub fn new(title: impl Into<String>, author: impl Into<String>, added: DateTime<Utc>) -> Self {
        Self {
            title: title.into(),
            author: author.into(),
            tags: Vec::new(),
            rating: None,
            page_count: None,
            description: None,
            series: None,
            added,
        }
    }

    /// Whether the book carries a non-zero rating.
    pub fn is_rated(&self) -> bool {
        matches!(self.rating, Some(r) if r > 0)
    }

    /// Star count on the 0-5 display scale.
    ///
    /// Half stars round up, so 9 becomes 5 and 1 becomes 1.
    pub fn stars(&self) -> u8 {
        match self.rating {
            Some(r) => r.min(MAX_RATING).div_ceil(2).min(MAX_STARS),
            None => 0,
        }
    }

    /// Tags joined for display.
    pub fn tags_display(&self) -> String {
        self.tags.join(", ")
    }
}

/// Split a comma-joined tag list, dropping blank entries.
pub fn split_tags(joined: &str) -> Vec<String> {
    joined
        .split(',')
        .map(str::trim)
        .filter(|t| !t.is_empty())
        .map(String::from)
        .collect()
}

/// Parse a timestamp as written by Calibre, OPDS feeds or the sync agent.
///
/// Accepts RFC 3339, `YYYY-MM-DD HH:MM:SS[.fff][+tz]` and bare dates.
/// Timestamps without an offset are taken as UTC.
pub fn parse_timestamp(value: &str) -> Option<DateTime<Utc>> {
    let value = value.trim();
    if value.is_empty() {
        return None;
    }

    if let Ok(dt) = DateTime::parse_from_rfc3339(value) {
        return Some(dt.with_timezone(&Utc));
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f%:z", "%Y-%m-%dT%H:%M:%S%.f%:z"] {
        if let Ok(dt) = DateTime::parse_from_str(value, format) {
            return Some(dt.with_timezone(&Utc));
        }
    }

    for format in ["%Y-%m-%d %H:%M:%S%.f", "%Y-%m-%dT%H:%M:%S%.f"] {
        if let Ok(dt) = NaiveDateTime::parse_from_str(value, format) {
            return Some(dt.and_utc());
        }
    }

    NaiveDate::parse_from_str(value, "%Y-%m-%d")
        .ok()
        .and_then(|d| d.and_hms_opt(0, 0, 0))
        .map(|dt| dt.and_utc())
}
