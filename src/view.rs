//! Display view models.
//!
//! Everything here is a pure function of a cache entry, the current time and
//! (for the suggestion) a random number generator.

use crate::cache::{CacheEntry, CacheStatus};
use crate::library::{Book, LibrarySnapshot};
use chrono::{DateTime, Utc};
use rand::seq::IndexedRandom;
use serde::Serialize;

/// Glyph used for one star.
pub const STAR: char = '★';

/// Tag strings longer than this are cut for the e-ink layout.
const MAX_TAGS_LEN: usize = 30;

/// A recent book as shown on the display.
#[derive(Debug, Clone, Serialize)]
pub struct BookView {
    /// 1-based position in the list.
    pub index: usize,
    /// Book title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Star glyphs, empty when unrated.
    pub rating: String,
    /// Number of stars (0-5).
    pub stars: u8,
    /// Whether the book is rated.
    pub has_rating: bool,
    /// Comma-joined tags, shortened for display.
    pub tags: String,
    /// Page count, omitted when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// Series name, omitted when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,
    /// Description, empty when unknown.
    pub description: String,
    /// Added date as `MM/DD`.
    pub date_added: String,
    /// Whole days since the book was added.
    pub days_ago: i64,
}

/// The "Book Roulette" pick.
#[derive(Debug, Clone, Serialize)]
pub struct SuggestionView {
    /// Book title.
    pub title: String,
    /// Author.
    pub author: String,
    /// Comma-joined tags.
    pub tags: String,
    /// Star glyphs.
    pub rating: String,
    /// Page count, omitted when unknown.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub page_count: Option<u32>,
    /// Description, empty when unknown.
    pub description: String,
}

/// Aggregate library statistics.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
pub struct LibraryStats {
    /// Number of books.
    pub total_books: usize,
    /// Number of rated books.
    pub rated_books: usize,
    /// Rated share in whole percent.
    pub rating_percentage: u32,
}

/// Full payload returned to the display.
#[derive(Debug, Clone, Serialize)]
pub struct DisplayData {
    /// No books available (never ingested, cleared, or empty library).
    pub empty_library: bool,
    /// Explanation shown when the library is empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub message: Option<String>,
    /// Most recently added books first.
    pub recent_books: Vec<BookView>,
    /// Random pick; absent from the compact layout, `null` when empty.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub book_suggestion: Option<Option<SuggestionView>>,
    /// Aggregate statistics.
    #[serde(flatten)]
    pub stats: LibraryStats,
    /// Human readable freshness.
    pub server_status: String,
    /// Machine readable freshness.
    pub cache_status: CacheStatus,
    /// Where the data came from.
    pub data_source: String,
    /// Time of the last successful ingestion, or "Never".
    pub last_update: String,
    /// Seconds since the last successful ingestion.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data_age_seconds: Option<u64>,
    /// Server time.
    pub current_time: String,
    /// Server date as `MM/DD`.
    pub current_date: String,
    /// Number of entries in `recent_books`.
    pub recent_books_count: usize,
    /// Limit applied to `recent_books`.
    pub book_limit_used: usize,
}

/// Layout requested by the display.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Layout {
    /// Recent list, stats and a suggestion.
    Full,
    /// Recent list and stats only.
    Compact,
}

/// Star glyph string for a book.
pub fn rating_glyphs(book: &Book) -> String {
    std::iter::repeat_n(STAR, usize::from(book.stars())).collect()
}

/// Aggregate statistics; all zero without a snapshot.
pub fn stats(snapshot: Option<&LibrarySnapshot>) -> LibraryStats {
    let (total_books, rated_books) =
        snapshot.map_or((0, 0), |s| (s.total_books(), s.rated_books()));

    LibraryStats {
        total_books,
        rated_books,
        rating_percentage: rating_percentage(rated_books, total_books),
    }
}

/// `round(rated / total * 100)`, 0 for an empty library.
pub fn rating_percentage(rated_books: usize, total_books: usize) -> u32 {
    if total_books == 0 {
        return 0;
    }
    (rated_books as f64 / total_books as f64 * 100.0).round() as u32
}

/// The most recently added books, newest first.
pub fn recent_books(snapshot: &LibrarySnapshot, limit: usize, now: DateTime<Utc>) -> Vec<BookView> {
    snapshot
        .recent()
        .take(limit)
        .enumerate()
        .map(|(i, book)| BookView {
            index: i + 1,
            title: book.title.clone(),
            author: book.author.clone(),
            rating: rating_glyphs(book),
            stars: book.stars(),
            has_rating: book.is_rated(),
            tags: shorten_tags(&book.tags_display()),
            page_count: book.page_count,
            series: book.series.clone(),
            description: book.description.clone().unwrap_or_default(),
            date_added: book.added.format("%m/%d").to_string(),
            days_ago: (now - book.added).num_days().max(0),
        })
        .collect()
}

/// Pick one book uniformly from the whole snapshot.
pub fn suggestion<R: rand::Rng + ?Sized>(
    snapshot: &LibrarySnapshot,
    rng: &mut R,
) -> Option<SuggestionView> {
    snapshot.books().choose(rng).map(|book| SuggestionView {
        title: book.title.clone(),
        author: book.author.clone(),
        tags: book.tags_display(),
        rating: rating_glyphs(book),
        page_count: book.page_count,
        description: book.description.clone().unwrap_or_default(),
    })
}

/// Status line for the display.
pub fn server_status(entry: &CacheEntry, now: DateTime<Utc>) -> String {
    match entry.status {
        CacheStatus::Fresh => "Connected".to_string(),
        CacheStatus::Stale => {
            let minutes = entry.age(now).map_or(0, |age| age.as_secs() / 60);
            format!("Stale data (last update {} min ago)", minutes)
        }
        CacheStatus::NeverPopulated => "No data yet".to_string(),
    }
}

/// Build the display payload for one request.
pub fn build_display<R: rand::Rng + ?Sized>(
    entry: &CacheEntry,
    data_source: &str,
    layout: Layout,
    limit: usize,
    now: DateTime<Utc>,
    rng: &mut R,
) -> DisplayData {
    let snapshot = entry.snapshot.as_deref();

    let recent = snapshot
        .map(|s| recent_books(s, limit, now))
        .unwrap_or_default();

    let book_suggestion = match layout {
        Layout::Full => Some(snapshot.and_then(|s| suggestion(s, rng))),
        Layout::Compact => None,
    };

    let message = match snapshot {
        None => Some(
            "No library data has been received yet. Check the sync agent or Calibre-web connection."
                .to_string(),
        ),
        Some(s) if s.is_empty() => Some(
            "Your library is connected but no books were found. Add some books to see them here!"
                .to_string(),
        ),
        Some(_) => None,
    };

    DisplayData {
        empty_library: snapshot.is_none_or(LibrarySnapshot::is_empty),
        message,
        recent_books_count: recent.len(),
        recent_books: recent,
        book_suggestion,
        stats: stats(snapshot),
        server_status: server_status(entry, now),
        cache_status: entry.status,
        data_source: data_source.to_string(),
        last_update: entry
            .ingested_at
            .map_or_else(|| "Never".to_string(), |t| t.to_rfc3339()),
        data_age_seconds: entry.age(now).map(|age| age.as_secs()),
        current_time: now.to_rfc3339(),
        current_date: now.format("%m/%d").to_string(),
        book_limit_used: limit,
    }
}

fn shorten_tags(tags: &str) -> String {
    if tags.chars().count() <= MAX_TAGS_LEN {
        return tags.to_string();
    }
    let mut short: String = tags.chars().take(MAX_TAGS_LEN - 3).collect();
    short.push_str("...");
    short
}
