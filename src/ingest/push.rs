//! Push ingestion: snapshots submitted by the local sync agent.

use crate::error::IngestError;
use crate::library::{Book, LibrarySnapshot, book::MAX_RATING, parse_timestamp, split_tags};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Body of `POST /sync`.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct SyncPayload {
    /// Every book of the library, in any order.
    pub books: Vec<PushedBook>,

    /// Name of the submitting agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source: Option<String>,

    /// Book count as seen by the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub total_books: Option<usize>,

    /// Rated book count as seen by the agent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rated_books: Option<usize>,
}

/// Tags either as the agent's comma-joined string or as a list.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum TagList {
    /// `"Fiction, Classic"`.
    Joined(String),
    /// `["Fiction", "Classic"]`.
    List(Vec<String>),
}

impl TagList {
    fn into_tags(self) -> Vec<String> {
        match self {
            TagList::Joined(joined) => split_tags(&joined),
            TagList::List(list) => list
                .into_iter()
                .map(|t| t.trim().to_string())
                .filter(|t| !t.is_empty())
                .collect(),
        }
    }
}

/// One book as submitted by the agent.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct PushedBook {
    /// Book title (required).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub title: Option<String>,

    /// Author (required).
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub author: Option<String>,

    /// Tags.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub tags: Option<TagList>,

    /// Rating on the 0-10 scale.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub rating: Option<i64>,

    /// Page count.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub page_count: Option<i64>,

    /// Description or comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Series name.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub series: Option<String>,

    /// When the book was added to the library.
    #[serde(default, alias = "added", skip_serializing_if = "Option::is_none")]
    pub timestamp: Option<String>,
}

/// Response of a successful `POST /sync`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SyncAck {
    /// Always `"ok"`.
    pub status: String,
    /// Id of the installed snapshot.
    pub snapshot_id: String,
    /// Books in the installed snapshot.
    pub total_books: usize,
    /// Rated books in the installed snapshot.
    pub rated_books: usize,
    /// Rounded share of rated books.
    pub rating_percentage: u32,
    /// When the snapshot was installed (RFC 3339).
    pub ingested_at: String,
}

/// Decode and validate a raw `/sync` body.
pub fn snapshot_from_body(body: &[u8]) -> Result<LibrarySnapshot, IngestError> {
    let payload: SyncPayload = serde_json::from_slice(body)
        .map_err(|e| IngestError::Validation(format!("invalid JSON payload: {}", e)))?;

    snapshot_from_payload(payload, Utc::now())
}

/// Validate a payload and build the snapshot it describes.
///
/// Any invalid book rejects the whole payload.
pub fn snapshot_from_payload(
    payload: SyncPayload,
    captured_at: DateTime<Utc>,
) -> Result<LibrarySnapshot, IngestError> {
    let books = payload
        .books
        .into_iter()
        .enumerate()
        .map(|(i, book)| validate_book(book, captured_at).map_err(|e| prefix(i, e)))
        .collect::<Result<Vec<_>, _>>()?;

    let source = match payload.source.as_deref().map(str::trim) {
        Some(s) if !s.is_empty() => format!("push:{}", s),
        _ => "push".to_string(),
    };

    let snapshot = LibrarySnapshot::captured_at(books, source, captured_at);

    if let Some(total) = payload.total_books
        && total != snapshot.total_books()
    {
        return Err(IngestError::Validation(format!(
            "total_books is {} but {} books were sent",
            total,
            snapshot.total_books()
        )));
    }

    if let Some(rated) = payload.rated_books
        && rated != snapshot.rated_books()
    {
        return Err(IngestError::Validation(format!(
            "rated_books is {} but {} sent books are rated",
            rated,
            snapshot.rated_books()
        )));
    }

    Ok(snapshot)
}

fn prefix(index: usize, error: IngestError) -> IngestError {
    match error {
        IngestError::Validation(msg) => IngestError::Validation(format!("books[{}]: {}", index, msg)),
        other => other,
    }
}

fn validate_book(book: PushedBook, captured_at: DateTime<Utc>) -> Result<Book, IngestError> {
    let title = required(book.title, "title")?;
    let author = required(book.author, "author")?;

    let added = match book.timestamp.as_deref().map(str::trim) {
        None | Some("") => captured_at,
        Some(ts) => parse_timestamp(ts)
            .ok_or_else(|| IngestError::Validation(format!("unparseable timestamp '{}'", ts)))?,
    };

    let rating = book
        .rating
        .map(|r| {
            u8::try_from(r)
                .ok()
                .filter(|r| *r <= MAX_RATING)
                .ok_or_else(|| IngestError::Validation(format!("rating {} is outside 0-10", r)))
        })
        .transpose()?;

    let page_count = book
        .page_count
        .map(|p| {
            u32::try_from(p)
                .map_err(|_| IngestError::Validation(format!("page_count {} is invalid", p)))
        })
        .transpose()?;

    let mut result = Book::new(title, author, added);
    result.tags = book.tags.map(TagList::into_tags).unwrap_or_default();
    result.rating = rating;
    result.page_count = page_count;
    result.description = non_blank(book.description);
    result.series = non_blank(book.series);

    Ok(result)
}

fn required(value: Option<String>, field: &str) -> Result<String, IngestError> {
    non_blank(value).ok_or_else(|| IngestError::Validation(format!("missing {}", field)))
}

fn non_blank(value: Option<String>) -> Option<String> {
    value
        .map(|v| v.trim().to_string())
        .filter(|v| !v.is_empty())
}
