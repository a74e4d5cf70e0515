//! Library snapshot model.

pub mod book;

pub use book::{Book, parse_timestamp, split_tags};

use chrono::{DateTime, Utc};
use serde::Serialize;

/// An immutable, fully populated capture of the library at one point in time.
///
/// Books are kept in added order (oldest first). The aggregate totals are
/// computed once on construction, so `rated_books <= total_books` always holds.
#[derive(Debug, Clone, Serialize)]
pub struct LibrarySnapshot {
    id: String,
    source: String,
    captured_at: DateTime<Utc>,
    total_books: usize,
    rated_books: usize,
    books: Vec<Book>,
}

impl LibrarySnapshot {
    /// Build a snapshot captured now.
    pub fn new(books: Vec<Book>, source: impl Into<String>) -> Self {
        Self::captured_at(books, source, Utc::now())
    }

    /// Build a snapshot with an explicit capture time.
    pub fn captured_at(
        mut books: Vec<Book>,
        source: impl Into<String>,
        captured_at: DateTime<Utc>,
    ) -> Self {
        books.sort_by_key(|b| b.added);

        let total_books = books.len();
        let rated_books = books.iter().filter(|b| b.is_rated()).count();

        Self {
            id: uuid::Uuid::new_v4().to_string(),
            source: source.into(),
            captured_at,
            total_books,
            rated_books,
            books,
        }
    }

    /// Random identifier of this capture.
    pub fn id(&self) -> &str {
        &self.id
    }

    /// Where the snapshot came from (`opds`, `push:<agent>`, `mock`).
    pub fn source(&self) -> &str {
        &self.source
    }

    /// When the snapshot was captured.
    pub fn capture_time(&self) -> DateTime<Utc> {
        self.captured_at
    }

    /// Books in added order.
    pub fn books(&self) -> &[Book] {
        &self.books
    }

    /// Books, most recently added first.
    pub fn recent(&self) -> impl Iterator<Item = &Book> {
        self.books.iter().rev()
    }

    /// Number of books.
    pub fn total_books(&self) -> usize {
        self.total_books
    }

    /// Number of books with a non-zero rating.
    pub fn rated_books(&self) -> usize {
        self.rated_books
    }

    /// Whether the library holds no books.
    pub fn is_empty(&self) -> bool {
        self.books.is_empty()
    }
}
