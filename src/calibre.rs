//! Read-only access to a local Calibre library (`metadata.db`).

use crate::error::{AppError, Result};
use crate::ingest::{PushedBook, TagList};
use parking_lot::Mutex;
use rusqlite::{Connection, OpenFlags, params};
use std::path::{Path, PathBuf};
use std::sync::Arc;

/// File name of the Calibre metadata database inside a library directory.
pub const METADATA_DB: &str = "metadata.db";

const RECENT_BOOKS_QUERY: &str = r#"
    SELECT
        b.id,
        b.title,
        b.author_sort,
        b.timestamp,
        (SELECT r.rating FROM books_ratings_link brl
            JOIN ratings r ON brl.rating = r.id
            WHERE brl.book = b.id) AS rating,
        (SELECT GROUP_CONCAT(t.name, ', ') FROM books_tags_link btl
            JOIN tags t ON btl.tag = t.id
            WHERE btl.book = b.id) AS tags,
        (SELECT s.name FROM books_series_link bsl
            JOIN series s ON bsl.series = s.id
            WHERE bsl.book = b.id) AS series,
        (SELECT c.text FROM comments c WHERE c.book = b.id) AS comment
    FROM books b
    ORDER BY b.timestamp DESC
    LIMIT ?1
"#;

/// A book row as stored by Calibre.
#[derive(Debug, Clone, PartialEq)]
pub struct CalibreBook {
    /// Calibre book id.
    pub id: i64,
    /// Title.
    pub title: String,
    /// Author sort name.
    pub author: String,
    /// Raw `books.timestamp` (date added).
    pub timestamp: Option<String>,
    /// Rating on Calibre's 0-10 scale.
    pub rating: Option<i64>,
    /// Tags joined with ", ".
    pub tags: Option<String>,
    /// Series name.
    pub series: Option<String>,
    /// Comment (often HTML).
    pub comment: Option<String>,
}

impl From<CalibreBook> for PushedBook {
    fn from(book: CalibreBook) -> Self {
        PushedBook {
            title: Some(book.title),
            author: Some(book.author),
            tags: book.tags.map(TagList::Joined),
            rating: book.rating,
            page_count: None,
            description: book.comment,
            series: book.series,
            timestamp: book.timestamp,
        }
    }
}

/// Read-only handle on a Calibre library.
#[derive(Clone)]
pub struct CalibreLibrary {
    conn: Arc<Mutex<Connection>>,
    path: PathBuf,
}

impl CalibreLibrary {
    /// Open `<library>/metadata.db` read-only.
    pub fn open(library: &Path) -> Result<Self> {
        let path = library.join(METADATA_DB);
        if !path.is_file() {
            return Err(AppError::Config(format!(
                "Calibre database not found at {}",
                path.display()
            )));
        }

        let conn = Connection::open_with_flags(
            &path,
            OpenFlags::SQLITE_OPEN_READ_ONLY | OpenFlags::SQLITE_OPEN_NO_MUTEX,
        )
        .map_err(|e| AppError::Internal(format!("Failed to open Calibre database: {}", e)))?;

        tracing::debug!(path = %path.display(), "Opened Calibre database");

        Ok(Self {
            conn: Arc::new(Mutex::new(conn)),
            path,
        })
    }

    /// Path of the opened `metadata.db`.
    pub fn path(&self) -> &Path {
        &self.path
    }

    /// Most recently added books, newest first.
    pub fn recent_books(&self, limit: usize) -> Result<Vec<CalibreBook>> {
        let conn = self.conn.lock();
        let limit = i64::try_from(limit).unwrap_or(i64::MAX);

        let mut stmt = conn.prepare(RECENT_BOOKS_QUERY)?;
        let books = stmt
            .query_map(params![limit], |row| {
                let id: i64 = row.get(0)?;
                let title: Option<String> = row.get(1)?;
                let author: Option<String> = row.get(2)?;

                Ok(CalibreBook {
                    id,
                    title: non_blank(title).unwrap_or_else(|| format!("Book {}", id)),
                    author: non_blank(author).unwrap_or_else(|| "Unknown".to_string()),
                    timestamp: row.get(3)?,
                    rating: row.get(4)?,
                    tags: non_blank(row.get(5)?),
                    series: non_blank(row.get(6)?),
                    comment: non_blank(row.get(7)?),
                })
            })?
            .collect::<std::result::Result<Vec<_>, _>>()?;

        Ok(books)
    }

    /// Total number of books in the library.
    pub fn count_books(&self) -> Result<usize> {
        let conn = self.conn.lock();
        let count: i64 = conn.query_row("SELECT COUNT(*) FROM books", [], |row| row.get(0))?;
        Ok(usize::try_from(count).unwrap_or_default())
    }
}

fn non_blank(value: Option<String>) -> Option<String> {
    value.filter(|v| !v.trim().is_empty())
}
