//! Built-in fixture library, served when `USE_MOCK_DATA` is set.

use crate::library::{Book, LibrarySnapshot};
use chrono::{Duration, Utc};

/// (title, author, tags, rating, pages, days since added, series)
type Fixture = (
    &'static str,
    &'static str,
    &'static str,
    Option<u8>,
    Option<u32>,
    i64,
    Option<&'static str>,
);

const FIXTURES: &[Fixture] = &[
    ("Dune", "Frank Herbert", "Science Fiction, Classic", Some(10), Some(612), 1, Some("Dune Chronicles")),
    ("Emma", "Jane Austen", "Romance, Classic", None, Some(474), 3, None),
    ("The Left Hand of Darkness", "Ursula K. Le Guin", "Science Fiction", Some(8), Some(304), 6, Some("Hainish Cycle")),
    ("Piranesi", "Susanna Clarke", "Fantasy", Some(9), Some(272), 10, None),
    ("The Name of the Rose", "Umberto Eco", "Mystery, Historical", Some(6), Some(536), 14, None),
    ("Middlemarch", "George Eliot", "Classic", None, Some(880), 21, None),
    ("Project Hail Mary", "Andy Weir", "Science Fiction", Some(8), Some(496), 30, None),
    ("The Remains of the Day", "Kazuo Ishiguro", "Literary Fiction", Some(4), None, 45, None),
];

/// Snapshot of the fixture library, dated relative to now.
pub fn mock_snapshot() -> LibrarySnapshot {
    let now = Utc::now();

    let books = FIXTURES
        .iter()
        .map(|&(title, author, tags, rating, pages, days_ago, series)| {
            let mut book = Book::new(title, author, now - Duration::days(days_ago));
            book.tags = crate::library::split_tags(tags);
            book.rating = rating;
            book.page_count = pages;
            book.series = series.map(String::from);
            book.description = Some(format!("{} by {}.", title, author));
            book
        })
        .collect();

    LibrarySnapshot::captured_at(books, "mock", now)
}
