//! OPDS catalog parsing.
//!
//! Calibre-web publishes its library as Atom-based OPDS feeds. Acquisition
//! feeds carry one `<entry>` per book; navigation feeds carry entries that
//! link to further feeds. Elements are matched by local name so that the
//! various namespace prefixes used by Calibre, Calibre-web and COPS all work.

use crate::error::IngestError;
use crate::library::{Book, parse_timestamp};
use chrono::{DateTime, Utc};
use regex::Regex;
use roxmltree::{Document, Node};
use std::sync::LazyLock;

/// Categories that carry no information for the display.
const GENERIC_CATEGORIES: &[&str] = &["Book", "book"];

/// Rough bytes-per-page used when only the file size is known.
const BYTES_PER_PAGE: u64 = 2048;

static PAGES_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?i)(\d+)\s*pages?\b").expect("static regex"));

/// Parse an acquisition feed into books.
///
/// Entries without an `updated`/`published` date (or with an unparseable
/// one) are stamped with `captured_at`.
pub fn parse_acquisition_feed(
    xml: &str,
    captured_at: DateTime<Utc>,
) -> Result<Vec<Book>, IngestError> {
    let doc = Document::parse(xml)?;
    let root = doc.root_element();

    if root.tag_name().name() != "feed" {
        return Err(IngestError::Parse(format!(
            "expected an Atom <feed>, found <{}>",
            root.tag_name().name()
        )));
    }

    let books: Vec<Book> = children_named(root, "entry")
        .map(|entry| parse_entry(entry, captured_at))
        .collect();

    tracing::debug!(books = books.len(), "Parsed OPDS acquisition feed");
    Ok(books)
}

/// Find the "By Newest" navigation link in a root catalog.
///
/// Relative hrefs are resolved against `base_url`.
pub fn find_newest_link(xml: &str, base_url: &str) -> Result<Option<String>, IngestError> {
    let doc = Document::parse(xml)?;

    for entry in children_named(doc.root_element(), "entry") {
        let title = child_text(entry, "title").unwrap_or_default().to_lowercase();
        if !title.contains("newest") && !title.contains("date") {
            continue;
        }

        let href = children_named(entry, "link")
            .filter(|link| {
                link.attribute("type")
                    .is_some_and(|t| t.contains("profile=opds-catalog"))
            })
            .find_map(|link| link.attribute("href"));

        if let Some(href) = href {
            return Ok(Some(resolve_href(base_url, href)));
        }
    }

    Ok(None)
}

/// Make a feed href absolute.
pub fn resolve_href(base_url: &str, href: &str) -> String {
    if href.starts_with("http://") || href.starts_with("https://") {
        href.to_string()
    } else if href.starts_with('/') {
        format!("{}{}", base_url.trim_end_matches('/'), href)
    } else {
        format!("{}/{}", base_url.trim_end_matches('/'), href)
    }
}

fn parse_entry(entry: Node<'_, '_>, captured_at: DateTime<Utc>) -> Book {
    let title = child_text(entry, "title").unwrap_or("Unknown Title");
    let author = children_named(entry, "author")
        .find_map(|a| child_text(a, "name"))
        .unwrap_or("Unknown Author");

    let added = child_text(entry, "updated")
        .or_else(|| child_text(entry, "published"))
        .and_then(parse_timestamp)
        .unwrap_or(captured_at);

    let mut book = Book::new(title, author, added);

    book.description = child_text(entry, "summary")
        .or_else(|| child_text(entry, "content"))
        .map(String::from);

    book.tags = children_named(entry, "category")
        .filter_map(|c| c.attribute("label").or_else(|| c.attribute("term")))
        .map(str::trim)
        .filter(|t| !t.is_empty() && !GENERIC_CATEGORIES.contains(t))
        .map(String::from)
        .collect();

    book.rating = descendant_text(entry, "rating").and_then(parse_rating);
    book.series = descendant_text(entry, "series").map(String::from);
    book.page_count = page_count_from_text(entry).or_else(|| page_count_from_size(entry));

    book
}

/// Convert a feed rating to the internal 0-10 scale.
///
/// Values up to 5 are read as a five-star rating, larger ones as Calibre's
/// ten-point scale.
fn parse_rating(text: &str) -> Option<u8> {
    let value: f64 = text.trim().parse().ok()?;
    if !value.is_finite() || value <= 0.0 {
        return None;
    }

    let scaled = if value <= 5.0 { value * 2.0 } else { value };
    let rating = scaled.round().clamp(0.0, 10.0) as u8;
    (rating > 0).then_some(rating)
}

fn page_count_from_text(entry: Node<'_, '_>) -> Option<u32> {
    entry
        .descendants()
        .filter_map(|n| n.text())
        .find_map(|text| PAGES_RE.captures(text)?.get(1)?.as_str().parse().ok())
}

fn page_count_from_size(entry: Node<'_, '_>) -> Option<u32> {
    let largest = children_named(entry, "link")
        .filter_map(|l| l.attribute("length")?.parse::<u64>().ok())
        .max()?;

    let pages = (largest / BYTES_PER_PAGE).max(1);
    Some(u32::try_from(pages).unwrap_or(u32::MAX))
}

fn children_named<'a, 'input: 'a>(
    node: Node<'a, 'input>,
    name: &'static str,
) -> impl Iterator<Item = Node<'a, 'input>> {
    node.children()
        .filter(move |n| n.is_element() && n.tag_name().name() == name)
}

fn child_text<'a>(node: Node<'a, '_>, name: &'static str) -> Option<&'a str> {
    children_named(node, name)
        .find_map(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}

fn descendant_text<'a>(node: Node<'a, '_>, name: &'static str) -> Option<&'a str> {
    node.descendants()
        .filter(|n| n.is_element() && n.tag_name().name() == name)
        .find_map(|n| n.text())
        .map(str::trim)
        .filter(|t| !t.is_empty())
}
