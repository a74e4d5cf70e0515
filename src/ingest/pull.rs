//! Pull ingestion from a Calibre-web OPDS catalog.

use crate::cache::{CacheStatus, FreshnessCache};
use crate::config::IngestConfig;
use crate::error::{AppError, IngestError, Result};
use crate::library::LibrarySnapshot;
use crate::opds;
use chrono::Utc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

/// Feeds tried before falling back to catalog navigation.
pub const DIRECT_FEEDS: &[&str] = &["/opds/new", "/opds/recentbooks", "/opds/newest"];

/// Requests made by one pull at most: the direct feeds, the root catalog
/// and the followed navigation link.
const MAX_REQUESTS: u32 = DIRECT_FEEDS.len() as u32 + 2;

/// Result of one refresh attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum RefreshOutcome {
    /// A pull was already running; nothing was done.
    Skipped,
    /// A new snapshot was installed.
    Updated {
        /// Number of books in the new snapshot.
        books: usize,
    },
    /// The pull failed; the previous snapshot was kept.
    Failed {
        /// What went wrong.
        error: IngestError,
        /// Cache status after recording the failure.
        status: CacheStatus,
    },
}

/// Calibre-web OPDS feed location plus the HTTP client used to read it.
pub struct PullSource {
    client: reqwest::Client,
    base_url: String,
    library_id: String,
    deadline: Duration,
    in_flight: AtomicBool,
}

/// Clears the in-flight flag when a pull ends, even if it is cancelled.
struct InFlight<'a>(&'a AtomicBool);

impl Drop for InFlight<'_> {
    fn drop(&mut self) {
        self.0.store(false, Ordering::SeqCst);
    }
}

impl PullSource {
    /// Build a source from the ingestion config.
    pub fn new(config: &IngestConfig) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("trmnl-calibre/", env!("CARGO_PKG_VERSION")))
            .timeout(config.request_timeout())
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            base_url: config.base_url.trim_end_matches('/').to_string(),
            library_id: config.library_id.clone(),
            deadline: config.request_timeout() * MAX_REQUESTS,
            in_flight: AtomicBool::new(false),
        })
    }

    /// Calibre-web base URL.
    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    /// Calibre-web library identifier.
    pub fn library_id(&self) -> &str {
        &self.library_id
    }

    /// Whether a pull is currently running.
    pub fn is_in_flight(&self) -> bool {
        self.in_flight.load(Ordering::SeqCst)
    }

    /// Pull once and record the result in the cache.
    ///
    /// Returns [`RefreshOutcome::Skipped`] without touching the network when
    /// another pull is still running.
    pub async fn refresh(&self, cache: &FreshnessCache) -> RefreshOutcome {
        if self.in_flight.swap(true, Ordering::SeqCst) {
            tracing::info!("Pull already in progress, skipping");
            return RefreshOutcome::Skipped;
        }
        let _guard = InFlight(&self.in_flight);

        let start = std::time::Instant::now();
        match self.fetch_snapshot().await {
            Ok(snapshot) => {
                let books = snapshot.total_books();
                cache.replace(snapshot);
                tracing::info!(books, elapsed = ?start.elapsed(), "Pulled library snapshot");
                RefreshOutcome::Updated { books }
            }
            Err(error) => {
                let status = cache.mark_stale(&error.to_string());
                tracing::warn!(
                    error = %error,
                    status = status.as_str(),
                    "Pull failed, keeping previous snapshot"
                );
                RefreshOutcome::Failed { error, status }
            }
        }
    }

    /// Fetch and parse the newest-books feed.
    pub async fn fetch_snapshot(&self) -> std::result::Result<LibrarySnapshot, IngestError> {
        tokio::time::timeout(self.deadline, self.discover())
            .await
            .map_err(|_| {
                IngestError::Fetch(format!("pull did not finish within {:?}", self.deadline))
            })?
    }

    async fn discover(&self) -> std::result::Result<LibrarySnapshot, IngestError> {
        let captured_at = Utc::now();
        let library = urlencoding::encode(&self.library_id);

        for path in DIRECT_FEEDS {
            let url = format!("{}{}?library_id={}", self.base_url, path, library);
            let books = match self.get_text(&url).await {
                Ok(xml) => opds::parse_acquisition_feed(&xml, captured_at),
                Err(e) => Err(e),
            };

            match books {
                Ok(books) if !books.is_empty() => {
                    tracing::debug!(url = %url, books = books.len(), "Direct feed succeeded");
                    return Ok(LibrarySnapshot::captured_at(books, "opds", captured_at));
                }
                Ok(_) => tracing::debug!(url = %url, "Direct feed is empty"),
                Err(e) => tracing::debug!(url = %url, error = %e, "Direct feed failed"),
            }
        }

        let root_url = format!("{}/opds?library_id={}", self.base_url, library);
        let root = self.get_text(&root_url).await?;

        let Some(newest_url) = opds::find_newest_link(&root, &self.base_url)? else {
            tracing::warn!("No OPDS feed returned books, library looks empty");
            return Ok(LibrarySnapshot::captured_at(Vec::new(), "opds", captured_at));
        };

        tracing::debug!(url = %newest_url, "Following newest-books navigation link");
        let xml = self.get_text(&newest_url).await?;
        let books = opds::parse_acquisition_feed(&xml, captured_at)?;

        Ok(LibrarySnapshot::captured_at(books, "opds", captured_at))
    }

    async fn get_text(&self, url: &str) -> std::result::Result<String, IngestError> {
        let response = self.client.get(url).send().await?.error_for_status()?;
        Ok(response.text().await?)
    }
}
