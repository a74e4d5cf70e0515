//! Local sync agent: reads a Calibre library and pushes it to a server.

use crate::calibre::{CalibreBook, CalibreLibrary};
use crate::error::{AppError, IngestError, Result};
use crate::ingest::{PushedBook, SyncAck, SyncPayload};
use std::path::Path;
use std::time::Duration;

/// Source label sent with every push.
pub const AGENT_SOURCE: &str = "local_calibre";

/// Timeout for the whole `/sync` request.
pub const PUSH_TIMEOUT: Duration = Duration::from_secs(30);

/// Build the `/sync` payload for a set of Calibre books.
pub fn build_payload(books: Vec<CalibreBook>) -> SyncPayload {
    let books: Vec<PushedBook> = books.into_iter().map(PushedBook::from).collect();
    let rated = books
        .iter()
        .filter(|b| b.rating.is_some_and(|r| r > 0))
        .count();

    SyncPayload {
        total_books: Some(books.len()),
        rated_books: Some(rated),
        source: Some(AGENT_SOURCE.to_string()),
        books,
    }
}

/// HTTP client for a trmnl-calibre server running in push mode.
pub struct SyncClient {
    client: reqwest::Client,
    sync_url: String,
    token: String,
}

impl SyncClient {
    /// Create a client for the server at `base_url`.
    pub fn new(base_url: &str, token: impl Into<String>) -> Result<Self> {
        let client = reqwest::Client::builder()
            .user_agent(concat!("trmnl-calibre-agent/", env!("CARGO_PKG_VERSION")))
            .timeout(PUSH_TIMEOUT)
            .build()
            .map_err(|e| AppError::Config(format!("Failed to build HTTP client: {}", e)))?;

        Ok(Self {
            client,
            sync_url: format!("{}/sync", base_url.trim_end_matches('/')),
            token: token.into(),
        })
    }

    /// Submit one payload.
    pub async fn push(&self, payload: &SyncPayload) -> Result<SyncAck> {
        let response = self
            .client
            .post(&self.sync_url)
            .bearer_auth(&self.token)
            .json(payload)
            .send()
            .await
            .map_err(IngestError::from)?;

        let status = response.status();
        if status == reqwest::StatusCode::UNAUTHORIZED {
            return Err(AppError::Unauthorized(
                "server rejected the sync token".to_string(),
            ));
        }
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(IngestError::Fetch(format!("sync failed with {}: {}", status, body)).into());
        }

        let ack = response.json::<SyncAck>().await.map_err(IngestError::from)?;
        Ok(ack)
    }
}

/// Read up to `limit` recent books from `library` and push them.
pub async fn run(library: &Path, client: &SyncClient, limit: usize) -> Result<SyncAck> {
    let calibre = CalibreLibrary::open(library)?;
    let books = calibre.recent_books(limit)?;

    tracing::info!(
        books = books.len(),
        library_size = calibre.count_books()?,
        path = %calibre.path().display(),
        "Extracted books from Calibre"
    );
    if books.is_empty() {
        tracing::warn!("Calibre library is empty, pushing an empty snapshot");
    }

    let payload = build_payload(books);
    let ack = client.push(&payload).await?;

    tracing::info!(
        snapshot_id = %ack.snapshot_id,
        total_books = ack.total_books,
        rated_books = ack.rated_books,
        "Sync successful"
    );
    Ok(ack)
}
