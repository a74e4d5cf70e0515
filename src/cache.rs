//! Freshness-guarded snapshot cache.
//!
//! The cache holds exactly one [`CacheEntry`] behind an `Arc`. Writers build
//! a complete new entry and swap the pointer under a short write lock; readers
//! clone the `Arc` and never see a half-updated entry.

use crate::library::LibrarySnapshot;
use chrono::{DateTime, Utc};
use parking_lot::RwLock;
use serde::Serialize;
use std::sync::Arc;
use std::time::Duration;

/// Freshness of the cached data.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CacheStatus {
    /// Last ingestion succeeded within the freshness window.
    Fresh,
    /// Data is older than the freshness window and a refresh failed.
    Stale,
    /// Nothing has been ingested yet (or the cache was cleared).
    NeverPopulated,
}

impl CacheStatus {
    /// Stable name used in JSON payloads and logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            CacheStatus::Fresh => "fresh",
            CacheStatus::Stale => "stale",
            CacheStatus::NeverPopulated => "never_populated",
        }
    }
}

/// One immutable state of the cache.
#[derive(Debug, Clone)]
pub struct CacheEntry {
    /// Current snapshot, if any ingestion ever succeeded.
    pub snapshot: Option<Arc<LibrarySnapshot>>,
    /// When the current snapshot was installed.
    pub ingested_at: Option<DateTime<Utc>>,
    /// Freshness status.
    pub status: CacheStatus,
    /// Message of the most recent failed ingestion since the last success.
    pub last_error: Option<String>,
    /// When that failure happened.
    pub last_error_at: Option<DateTime<Utc>>,
}

impl CacheEntry {
    fn never_populated() -> Self {
        Self {
            snapshot: None,
            ingested_at: None,
            status: CacheStatus::NeverPopulated,
            last_error: None,
            last_error_at: None,
        }
    }

    /// Time elapsed since the last successful ingestion.
    pub fn age(&self, now: DateTime<Utc>) -> Option<Duration> {
        self.ingested_at
            .map(|at| (now - at).to_std().unwrap_or_default())
    }

    /// Number of books in the current snapshot (0 when empty).
    pub fn total_books(&self) -> usize {
        self.snapshot.as_ref().map_or(0, |s| s.total_books())
    }
}

/// Process-wide holder of the current library snapshot.
pub struct FreshnessCache {
    entry: RwLock<Arc<CacheEntry>>,
    ttl: Option<Duration>,
}

impl FreshnessCache {
    /// Create an empty cache.
    ///
    /// With `ttl` set, a failed refresh demotes data older than `ttl` to
    /// stale. Without it, staleness is only reported as elapsed time.
    pub fn new(ttl: Option<Duration>) -> Self {
        Self {
            entry: RwLock::new(Arc::new(CacheEntry::never_populated())),
            ttl,
        }
    }

    /// Configured freshness window.
    pub fn ttl(&self) -> Option<Duration> {
        self.ttl
    }

    /// Current entry.
    pub fn read(&self) -> Arc<CacheEntry> {
        self.entry.read().clone()
    }

    /// Install a new snapshot as current and mark it fresh.
    pub fn replace(&self, snapshot: LibrarySnapshot) -> Arc<CacheEntry> {
        self.replace_at(snapshot, Utc::now())
    }

    pub(crate) fn replace_at(
        &self,
        snapshot: LibrarySnapshot,
        now: DateTime<Utc>,
    ) -> Arc<CacheEntry> {
        let entry = Arc::new(CacheEntry {
            snapshot: Some(Arc::new(snapshot)),
            ingested_at: Some(now),
            status: CacheStatus::Fresh,
            last_error: None,
            last_error_at: None,
        });

        *self.entry.write() = entry.clone();
        entry
    }

    /// Record a failed refresh.
    ///
    /// The snapshot is kept. The status drops to stale only once the data is
    /// older than the freshness window.
    pub fn mark_stale(&self, reason: &str) -> CacheStatus {
        self.mark_stale_at(reason, Utc::now())
    }

    pub(crate) fn mark_stale_at(&self, reason: &str, now: DateTime<Utc>) -> CacheStatus {
        let mut guard = self.entry.write();
        let current = Arc::clone(&guard);

        let expired = match (self.ttl, current.age(now)) {
            (Some(ttl), Some(age)) => age > ttl,
            _ => false,
        };

        let status = if current.snapshot.is_some() && expired {
            CacheStatus::Stale
        } else {
            current.status
        };

        *guard = Arc::new(CacheEntry {
            snapshot: current.snapshot.clone(),
            ingested_at: current.ingested_at,
            status,
            last_error: Some(reason.to_string()),
            last_error_at: Some(now),
        });

        status
    }

    /// Drop the current snapshot and return to the never-populated state.
    pub fn clear(&self) {
        *self.entry.write() = Arc::new(CacheEntry::never_populated());
    }
}
