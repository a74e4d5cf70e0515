//! Application state shared across handlers.

use crate::auth::{SyncCredential, SyncGuard};
use crate::cache::FreshnessCache;
use crate::config::Config;
use crate::error::Result;
use crate::ingest::{Ingestor, mock, scheduler};
use crate::library::LibrarySnapshot;
use chrono::{DateTime, Utc};
use std::sync::Arc;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

/// Shared application state.
#[derive(Clone)]
pub struct AppState {
    /// Application configuration.
    pub config: Arc<Config>,
    /// The one library cache of this process.
    pub cache: Arc<FreshnessCache>,
    /// Push endpoint guard.
    pub guard: Arc<SyncGuard>,
    /// Selected ingestion strategy.
    pub ingestor: Ingestor,
    /// Process start time.
    pub started_at: DateTime<Utc>,
}

impl AppState {
    /// Build state for a validated configuration.
    pub fn new(config: Config) -> Result<Self> {
        config.validate()?;
        let ingestor = Ingestor::from_config(&config)?;
        Ok(Self::with_ingestor(config, ingestor))
    }

    /// Build state around an explicit ingestor.
    pub fn with_ingestor(config: Config, ingestor: Ingestor) -> Self {
        let credential = config.sync.token.clone().and_then(SyncCredential::new);
        let cache = FreshnessCache::new(ingestor.ttl(&config));

        Self {
            config: Arc::new(config),
            cache: Arc::new(cache),
            guard: Arc::new(SyncGuard::new(credential)),
            ingestor,
            started_at: Utc::now(),
        }
    }

    /// Fill the cache with whatever is available without network access.
    pub fn load_initial(&self) {
        if let Ingestor::Mock = self.ingestor {
            self.install(mock::mock_snapshot());
        }
    }

    /// Start the background pull task (pull mode only).
    pub fn start_pull_task(&self, cancel: CancellationToken) -> Option<JoinHandle<()>> {
        let Ingestor::Pull(source) = &self.ingestor else {
            return None;
        };

        Some(scheduler::spawn_pull_task(
            source.clone(),
            self.cache.clone(),
            self.config.ingest.interval(),
            cancel,
        ))
    }

    /// Re-ingest without waiting for the next tick.
    ///
    /// Pull mode refreshes in the background (skipped if a pull is already
    /// running); mock mode reinstalls the fixture. Returns whether a refresh
    /// was started.
    pub fn trigger_refresh(&self) -> bool {
        match &self.ingestor {
            Ingestor::Pull(source) => {
                if source.is_in_flight() {
                    return false;
                }
                let source = source.clone();
                let cache = self.cache.clone();
                tokio::spawn(async move {
                    source.refresh(&cache).await;
                });
                true
            }
            Ingestor::Mock => {
                self.install(mock::mock_snapshot());
                true
            }
            Ingestor::Push => false,
        }
    }

    /// Install a snapshot as the current library.
    pub fn install(&self, snapshot: LibrarySnapshot) {
        let books = snapshot.total_books();
        let source = snapshot.source().to_string();
        self.cache.replace(snapshot);
        tracing::info!(books, source = %source, "Installed library snapshot");
    }
}
