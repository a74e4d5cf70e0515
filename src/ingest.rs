//! Library ingestion.
//!
//! Every strategy yields either a complete [`LibrarySnapshot`] or an
//! [`IngestError`]; partial snapshots are never produced.

pub mod mock;
pub mod pull;
pub mod push;
pub mod scheduler;

pub use pull::{PullSource, RefreshOutcome};
pub use push::{PushedBook, SyncAck, SyncPayload, TagList};

use crate::config::{Config, IngestMode};
use crate::error::Result;
use std::sync::Arc;
use std::time::Duration;

/// The ingestion strategy chosen at startup.
#[derive(Clone)]
pub enum Ingestor {
    /// Fetch the Calibre-web OPDS feed on a timer.
    Pull(Arc<PullSource>),
    /// Accept snapshots on `POST /sync`.
    Push,
    /// Serve the built-in fixture library.
    Mock,
}

impl Ingestor {
    /// Select the strategy described by the configuration.
    pub fn from_config(config: &Config) -> Result<Self> {
        if config.ingest.use_mock_data {
            return Ok(Ingestor::Mock);
        }

        match config.ingest.mode {
            IngestMode::Pull => Ok(Ingestor::Pull(Arc::new(PullSource::new(&config.ingest)?))),
            IngestMode::Push => Ok(Ingestor::Push),
        }
    }

    /// Short name used in status payloads.
    pub fn name(&self) -> &'static str {
        match self {
            Ingestor::Pull(_) => "pull",
            Ingestor::Push => "push",
            Ingestor::Mock => "mock",
        }
    }

    /// Human readable data source.
    pub fn data_source(&self) -> &'static str {
        match self {
            Ingestor::Pull(_) => "Calibre-web OPDS",
            Ingestor::Push => "Local Calibre sync",
            Ingestor::Mock => "Mock data",
        }
    }

    /// Freshness window the cache should enforce.
    ///
    /// Only pulled data expires; pushed and fixture data stay fresh until
    /// replaced, and their age is reported instead.
    pub fn ttl(&self, config: &Config) -> Option<Duration> {
        match self {
            Ingestor::Pull(_) => Some(config.ingest.ttl()),
            Ingestor::Push | Ingestor::Mock => None,
        }
    }

    /// Whether `POST /sync` is accepted.
    pub fn accepts_push(&self) -> bool {
        matches!(self, Ingestor::Push)
    }
}
