//! trmnl-calibre: Calibre library data for TRMNL e-ink displays.
//!
//! The service keeps one snapshot of a Calibre library in memory and serves
//! it, reshaped for a small e-ink screen, to a TRMNL device that polls on a
//! fixed schedule.
//!
//! # Features
//!
//! - Pull mode: periodic fetch of a Calibre-web OPDS catalog
//! - Push mode: authenticated snapshots from a local sync agent
//! - Mock mode: built-in fixture library for display development
//! - Freshness tracking with last-known-good fallback
//! - Recently added books, a random suggestion and rating statistics

#![forbid(unsafe_code)]
#![warn(missing_docs)]

/// Local sync agent.
pub mod agent;
/// Push endpoint authentication.
pub mod auth;
/// Snapshot cache.
pub mod cache;
/// Calibre database reader.
pub mod calibre;
/// Configuration and CLI.
pub mod config;
/// Error types.
pub mod error;
/// Ingestion strategies.
pub mod ingest;
/// Library and book models.
pub mod library;
/// OPDS feed parsing.
pub mod opds;
/// HTTP server.
pub mod server;
/// Display view models.
pub mod view;

#[cfg(test)]
mod tests;

pub use cache::FreshnessCache;
pub use config::{Cli, Command, Config};
pub use error::{AppError, IngestError, Result};
pub use library::{Book, LibrarySnapshot};
pub use server::AppState;
